use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Account as returned by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// Signed-in session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

impl Session {
    /// Fill in `expires_at` from `expires_in` when the server omitted it.
    pub fn stamped(mut self, now: DateTime<Utc>) -> Self {
        if self.expires_at.is_none() {
            if let Some(secs) = self.expires_in {
                self.expires_at = Some((now + Duration::seconds(secs)).timestamp());
            }
        }
        self
    }

    /// Expired sessions are refreshed a minute early.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(at) => now.timestamp() + 60 >= at,
            None => false,
        }
    }
}

/// Outcome of a sign-up: a session when the account is usable immediately,
/// only the user when email confirmation is pending.
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(Session),
    ConfirmationRequired(User),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    PasswordRecovery,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Result<Self> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("Adresse email invalide"));
        }
        if password.is_empty() {
            return Err(AppError::validation("Le mot de passe est obligatoire"));
        }
        Ok(Self { email: email.to_string(), password: password.to_string() })
    }
}

/// Registration form, checked before anything is sent.
#[derive(Debug, Clone)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub username: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<Credentials> {
        if self.password != self.confirm_password {
            return Err(AppError::validation("Les mots de passe ne correspondent pas"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::validation(format!(
                "Le mot de passe doit contenir au moins {MIN_PASSWORD_LEN} caractères"
            )));
        }
        Credentials::new(&self.email, &self.password)
    }

    pub fn metadata(&self) -> serde_json::Value {
        serde_json::json!({ "username": self.username.trim() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            email: "marie@example.org".into(),
            password: password.into(),
            confirm_password: confirm.into(),
            username: "marie".into(),
        }
    }

    #[test]
    fn test_password_mismatch() {
        let err = form("secret1", "secret2").validate().unwrap_err();
        assert_eq!(err.to_string(), "Les mots de passe ne correspondent pas");
    }

    #[test]
    fn test_password_too_short() {
        assert!(form("abc12", "abc12").validate().is_err());
        assert!(form("abc123", "abc123").validate().is_ok());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        let session = Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_in: Some(3600),
            expires_at: None,
            user: User {
                id: Uuid::new_v4(),
                email: None,
                created_at: None,
                user_metadata: serde_json::Value::Null,
            },
        }
        .stamped(now);
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::seconds(3590)));
    }
}
