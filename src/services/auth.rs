use tracing::{info, warn};

use crate::{
    context::AppContext,
    error::{AppError, Result},
    models::auth::{AuthEvent, Credentials, RegisterForm, Session, SignUpOutcome, User},
};

pub struct AuthService;

impl AuthService {
    /// Register an account. The form is checked locally first; nothing
    /// is sent when it is invalid.
    pub async fn sign_up(ctx: &AppContext, form: &RegisterForm) -> Result<SignUpOutcome> {
        let creds = form.validate()?;
        let outcome = ctx
            .backend()
            .sign_up(&creds.email, &creds.password, form.metadata())
            .await
            .map_err(into_auth_error)?;

        match &outcome {
            SignUpOutcome::SignedIn(session) => {
                info!(user = %session.user.id, "Account created");
                ctx.set_session(session.clone(), AuthEvent::SignedIn)?;
            }
            SignUpOutcome::ConfirmationRequired(user) => {
                info!(user = %user.id, "Account created, email confirmation pending");
            }
        }
        Ok(outcome)
    }

    pub async fn sign_in(ctx: &AppContext, email: &str, password: &str) -> Result<Session> {
        let creds = Credentials::new(email, password)?;
        let session = ctx
            .backend()
            .sign_in(&creds.email, &creds.password)
            .await
            .map_err(into_auth_error)?;
        info!(user = %session.user.id, "Signed in");
        ctx.set_session(session.clone(), AuthEvent::SignedIn)?;
        Ok(session)
    }

    /// Revoke the session remotely, then tear it down locally. The local
    /// teardown happens even when the remote call fails.
    pub async fn sign_out(ctx: &AppContext) -> Result<()> {
        let Some(session) = ctx.session() else {
            return Ok(());
        };
        let remote = ctx.backend().sign_out(&session.access_token).await;
        ctx.clear_session()?;
        if let Err(e) = remote {
            warn!("Remote sign-out failed: {}", e);
            return Err(into_auth_error(e));
        }
        info!(user = %session.user.id, "Signed out");
        Ok(())
    }

    /// Ask the auth service who the current token belongs to.
    pub async fn current_user(ctx: &AppContext) -> Result<User> {
        let token = ctx.access_token().ok_or_else(|| AppError::auth("Vous devez être connecté"))?;
        ctx.backend().get_user(&token).await.map_err(into_auth_error)
    }

    pub async fn refresh(ctx: &AppContext) -> Result<Session> {
        let session = ctx.session().ok_or_else(|| AppError::auth("Vous devez être connecté"))?;
        let fresh = ctx
            .backend()
            .refresh_session(&session.refresh_token)
            .await
            .map_err(into_auth_error)?;
        ctx.set_session(fresh.clone(), AuthEvent::TokenRefreshed)?;
        Ok(fresh)
    }

    pub async fn reset_password(ctx: &AppContext, email: &str) -> Result<()> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::validation("Adresse email invalide"));
        }
        let redirect = ctx.config().reset_redirect_url.clone();
        ctx.backend().reset_password(email, &redirect).await.map_err(into_auth_error)?;
        ctx.emit(AuthEvent::PasswordRecovery, None);
        info!("Password reset requested");
        Ok(())
    }
}

/// Auth endpoints report failures as auth errors whatever the transport said.
fn into_auth_error(e: AppError) -> AppError {
    match e {
        AppError::Backend { message, .. } => AppError::Auth(message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::Config;
    use crate::context::SessionStore;

    fn context() -> (AppContext, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let config = Arc::new(Config::new("http://localhost:54321", "anon").unwrap());
        (AppContext::new(config, backend.clone(), SessionStore::Ephemeral), backend)
    }

    fn form(email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            email: email.into(),
            password: password.into(),
            confirm_password: confirm.into(),
            username: "marie".into(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in_notifies_listeners() {
        let (ctx, _) = context();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let _sub = ctx.on_auth_change(move |event, _| sink.lock().unwrap().push(event));

        AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret1")).await.unwrap();
        AuthService::sign_out(&ctx).await.unwrap();
        assert!(ctx.session().is_none());

        AuthService::sign_in(&ctx, "marie@example.org", "secret1").await.unwrap();
        assert!(ctx.user().is_some());

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                AuthEvent::InitialSession,
                AuthEvent::SignedIn,
                AuthEvent::SignedOut,
                AuthEvent::SignedIn
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_credentials_keep_user_signed_out() {
        let (ctx, _) = context();
        AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret1")).await.unwrap();
        AuthService::sign_out(&ctx).await.unwrap();

        let err = AuthService::sign_in(&ctx, "marie@example.org", "wrong!!").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(ctx.session().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_registration_reported() {
        let (ctx, _) = context();
        AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret1")).await.unwrap();
        let err = AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[tokio::test]
    async fn test_mismatched_passwords_never_reach_backend() {
        let (ctx, backend) = context();
        let err = AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret2"))
            .await
            .unwrap_err();
        assert!(err.is_client_side());
        assert!(AuthService::sign_in(&ctx, "marie@example.org", "secret1").await.is_err());
        assert!(backend.rows("people").is_empty());
    }

    #[tokio::test]
    async fn test_refresh_and_current_user() {
        let (ctx, _) = context();
        AuthService::sign_up(&ctx, &form("marie@example.org", "secret1", "secret1")).await.unwrap();
        let before = ctx.access_token().unwrap();
        AuthService::refresh(&ctx).await.unwrap();
        assert_ne!(ctx.access_token().unwrap(), before);

        let user = AuthService::current_user(&ctx).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("marie@example.org"));
    }

    #[tokio::test]
    async fn test_reset_password_uses_backend() {
        let (ctx, backend) = context();
        AuthService::reset_password(&ctx, "marie@example.org").await.unwrap();
        assert_eq!(backend.password_resets(), vec!["marie@example.org".to_string()]);
        assert!(AuthService::reset_password(&ctx, "nope").await.is_err());
    }
}
