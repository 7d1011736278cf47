use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of `profiles`; `id` is the account id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    pub fn empty(id: Uuid) -> Self {
        Self {
            id,
            username: String::new(),
            bio: String::new(),
            location: String::new(),
            interests: Vec::new(),
            updated_at: None,
        }
    }

    /// Username, or the local part of the account email when unset.
    pub fn display_name(&self, email: Option<&str>) -> String {
        if !self.username.trim().is_empty() {
            return self.username.clone();
        }
        email
            .and_then(|e| e.split('@').next())
            .filter(|s| !s.is_empty())
            .unwrap_or("Anonyme")
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub interests: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn apply(self, profile: &mut Profile) {
        if let Some(v) = self.username {
            profile.username = v;
        }
        if let Some(v) = self.bio {
            profile.bio = v;
        }
        if let Some(v) = self.location {
            profile.location = v;
        }
        if let Some(v) = self.interests {
            profile.interests = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_email() {
        let p = Profile::empty(Uuid::new_v4());
        assert_eq!(p.display_name(Some("marie.curie@example.org")), "marie.curie");
        assert_eq!(p.display_name(None), "Anonyme");
    }

    #[test]
    fn test_update_only_touches_given_fields() {
        let mut p = Profile::empty(Uuid::new_v4());
        p.bio = "ancienne bio".into();
        ProfileUpdate { location: Some("Lyon".into()), ..Default::default() }.apply(&mut p);
        assert_eq!(p.location, "Lyon");
        assert_eq!(p.bio, "ancienne bio");
    }
}
