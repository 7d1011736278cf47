use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    backend::{Query, PROFILES},
    context::AppContext,
    error::Result,
    models::profile::{Profile, ProfileUpdate},
    services::{decode_row, decode_rows},
};

pub struct ProfileService;

impl ProfileService {
    pub async fn get(ctx: &AppContext, user_id: Uuid) -> Result<Option<Profile>> {
        let token = ctx.access_token();
        let query = Query::new().eq("id", user_id.to_string()).limit(1);
        let rows = ctx.backend().select(PROFILES, &query, token.as_deref()).await?;
        Ok(decode_rows::<Profile>(rows).into_iter().next())
    }

    /// Profile of `user_id`, or an empty one when absent or unreadable.
    pub async fn load(ctx: &AppContext, user_id: Uuid) -> Profile {
        match Self::get(ctx, user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => Profile::empty(user_id),
            Err(e) => {
                error!(user = %user_id, "Failed to load profile: {}", e);
                Profile::empty(user_id)
            }
        }
    }

    /// Apply `changes` to the signed-in user's profile and upsert it.
    pub async fn save(ctx: &AppContext, changes: ProfileUpdate) -> Result<Profile> {
        let user = ctx.require_user()?;
        let mut profile = Self::get(ctx, user.id).await?.unwrap_or_else(|| Profile::empty(user.id));
        changes.apply(&mut profile);
        profile.interests.retain(|i| !i.trim().is_empty());
        profile.updated_at = Some(Utc::now());

        let token = ctx.access_token();
        let row = ctx
            .backend()
            .upsert(PROFILES, serde_json::to_value(&profile)?, token.as_deref())
            .await?;
        info!(user = %user.id, "Profile saved");
        decode_row(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::people::tests::signed_in_context;

    #[tokio::test]
    async fn test_missing_profile_loads_empty() {
        let (ctx, _) = signed_in_context("profile@example.org").await;
        let user = ctx.user().unwrap();
        let profile = ProfileService::load(&ctx, user.id).await;
        assert_eq!(profile, Profile::empty(user.id));
    }

    #[tokio::test]
    async fn test_save_then_update_keeps_other_fields() {
        let (ctx, backend) = signed_in_context("profile@example.org").await;
        let user = ctx.user().unwrap();

        let first = ProfileUpdate {
            username: Some("marie".into()),
            interests: Some(vec!["Bretagne".into(), " ".into()]),
            ..Default::default()
        };
        ProfileService::save(&ctx, first).await.unwrap();

        let second = ProfileUpdate { bio: Some("Généalogiste amateur".into()), ..Default::default() };
        let saved = ProfileService::save(&ctx, second).await.unwrap();

        assert_eq!(saved.username, "marie");
        assert_eq!(saved.interests, vec!["Bretagne".to_string()]);
        assert_eq!(saved.bio, "Généalogiste amateur");
        assert!(saved.updated_at.is_some());
        assert_eq!(backend.rows(PROFILES).len(), 1);
        assert_eq!(ProfileService::load(&ctx, user.id).await, saved);
    }

    #[tokio::test]
    async fn test_load_failure_degrades() {
        let (ctx, backend) = signed_in_context("profile@example.org").await;
        let user = ctx.user().unwrap();
        backend.fail_table(PROFILES);
        assert_eq!(ProfileService::load(&ctx, user.id).await, Profile::empty(user.id));
    }
}
