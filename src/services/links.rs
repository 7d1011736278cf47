use tracing::info;
use uuid::Uuid;

use crate::{
    backend::{Query, VERIFIED_LINKS},
    context::AppContext,
    error::{AppError, Result},
    models::verified_link::{NewVerifiedLink, VerifiedLink},
    services::{decode_row, decode_rows},
};

pub struct LinkService;

impl LinkService {
    /// Record that the signed-in user verified a source.
    pub async fn verify(
        ctx: &AppContext,
        person_id: Option<Uuid>,
        source_url: Option<&str>,
    ) -> Result<VerifiedLink> {
        let user = ctx.require_user()?;
        let source_url = source_url.map(str::trim).filter(|s| !s.is_empty());
        if let Some(url) = source_url {
            reqwest::Url::parse(url)
                .map_err(|_| AppError::validation(format!("URL de source invalide : {url}")))?;
        }

        let link = NewVerifiedLink {
            verified_by: user.id,
            person_id,
            source_url: source_url.map(str::to_string),
        };
        let token = ctx.access_token();
        let row = ctx
            .backend()
            .insert(VERIFIED_LINKS, serde_json::to_value(&link)?, token.as_deref())
            .await?;
        let created: VerifiedLink = decode_row(row)?;
        info!(link = %created.id, user = %user.id, "Source verified");
        Ok(created)
    }

    pub async fn list_by_user(ctx: &AppContext, user_id: Uuid) -> Result<Vec<VerifiedLink>> {
        let token = ctx.access_token();
        let query = Query::new()
            .eq("verified_by", user_id.to_string())
            .order_by("created_at", false);
        let rows = ctx.backend().select(VERIFIED_LINKS, &query, token.as_deref()).await?;
        Ok(decode_rows(rows))
    }

    pub async fn count_by_user(ctx: &AppContext, user_id: Uuid) -> Result<u64> {
        let token = ctx.access_token();
        let query = Query::new().select("id").eq("verified_by", user_id.to_string());
        let rows = ctx.backend().select(VERIFIED_LINKS, &query, token.as_deref()).await?;
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::people::tests::signed_in_context;

    #[tokio::test]
    async fn test_verify_and_list() {
        let (ctx, _) = signed_in_context("links@example.org").await;
        let user = ctx.user().unwrap();

        LinkService::verify(&ctx, None, Some("https://archives.example.org/a")).await.unwrap();
        LinkService::verify(&ctx, None, None).await.unwrap();

        let links = LinkService::list_by_user(&ctx, user.id).await.unwrap();
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.verified_by == user.id));
        assert_eq!(LinkService::count_by_user(&ctx, Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_source_rejected() {
        let (ctx, backend) = signed_in_context("links@example.org").await;
        let err = LinkService::verify(&ctx, None, Some("pas une url")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(backend.rows(VERIFIED_LINKS).is_empty());
    }
}
