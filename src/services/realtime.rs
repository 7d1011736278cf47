use tracing::info;

use crate::{
    backend::{ChangeFeed, ChangeKind, FAMILY_RELATIONS, PEOPLE, PROFILES, VERIFIED_LINKS},
    context::AppContext,
    error::{AppError, Result},
};

/// Tables a client may watch.
pub const WATCHABLE_TABLES: [&str; 4] = [PEOPLE, FAMILY_RELATIONS, PROFILES, VERIFIED_LINKS];

pub struct RealtimeService;

impl RealtimeService {
    /// Subscribe to row changes on `table`. Drop the feed to unsubscribe.
    pub async fn watch(ctx: &AppContext, table: &str, event: ChangeKind) -> Result<ChangeFeed> {
        if !WATCHABLE_TABLES.contains(&table) {
            return Err(AppError::validation(format!("Table inconnue : {table}")));
        }
        let token = ctx.access_token();
        let feed = ctx.backend().subscribe(table, event, token.as_deref()).await?;
        info!(table, event = event.as_str(), "Watching table");
        Ok(feed)
    }
}
