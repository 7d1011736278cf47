use tracing::error;
use uuid::Uuid;

use crate::{
    context::AppContext,
    error::Result,
    models::{auth::User, stats::UserStats},
    services::{links::LinkService, people::PeopleService, relations::RelationService},
};

pub struct StatsService;

impl StatsService {
    /// Contribution counters for `user`. The three counts are fetched
    /// concurrently; if any of them fails the stats are all zero.
    pub async fn for_user(ctx: &AppContext, user: &User) -> UserStats {
        let mut stats = match Self::counts(ctx, user.id).await {
            Ok((people, relations, verified)) => UserStats::from_counts(people, relations, verified),
            Err(e) => {
                error!(user = %user.id, "Failed to load stats: {}", e);
                UserStats::default()
            }
        };
        stats.member_since = user.created_at;
        stats
    }

    pub async fn counts(ctx: &AppContext, user_id: Uuid) -> Result<(u64, u64, u64)> {
        tokio::try_join!(
            PeopleService::count_by_user(ctx, user_id),
            RelationService::count_by_user(ctx, user_id),
            LinkService::count_by_user(ctx, user_id),
        )
    }
}
