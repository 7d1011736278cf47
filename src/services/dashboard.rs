use tracing::error;

use crate::{
    context::AppContext,
    error::Result,
    models::{person::Person, profile::Profile, stats::UserStats},
    services::{people::PeopleService, profiles::ProfileService, stats::StatsService},
};

pub const RECENT_PEOPLE: usize = 5;

/// Everything the dashboard shows for the signed-in user.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub display_name: String,
    pub profile: Profile,
    pub stats: UserStats,
    pub recent: Vec<Person>,
    pub connected: bool,
}

impl Dashboard {
    pub fn certified_count(&self) -> usize {
        self.recent.iter().filter(|p| p.is_certified()).count()
    }
}

pub struct DashboardService;

impl DashboardService {
    pub async fn load(ctx: &AppContext) -> Result<Dashboard> {
        let user = ctx.require_user()?;
        let connected = Self::check_connection(ctx).await;
        let stats = StatsService::for_user(ctx, &user).await;
        let profile = ProfileService::load(ctx, user.id).await;
        let recent = match PeopleService::recent_by_user(ctx, user.id, RECENT_PEOPLE).await {
            Ok(people) => people,
            Err(e) => {
                error!(user = %user.id, "Failed to load recent people: {}", e);
                Vec::new()
            }
        };

        Ok(Dashboard {
            display_name: profile.display_name(user.email.as_deref()),
            profile,
            stats,
            recent,
            connected,
        })
    }

    pub async fn check_connection(ctx: &AppContext) -> bool {
        match PeopleService::ping(ctx).await {
            Ok(_) => true,
            Err(e) => {
                error!("Connection test failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PEOPLE;
    use crate::error::AppError;
    use crate::models::person::NewPerson;
    use crate::services::people::tests::signed_in_context;

    #[tokio::test]
    async fn test_recent_people_newest_first_and_capped() {
        let (ctx, _) = signed_in_context("dash.board@example.org").await;
        for i in 0..7 {
            PeopleService::create(&ctx, NewPerson::new(&format!("P{i}"), "Blanc").unwrap(), i == 6)
                .await
                .unwrap();
        }

        let dashboard = DashboardService::load(&ctx).await.unwrap();
        assert!(dashboard.connected);
        assert_eq!(dashboard.display_name, "dash.board");
        assert_eq!(dashboard.recent.len(), RECENT_PEOPLE);
        assert_eq!(dashboard.recent[0].first_name, "P6");
        assert_eq!(dashboard.certified_count(), 1);
        assert_eq!(dashboard.stats.people_added, 7);
    }

    #[tokio::test]
    async fn test_degrades_when_people_unavailable() {
        let (ctx, backend) = signed_in_context("dash@example.org").await;
        backend.fail_table(PEOPLE);
        let dashboard = DashboardService::load(&ctx).await.unwrap();
        assert!(!dashboard.connected);
        assert!(dashboard.recent.is_empty());
        assert_eq!(dashboard.stats, UserStats { member_since: dashboard.stats.member_since, ..Default::default() });
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let (ctx, _) = signed_in_context("dash@example.org").await;
        ctx.clear_session().unwrap();
        assert!(matches!(DashboardService::load(&ctx).await, Err(AppError::Auth(_))));
    }
}
