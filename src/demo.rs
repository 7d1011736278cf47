//! Demo family shared by the `seed-demo` tool and the `--memory` CLI mode.
//!
//! Three generations of the Dupont family with parent, spouse and sibling
//! links, one verified source and a filled-in profile.

use chrono::NaiveDate;
use tracing::info;

use crate::{
    context::AppContext,
    error::{AppError, Result},
    models::{
        auth::{RegisterForm, SignUpOutcome},
        person::{NewPerson, Person},
        profile::ProfileUpdate,
        relation::RelationType,
    },
    services::{
        auth::AuthService, links::LinkService, people::PeopleService, profiles::ProfileService,
        relations,
    },
};

pub const DEMO_EMAIL: &str = "demo@genealogie.example";
pub const DEMO_PASSWORD: &str = "Demo2024!";
pub const DEMO_USERNAME: &str = "demo";

struct Entry {
    first_name: &'static str,
    last_name: &'static str,
    born: (i32, u32, u32),
    died: Option<(i32, u32, u32)>,
    place: &'static str,
    certify: bool,
}

const FAMILY: [Entry; 5] = [
    Entry { first_name: "Jean", last_name: "Dupont", born: (1850, 3, 12), died: Some((1921, 11, 2)), place: "Lyon", certify: true },
    Entry { first_name: "Marie", last_name: "Lefèvre", born: (1853, 7, 30), died: Some((1930, 1, 15)), place: "Lyon", certify: false },
    Entry { first_name: "Pierre", last_name: "Dupont", born: (1878, 5, 4), died: Some((1944, 8, 20)), place: "Lyon", certify: true },
    Entry { first_name: "Louise", last_name: "Dupont", born: (1881, 9, 18), died: None, place: "Villeurbanne", certify: false },
    Entry { first_name: "Henri", last_name: "Dupont", born: (1905, 2, 1), died: None, place: "Paris", certify: false },
];

/// (center index, kind, target index) as picked in the relation editor.
const LINKS: [(usize, RelationType, usize); 6] = [
    (0, RelationType::Spouse, 1),
    (0, RelationType::Parent, 2),
    (1, RelationType::Parent, 2),
    (3, RelationType::Child, 0),
    (3, RelationType::Sibling, 2),
    (4, RelationType::Child, 2),
];

#[derive(Debug, Clone)]
pub struct DemoFamily {
    pub people: Vec<Person>,
    pub relations: usize,
}

fn date((y, m, d): (i32, u32, u32)) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| AppError::validation(format!("Date invalide : {y}-{m}-{d}")))
}

/// Create the demo account, or sign into it when it already exists.
pub async fn demo_sign_in(ctx: &AppContext) -> Result<()> {
    let form = RegisterForm {
        email: DEMO_EMAIL.into(),
        password: DEMO_PASSWORD.into(),
        confirm_password: DEMO_PASSWORD.into(),
        username: DEMO_USERNAME.into(),
    };
    match AuthService::sign_up(ctx, &form).await {
        Ok(SignUpOutcome::SignedIn(_)) => Ok(()),
        Ok(SignUpOutcome::ConfirmationRequired(_)) => Err(AppError::auth(
            "Le compte de démonstration doit être confirmé par email",
        )),
        Err(AppError::Auth(_)) => AuthService::sign_in(ctx, DEMO_EMAIL, DEMO_PASSWORD).await.map(|_| ()),
        Err(e) => Err(e),
    }
}

/// Insert the demo family for the signed-in user.
pub async fn seed_family(ctx: &AppContext) -> Result<DemoFamily> {
    let mut people = Vec::with_capacity(FAMILY.len());
    for entry in &FAMILY {
        let mut person = NewPerson::new(entry.first_name, entry.last_name)?
            .born(date(entry.born)?)
            .born_in(entry.place);
        if let Some(died) = entry.died {
            person = person.died(date(died)?);
        }
        people.push(PeopleService::create(ctx, person, entry.certify).await?);
    }

    for (center, kind, target) in LINKS {
        relations::add_relation(ctx, &people[center], &people, kind, &people[target].id.to_string())
            .await?;
    }

    LinkService::verify(ctx, Some(people[0].id), Some("https://archives.example.org/lyon/1850/naissances"))
        .await?;
    ProfileService::save(
        ctx,
        ProfileUpdate {
            username: Some(DEMO_USERNAME.into()),
            bio: Some("Compte de démonstration".into()),
            location: Some("Lyon, France".into()),
            interests: Some(vec!["Lyonnais".into(), "XIXe siècle".into()]),
        },
    )
    .await?;

    info!(people = people.len(), relations = LINKS.len(), "Demo family seeded");
    Ok(DemoFamily { people, relations: LINKS.len() })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::Config;
    use crate::context::SessionStore;
    use crate::services::{stats::StatsService, tree::TreeState};

    #[tokio::test]
    async fn test_seeded_family_forms_a_tree() {
        let config = Arc::new(Config::new("http://localhost:54321", "anon").unwrap());
        let ctx = AppContext::new(config, Arc::new(MemoryBackend::new()), SessionStore::Ephemeral);
        demo_sign_in(&ctx).await.unwrap();
        let family = seed_family(&ctx).await.unwrap();

        let mut state = TreeState::load(&ctx).await;
        state.select(family.people[2].id);
        let tree = state.tree().unwrap();
        let parents: Vec<&str> = tree.parents.iter().map(|p| p.first_name.as_str()).collect();
        assert_eq!(parents, vec!["Jean", "Marie"]);
        assert_eq!(tree.children.len(), 1);
        assert_eq!(tree.children[0].first_name, "Henri");

        let user = ctx.user().unwrap();
        let stats = StatsService::for_user(&ctx, &user).await;
        assert_eq!(stats.total_points, 5 * 10 + 6 * 5 + 20);

        AuthService::sign_out(&ctx).await.unwrap();
        demo_sign_in(&ctx).await.unwrap();
        assert_eq!(ctx.user().unwrap().id, user.id);
    }
}
