//! Demo data seed script
//!
//! Seeds the hosted project with the Dupont demo family:
//! - 1 demo account (demo@genealogie.example / Demo2024!)
//! - 5 people over three generations, two of them certified
//! - 6 relations (parent, spouse, sibling)
//! - 1 verified source and a filled-in profile
//!
//! Usage:
//!   SUPABASE_URL=... SUPABASE_ANON_KEY=... ./seed-demo
//!
//! Environment variables:
//!   SUPABASE_URL       project URL (required)
//!   SUPABASE_ANON_KEY  public anon key (required)

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genealogy_client::{
    backend::{Backend, RestBackend},
    config::Config,
    context::{AppContext, SessionStore},
    demo,
    services::{auth::AuthService, people::PeopleService},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Seed Demo Family ===");

    let config = Arc::new(Config::from_env().context("Invalid configuration")?);
    let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(&config));
    let ctx = AppContext::new(config, backend, SessionStore::Ephemeral);

    println!("Checking connection...");
    PeopleService::ping(&ctx).await.context("Backend unreachable")?;

    println!("Signing in as {}...", demo::DEMO_EMAIL);
    demo::demo_sign_in(&ctx).await.context("Failed to sign in demo account")?;

    let user = ctx.require_user()?;
    let existing = PeopleService::count_by_user(&ctx, user.id)
        .await
        .context("Failed to count existing demo people")?;
    if existing > 0 {
        println!("Demo account already has {existing} people, nothing to do.");
        AuthService::sign_out(&ctx).await.ok();
        return Ok(());
    }

    println!("Creating family...");
    let family = demo::seed_family(&ctx).await.context("Failed to seed demo family")?;
    for person in &family.people {
        println!("  {} ({})", person.full_name(), person.id);
    }
    println!("  {} relations", family.relations);

    AuthService::sign_out(&ctx).await.context("Failed to sign out")?;

    println!();
    println!("=== Done ===");
    println!("Login: {} / {}", demo::DEMO_EMAIL, demo::DEMO_PASSWORD);
    Ok(())
}
