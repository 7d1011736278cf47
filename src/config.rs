use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub supabase_url: Url,
    pub anon_key: String,
    pub session_file: PathBuf,
    pub client_info: String,
    pub reset_redirect_url: String,
    pub certification_delay: Duration,
    pub realtime_events_per_second: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(&required("SUPABASE_URL")?, &required("SUPABASE_ANON_KEY")?)?;

        if let Some(path) = optional("GENEALOGY_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        if let Some(info) = optional("GENEALOGY_CLIENT_INFO") {
            config.client_info = info;
        }
        if let Some(url) = optional("GENEALOGY_RESET_REDIRECT") {
            config.reset_redirect_url = url;
        }
        if let Some(ms) = optional("GENEALOGY_CERT_DELAY_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| AppError::Config(format!("GENEALOGY_CERT_DELAY_MS invalide : {ms}")))?;
            config.certification_delay = Duration::from_millis(ms);
        }
        if let Some(eps) = optional("GENEALOGY_REALTIME_EVENTS_PER_SECOND") {
            config.realtime_events_per_second = eps.parse().map_err(|_| {
                AppError::Config(format!("GENEALOGY_REALTIME_EVENTS_PER_SECOND invalide : {eps}"))
            })?;
        }

        Ok(config)
    }

    /// Build a config with defaults for everything but the endpoint and key.
    pub fn new(supabase_url: &str, anon_key: &str) -> Result<Self> {
        let supabase_url = Url::parse(supabase_url)
            .map_err(|_| AppError::Config("SUPABASE_URL n'est pas une URL valide".into()))?;
        if anon_key.trim().is_empty() {
            return Err(AppError::Config("SUPABASE_ANON_KEY est vide".into()));
        }

        Ok(Self {
            supabase_url,
            anon_key: anon_key.to_string(),
            session_file: PathBuf::from(".genealogy-session.json"),
            client_info: "blockchain-genealogy@1.0.0".into(),
            reset_redirect_url: "http://localhost:5173/reset-password".into(),
            certification_delay: Duration::from_millis(2000),
            realtime_events_per_second: 10,
        })
    }
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| AppError::Config(format!("Missing required env var: {key}")))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}
