use thiserror::Error;

/// Errors surfaced by the genealogy client.
///
/// `Config` is fatal at startup. `Auth` and `Validation` are reported to the
/// user and abort the current operation. Data-loading paths catch
/// `Backend`/`Http` failures and degrade to empty results.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration invalide : {0}")]
    Config(String),

    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("Backend error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Introuvable : {0}")]
    NotFound(String),

    #[error("Realtime error: {0}")]
    Realtime(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        AppError::Auth(msg.into())
    }

    /// True for errors raised before any network call was attempted.
    pub fn is_client_side(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
