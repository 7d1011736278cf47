//! Seam between the application and the hosted backend-as-a-service.
//!
//! `RestBackend` talks to the hosted service; `MemoryBackend` keeps
//! everything in-process and backs the tests and the `--memory` CLI mode.

pub mod memory;
pub mod realtime;
pub mod rest;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::auth::{Session, SignUpOutcome, User};

pub use memory::MemoryBackend;
pub use rest::RestBackend;

pub const PEOPLE: &str = "people";
pub const FAMILY_RELATIONS: &str = "family_relations";
pub const PROFILES: &str = "profiles";
pub const VERIFIED_LINKS: &str = "verified_links";

/// Row predicate understood by both backends.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    /// Case-insensitive LIKE; `%` is the wildcard.
    ILike(String, String),
    Gte(String, Value),
    Lte(String, Value),
}

impl Filter {
    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(c, _) | Filter::ILike(c, _) | Filter::Gte(c, _) | Filter::Lte(c, _) => c,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Table query: projection, filters, ordering and limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub select: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Default for Query {
    fn default() -> Self {
        Self { select: "*".into(), filters: Vec::new(), order: None, limit: None }
    }
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.select = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    /// Substring match, ignoring case.
    pub fn contains(mut self, column: &str, needle: &str) -> Self {
        self.filters.push(Filter::ILike(column.into(), format!("%{needle}%")));
        self
    }

    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Gte(column.into(), value.into()));
        self
    }

    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lte(column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order { column: column.into(), ascending });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn get_user(&self, access_token: &str) -> Result<User>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<()>;
}

/// Record CRUD. `token` is the caller's access token; `None` means anonymous.
#[async_trait]
pub trait TableBackend: Send + Sync {
    async fn select(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>>;

    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value>;

    async fn upsert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value>;

    async fn update(&self, table: &str, query: &Query, patch: Value, token: Option<&str>)
        -> Result<Vec<Value>>;

    async fn delete(&self, table: &str, query: &Query, token: Option<&str>) -> Result<()>;
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
        token: Option<&str>,
    ) -> Result<String>;

    async fn download(&self, bucket: &str, path: &str, token: Option<&str>) -> Result<Bytes>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> Result<()>;
}

#[async_trait]
pub trait RealtimeBackend: Send + Sync {
    async fn subscribe(
        &self,
        table: &str,
        event: ChangeKind,
        token: Option<&str>,
    ) -> Result<ChangeFeed>;
}

/// Everything the application needs from the hosted service.
pub trait Backend: AuthBackend + TableBackend + StorageBackend + RealtimeBackend {}

impl<T> Backend for T where T: AuthBackend + TableBackend + StorageBackend + RealtimeBackend {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    #[serde(rename = "*")]
    All,
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::All => "*",
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        }
    }

    pub fn matches(self, other: ChangeKind) -> bool {
        self == ChangeKind::All || self == other
    }
}

impl std::str::FromStr for ChangeKind {
    type Err = crate::error::AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "*" | "ALL" => Ok(ChangeKind::All),
            "INSERT" => Ok(ChangeKind::Insert),
            "UPDATE" => Ok(ChangeKind::Update),
            "DELETE" => Ok(ChangeKind::Delete),
            other => Err(crate::error::AppError::validation(format!(
                "Événement inconnu : {other}"
            ))),
        }
    }
}

/// One row change on a watched table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record: Option<Value>,
    pub old_record: Option<Value>,
}

/// Stream of changes for one subscription. Dropping the feed stops the
/// background task that fills it.
pub struct ChangeFeed {
    rx: mpsc::Receiver<ChangeEvent>,
    task: JoinHandle<()>,
}

impl ChangeFeed {
    pub(crate) fn new(rx: mpsc::Receiver<ChangeEvent>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next change, or `None` once the subscription is closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.rx.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
