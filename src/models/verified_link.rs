use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A "source verified" contribution (`verified_links` table).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedLink {
    pub id: Uuid,
    pub verified_by: Uuid,
    #[serde(default)]
    pub person_id: Option<Uuid>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVerifiedLink {
    pub verified_by: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}
