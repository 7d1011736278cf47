use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::auth::{Session, SignUpOutcome, User};

use super::{
    realtime, AuthBackend, ChangeFeed, ChangeKind, Filter, Query, RealtimeBackend, StorageBackend,
    TableBackend,
};

/// Client for the hosted service (auth, PostgREST tables, storage, realtime).
pub struct RestBackend {
    client: Client,
    base_url: String,
    anon_key: String,
    client_info: String,
    events_per_second: u32,
}

impl RestBackend {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.as_str().trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            client_info: config.client_info.clone(),
            events_per_second: config.realtime_events_per_second,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", token.unwrap_or(&self.anon_key)))
            .header("x-client-info", &self.client_info)
    }

    async fn send_table(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(AppError::Backend { status, message: error_message(&text) })
    }

    async fn send_auth(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(AppError::Auth(error_message(&text)))
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let req = self
            .client
            .post(self.url("/auth/v1/token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let resp = self.send_auth(self.authorized(req, None)).await?;
        let session: Session = resp.json().await?;
        Ok(session.stamped(chrono::Utc::now()))
    }
}

/// PostgREST query-string pairs for a query.
pub fn query_pairs(query: &Query) -> Vec<(String, String)> {
    let mut pairs = vec![("select".to_string(), query.select.clone())];
    for filter in &query.filters {
        let rendered = match filter {
            Filter::Eq(_, Value::Null) => "is.null".to_string(),
            Filter::Eq(_, v) => format!("eq.{}", scalar(v)),
            Filter::ILike(_, pattern) => format!("ilike.{}", pattern.replace('%', "*")),
            Filter::Gte(_, v) => format!("gte.{}", scalar(v)),
            Filter::Lte(_, v) => format!("lte.{}", scalar(v)),
        };
        pairs.push((filter.column().to_string(), rendered));
    }
    if let Some(order) = &query.order {
        let dir = if order.ascending { "asc" } else { "desc" };
        pairs.push(("order".into(), format!("{}.{dir}", order.column)));
    }
    if let Some(limit) = query.limit {
        pairs.push(("limit".into(), limit.to_string()));
    }
    pairs
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

fn first_row(rows: Value) -> Result<Value> {
    match rows {
        Value::Array(mut rows) if !rows.is_empty() => Ok(rows.swap_remove(0)),
        Value::Array(_) => Err(AppError::NotFound("aucune ligne renvoyée".into())),
        row => Ok(row),
    }
}

#[async_trait]
impl AuthBackend for RestBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        let req = self
            .client
            .post(self.url("/auth/v1/signup"))
            .json(&json!({ "email": email, "password": password, "data": metadata }));
        let body: Value = self.send_auth(self.authorized(req, None)).await?.json().await?;

        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            return Ok(SignUpOutcome::SignedIn(session.stamped(chrono::Utc::now())));
        }
        let user_value = match body.get("user") {
            Some(user) if !user.is_null() => user.clone(),
            _ => body,
        };
        Ok(SignUpOutcome::ConfirmationRequired(serde_json::from_value(user_value)?))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let req = self.client.post(self.url("/auth/v1/logout"));
        self.send_auth(self.authorized(req, Some(access_token))).await?;
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let req = self.client.get(self.url("/auth/v1/user"));
        let user = self.send_auth(self.authorized(req, Some(access_token))).await?.json().await?;
        Ok(user)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        self.token_grant("refresh_token", json!({ "refresh_token": refresh_token })).await
    }

    async fn reset_password(&self, email: &str, redirect_to: &str) -> Result<()> {
        let req = self
            .client
            .post(self.url("/auth/v1/recover"))
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email }));
        self.send_auth(self.authorized(req, None)).await?;
        Ok(())
    }
}

#[async_trait]
impl TableBackend for RestBackend {
    async fn select(&self, table: &str, query: &Query, token: Option<&str>) -> Result<Vec<Value>> {
        debug!(table, ?query, "select");
        let req = self
            .client
            .get(self.url(&format!("/rest/v1/{table}")))
            .query(&query_pairs(query));
        let rows = self.send_table(self.authorized(req, token)).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value> {
        debug!(table, "insert");
        let req = self
            .client
            .post(self.url(&format!("/rest/v1/{table}")))
            .header("Prefer", "return=representation")
            .json(&row);
        let rows: Value = self.send_table(self.authorized(req, token)).await?.json().await?;
        first_row(rows)
    }

    async fn upsert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value> {
        debug!(table, "upsert");
        let req = self
            .client
            .post(self.url(&format!("/rest/v1/{table}")))
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        let rows: Value = self.send_table(self.authorized(req, token)).await?.json().await?;
        first_row(rows)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
        token: Option<&str>,
    ) -> Result<Vec<Value>> {
        debug!(table, ?query, "update");
        let req = self
            .client
            .patch(self.url(&format!("/rest/v1/{table}")))
            .query(&query_pairs(query))
            .header("Prefer", "return=representation")
            .json(&patch);
        let rows = self.send_table(self.authorized(req, token)).await?.json().await?;
        Ok(rows)
    }

    async fn delete(&self, table: &str, query: &Query, token: Option<&str>) -> Result<()> {
        debug!(table, ?query, "delete");
        let pairs: Vec<(String, String)> =
            query_pairs(query).into_iter().filter(|(k, _)| k != "select").collect();
        let req = self.client.delete(self.url(&format!("/rest/v1/{table}"))).query(&pairs);
        self.send_table(self.authorized(req, token)).await?;
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        content_type: &str,
        token: Option<&str>,
    ) -> Result<String> {
        let req = self
            .client
            .post(self.url(&format!("/storage/v1/object/{bucket}/{path}")))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(body);
        let resp: Value = self.send_table(self.authorized(req, token)).await?.json().await?;
        Ok(resp
            .get("Key")
            .and_then(|k| k.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{bucket}/{path}")))
    }

    async fn download(&self, bucket: &str, path: &str, token: Option<&str>) -> Result<Bytes> {
        let req = self.client.get(self.url(&format!("/storage/v1/object/{bucket}/{path}")));
        let bytes = self.send_table(self.authorized(req, token)).await?.bytes().await?;
        Ok(bytes)
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.url(&format!("/storage/v1/object/public/{bucket}/{path}"))
    }

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> Result<()> {
        let req = self
            .client
            .delete(self.url(&format!("/storage/v1/object/{bucket}")))
            .json(&json!({ "prefixes": paths }));
        self.send_table(self.authorized(req, token)).await?;
        Ok(())
    }
}

#[async_trait]
impl RealtimeBackend for RestBackend {
    async fn subscribe(
        &self,
        table: &str,
        event: ChangeKind,
        token: Option<&str>,
    ) -> Result<ChangeFeed> {
        let endpoint = realtime::websocket_url(&self.base_url, &self.anon_key, self.events_per_second)?;
        realtime::subscribe(endpoint, table, event, token.unwrap_or(&self.anon_key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(query: &Query) -> Vec<(String, String)> {
        query_pairs(query)
    }

    #[test]
    fn test_query_pairs_render_postgrest_operators() {
        let q = Query::new()
            .eq("is_public", true)
            .contains("first_name", "jean")
            .gte("birth_date", "1850-01-01")
            .lte("birth_date", "1850-12-31")
            .order_by("created_at", false);
        let p = pairs(&q);
        assert_eq!(p[0], ("select".into(), "*".into()));
        assert!(p.contains(&("is_public".into(), "eq.true".into())));
        assert!(p.contains(&("first_name".into(), "ilike.*jean*".into())));
        assert!(p.contains(&("birth_date".into(), "gte.1850-01-01".into())));
        assert!(p.contains(&("birth_date".into(), "lte.1850-12-31".into())));
        assert_eq!(p.last().unwrap(), &("order".into(), "created_at.desc".into()));
    }

    #[test]
    fn test_null_equality_renders_is_null() {
        let q = Query::new().eq("parent_id", Value::Null).limit(1);
        let p = pairs(&q);
        assert!(p.contains(&("parent_id".into(), "is.null".into())));
        assert!(p.contains(&("limit".into(), "1".into())));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"msg":"Invalid login credentials"}"#), "Invalid login credentials");
        assert_eq!(error_message(r#"{"message":"duplicate key"}"#), "duplicate key");
        assert_eq!(error_message("gateway timeout"), "gateway timeout");
    }
}
