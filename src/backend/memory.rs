//! In-process backend. Same contract as the hosted service, minus
//! row-level security: any signed-in caller may write any row.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::auth::{Session, SignUpOutcome, User, MIN_PASSWORD_LEN};

use super::{
    AuthBackend, ChangeEvent, ChangeFeed, ChangeKind, Filter, Query, RealtimeBackend,
    StorageBackend, TableBackend,
};

const SESSION_TTL_SECS: i64 = 3600;

#[derive(Default)]
struct State {
    users: HashMap<String, (String, User)>,
    access_tokens: HashMap<String, Uuid>,
    refresh_tokens: HashMap<String, Uuid>,
    tables: HashMap<String, Vec<Value>>,
    objects: HashMap<(String, String), Bytes>,
    password_resets: Vec<String>,
    failing_tables: HashSet<String>,
    last_stamp: Option<DateTime<Utc>>,
}

impl State {
    /// Creation stamps strictly increase so newest-first ordering is total.
    fn next_stamp(&mut self) -> String {
        let mut now = Utc::now();
        if let Some(last) = self.last_stamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_stamp = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

pub struct MemoryBackend {
    state: Mutex<State>,
    changes: broadcast::Sender<ChangeEvent>,
    table_requests: AtomicUsize,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { state: Mutex::new(State::default()), changes, table_requests: AtomicUsize::new(0) }
    }

    /// Number of table requests served so far.
    pub fn table_requests(&self) -> usize {
        self.table_requests.load(AtomicOrdering::SeqCst)
    }

    /// Make every request on `table` fail with a 503.
    pub fn fail_table(&self, table: &str) {
        self.lock().failing_tables.insert(table.to_string());
    }

    /// Emails that asked for a password reset.
    pub fn password_resets(&self) -> Vec<String> {
        self.lock().password_resets.clone()
    }

    /// Raw rows of a table, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means another test thread panicked mid-write.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn begin(&self, state: &State, table: &str) -> Result<()> {
        self.table_requests.fetch_add(1, AtomicOrdering::SeqCst);
        if state.failing_tables.contains(table) {
            return Err(AppError::Backend { status: 503, message: format!("{table} unavailable") });
        }
        Ok(())
    }

    fn require_user(state: &State, token: Option<&str>) -> Result<Uuid> {
        token
            .and_then(|t| state.access_tokens.get(t))
            .copied()
            .ok_or(AppError::Backend { status: 401, message: "JWT required".into() })
    }

    fn issue_session(state: &mut State, user: &User) -> Session {
        let access_token = Uuid::new_v4().simple().to_string();
        let refresh_token = Uuid::new_v4().simple().to_string();
        state.access_tokens.insert(access_token.clone(), user.id);
        state.refresh_tokens.insert(refresh_token.clone(), user.id);
        Session {
            access_token,
            refresh_token,
            expires_in: Some(SESSION_TTL_SECS),
            expires_at: None,
            user: user.clone(),
        }
        .stamped(Utc::now())
    }

    fn user_by_id(state: &State, id: Uuid) -> Option<User> {
        state.users.values().find(|(_, u)| u.id == id).map(|(_, u)| u.clone())
    }

    fn publish(&self, table: &str, kind: ChangeKind, record: Option<Value>, old_record: Option<Value>) {
        // No receivers is fine.
        let _ = self.changes.send(ChangeEvent { table: table.to_string(), kind, record, old_record });
    }
}

/// Fill in the column defaults the hosted schema would apply.
fn with_defaults(row: Value, state: &mut State) -> Result<Map<String, Value>> {
    let mut row = match row {
        Value::Object(map) => map,
        _ => return Err(AppError::Backend { status: 400, message: "row must be an object".into() }),
    };
    row.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    if !row.contains_key("created_at") {
        row.insert("created_at".into(), Value::String(state.next_stamp()));
    }
    Ok(row)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// SQL LIKE, case-insensitive: `%` matches any run of characters and
/// `_` exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let (mut t, mut p) = (0, 0);
    // Last `%` seen and the text position it currently absorbs up to.
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    backtrack = Some((star, absorbed + 1));
                    p = star + 1;
                    t = absorbed + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn matches(row: &Map<String, Value>, filter: &Filter) -> bool {
    let cell = row.get(filter.column()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, Value::Null) => cell.is_null(),
        Filter::Eq(_, expected) => cell == expected,
        Filter::ILike(_, pattern) => cell.as_str().is_some_and(|s| like(s, pattern)),
        Filter::Gte(_, bound) => compare(cell, bound).is_some_and(|o| o != Ordering::Less),
        Filter::Lte(_, bound) => compare(cell, bound).is_some_and(|o| o != Ordering::Greater),
    }
}

fn matches_all(row: &Value, query: &Query) -> bool {
    row.as_object().is_some_and(|r| query.filters.iter().all(|f| matches(r, f)))
}

/// Plain column lists are projected; `*` and embed expressions return whole rows.
fn project(row: Value, select: &str) -> Value {
    if select.trim_start().starts_with('*') || select.contains('(') {
        return row;
    }
    let map = match row {
        Value::Object(map) => map,
        other => return other,
    };
    let projected: Map<String, Value> = select
        .split(',')
        .map(str::trim)
        .filter_map(|col| map.get(col).map(|v| (col.to_string(), v.clone())))
        .collect();
    Value::Object(projected)
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<SignUpOutcome> {
        let mut state = self.lock();
        let key = email.trim().to_lowercase();
        if state.users.contains_key(&key) {
            return Err(AppError::auth("User already registered"));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::auth("Password should be at least 6 characters"));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: Some(key.clone()),
            created_at: Some(Utc::now()),
            user_metadata: metadata,
        };
        state.users.insert(key, (password.to_string(), user.clone()));
        Ok(SignUpOutcome::SignedIn(Self::issue_session(&mut state, &user)))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut state = self.lock();
        let user = match state.users.get(&email.trim().to_lowercase()) {
            Some((stored, user)) if stored == password => user.clone(),
            _ => return Err(AppError::auth("Invalid login credentials")),
        };
        Ok(Self::issue_session(&mut state, &user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(user_id) = state.access_tokens.remove(access_token) {
            state.refresh_tokens.retain(|_, id| *id != user_id);
        }
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User> {
        let state = self.lock();
        state
            .access_tokens
            .get(access_token)
            .and_then(|id| Self::user_by_id(&state, *id))
            .ok_or_else(|| AppError::auth("Invalid JWT"))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session> {
        let mut state = self.lock();
        let user = state
            .refresh_tokens
            .remove(refresh_token)
            .and_then(|id| Self::user_by_id(&state, id))
            .ok_or_else(|| AppError::auth("Invalid Refresh Token"))?;
        Ok(Self::issue_session(&mut state, &user))
    }

    async fn reset_password(&self, email: &str, _redirect_to: &str) -> Result<()> {
        self.lock().password_resets.push(email.trim().to_lowercase());
        Ok(())
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select(&self, table: &str, query: &Query, _token: Option<&str>) -> Result<Vec<Value>> {
        let state = self.lock();
        self.begin(&state, table)?;
        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches_all(r, query)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let x = a.get(&order.column).unwrap_or(&Value::Null);
                let y = b.get(&order.column).unwrap_or(&Value::Null);
                let ord = match (x.is_null(), y.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => return Ordering::Greater,
                    (false, true) => return Ordering::Less,
                    _ => compare(x, y).unwrap_or(Ordering::Equal),
                };
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows.into_iter().map(|r| project(r, &query.select)).collect())
    }

    async fn insert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value> {
        let row = {
            let mut state = self.lock();
            self.begin(&state, table)?;
            Self::require_user(&state, token)?;
            let row = Value::Object(with_defaults(row, &mut state)?);
            state.tables.entry(table.to_string()).or_default().push(row.clone());
            row
        };
        self.publish(table, ChangeKind::Insert, Some(row.clone()), None);
        Ok(row)
    }

    async fn upsert(&self, table: &str, row: Value, token: Option<&str>) -> Result<Value> {
        let (row, old) = {
            let mut state = self.lock();
            self.begin(&state, table)?;
            Self::require_user(&state, token)?;
            let row = with_defaults(row, &mut state)?;
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            let rows = state.tables.entry(table.to_string()).or_default();
            match rows.iter_mut().find(|r| r.get("id") == Some(&id)) {
                Some(existing) => {
                    let old = existing.clone();
                    if let Value::Object(map) = existing {
                        for (k, v) in row {
                            // Keep the original creation stamp.
                            if k != "created_at" {
                                map.insert(k, v);
                            }
                        }
                    }
                    (existing.clone(), Some(old))
                }
                None => {
                    let row = Value::Object(row);
                    rows.push(row.clone());
                    (row, None)
                }
            }
        };
        let kind = if old.is_some() { ChangeKind::Update } else { ChangeKind::Insert };
        self.publish(table, kind, Some(row.clone()), old);
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
        token: Option<&str>,
    ) -> Result<Vec<Value>> {
        let Value::Object(patch) = patch else {
            return Err(AppError::Backend { status: 400, message: "patch must be an object".into() });
        };
        let changed = {
            let mut state = self.lock();
            self.begin(&state, table)?;
            Self::require_user(&state, token)?;
            let mut changed = Vec::new();
            for row in state.tables.entry(table.to_string()).or_default().iter_mut() {
                if !matches_all(row, query) {
                    continue;
                }
                let old = row.clone();
                if let Value::Object(map) = row {
                    for (k, v) in &patch {
                        map.insert(k.clone(), v.clone());
                    }
                }
                changed.push((row.clone(), old));
            }
            changed
        };
        for (row, old) in &changed {
            self.publish(table, ChangeKind::Update, Some(row.clone()), Some(old.clone()));
        }
        Ok(changed.into_iter().map(|(row, _)| row).collect())
    }

    async fn delete(&self, table: &str, query: &Query, token: Option<&str>) -> Result<()> {
        let removed = {
            let mut state = self.lock();
            self.begin(&state, table)?;
            Self::require_user(&state, token)?;
            let rows = state.tables.entry(table.to_string()).or_default();
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| matches_all(r, query));
            *rows = kept;
            removed
        };
        for old in removed {
            self.publish(table, ChangeKind::Delete, None, Some(old));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        body: Bytes,
        _content_type: &str,
        token: Option<&str>,
    ) -> Result<String> {
        let mut state = self.lock();
        Self::require_user(&state, token)?;
        let key = (bucket.to_string(), path.to_string());
        if state.objects.contains_key(&key) {
            return Err(AppError::Backend { status: 409, message: "The resource already exists".into() });
        }
        state.objects.insert(key, body);
        Ok(format!("{bucket}/{path}"))
    }

    async fn download(&self, bucket: &str, path: &str, _token: Option<&str>) -> Result<Bytes> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("{bucket}/{path}")))
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("memory://storage/v1/object/public/{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, paths: &[String], token: Option<&str>) -> Result<()> {
        let mut state = self.lock();
        Self::require_user(&state, token)?;
        for path in paths {
            state.objects.remove(&(bucket.to_string(), path.clone()));
        }
        Ok(())
    }
}

#[async_trait]
impl RealtimeBackend for MemoryBackend {
    async fn subscribe(
        &self,
        table: &str,
        event: ChangeKind,
        _token: Option<&str>,
    ) -> Result<ChangeFeed> {
        let mut changes = self.changes.subscribe();
        let (tx, rx) = mpsc::channel(256);
        let table = table.to_string();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if change.table != table || !event.matches(change.kind) {
                            continue;
                        }
                        if tx.send(change).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(skipped = n, "Realtime feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(ChangeFeed::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_like_patterns() {
        assert!(like("Dupont", "%dup%"));
        assert!(like("Dupont", "dup%"));
        assert!(!like("Dupont", "%dup"));
        assert!(like("Saint-Étienne", "%étienne%"));
        assert!(like("abc", "%"));
        assert!(!like("ab", "a%b%c"));
        assert!(like("aXbYc", "a%b%c"));
        assert!(like("", "%"));
        assert!(!like("", "_"));
    }

    #[test]
    fn test_like_single_character_wildcard() {
        assert!(like("Dupont", "dup_nt"));
        assert!(!like("Dupnt", "dup_nt"));
        assert!(!like("Duppont", "dup_nt"));
        assert!(like("Jean-Marie", "%jean_marie%"));
        assert!(like("Zoé", "zo_"));
        assert!(like("Lefèvre", "%f_vre"));
    }

    #[tokio::test]
    async fn test_writes_require_a_session() {
        let backend = MemoryBackend::new();
        let err = backend.insert("people", json!({ "first_name": "A" }), None).await.unwrap_err();
        assert!(matches!(err, AppError::Backend { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_limits() {
        let backend = MemoryBackend::new();
        let SignUpOutcome::SignedIn(session) =
            backend.sign_up("a@b.c", "secret", Value::Null).await.unwrap()
        else {
            panic!("expected session");
        };
        let token = Some(session.access_token.as_str());
        for (name, year) in [("Anne", 1850), ("Paul", 1851), ("Annick", 1852)] {
            backend
                .insert(
                    "people",
                    json!({ "first_name": name, "birth_date": format!("{year}-06-01") }),
                    token,
                )
                .await
                .unwrap();
        }

        let q = Query::new().contains("first_name", "ANN").order_by("birth_date", false).limit(1);
        let rows = backend.select("people", &q, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["first_name"], "Annick");

        let q = Query::new().select("first_name").lte("birth_date", "1850-12-31");
        let rows = backend.select("people", &q, None).await.unwrap();
        assert_eq!(rows, vec![json!({ "first_name": "Anne" })]);
    }

    #[tokio::test]
    async fn test_duplicate_registration_is_an_auth_error() {
        let backend = MemoryBackend::new();
        backend.sign_up("a@b.c", "secret", Value::Null).await.unwrap();
        let err = backend.sign_up("A@B.C", "secret", Value::Null).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }

    #[tokio::test]
    async fn test_subscription_receives_matching_changes() {
        let backend = MemoryBackend::new();
        let session = backend.sign_up("a@b.c", "secret", Value::Null).await.unwrap();
        let SignUpOutcome::SignedIn(session) = session else { panic!("expected session") };
        let token = Some(session.access_token.as_str());

        let mut feed = backend.subscribe("people", ChangeKind::Insert, None).await.unwrap();
        backend.insert("profiles", json!({ "id": "x" }), token).await.unwrap();
        backend.insert("people", json!({ "first_name": "Anne" }), token).await.unwrap();

        let change = feed.next().await.unwrap();
        assert_eq!(change.table, "people");
        assert_eq!(change.kind, ChangeKind::Insert);
        assert_eq!(change.record.unwrap()["first_name"], "Anne");
    }
}
