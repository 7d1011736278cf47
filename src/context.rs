//! Application context: config, backend handle and the current session.
//!
//! Built once at startup and updated on every auth change.

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock, Weak};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::auth::{AuthEvent, Session, User};

type Listener = Arc<dyn Fn(AuthEvent, Option<&Session>) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<u64, Listener>,
}

/// Handle returned by [`AppContext::on_auth_change`]. The listener is
/// released when the handle is dropped.
pub struct AuthSubscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.listeners.remove(&self.id);
        }
    }
}

/// Where the session survives between runs.
#[derive(Debug, Clone)]
pub enum SessionStore {
    File(PathBuf),
    Ephemeral,
}

impl SessionStore {
    fn load(&self) -> Option<Session> {
        let SessionStore::File(path) = self else { return None };
        let raw = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the session readable by the owner only. It holds bearer tokens.
    fn save(&self, session: &Session) -> Result<()> {
        let SessionStore::File(path) = self else { return Ok(()) };
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            // `mode` only applies on creation.
            if path.exists() {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
        }
        let mut file = options.open(path)?;
        file.write_all(&serde_json::to_vec_pretty(session)?)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if let SessionStore::File(path) = self {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

pub struct AppContext {
    config: Arc<Config>,
    backend: Arc<dyn Backend>,
    store: SessionStore,
    session: RwLock<Option<Session>>,
    listeners: Arc<Mutex<Registry>>,
}

impl AppContext {
    pub fn new(config: Arc<Config>, backend: Arc<dyn Backend>, store: SessionStore) -> Self {
        Self {
            config,
            backend,
            store,
            session: RwLock::new(None),
            listeners: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Build the context and restore a persisted session, refreshing it
    /// when it has expired.
    pub async fn init(
        config: Arc<Config>,
        backend: Arc<dyn Backend>,
        store: SessionStore,
    ) -> Result<Self> {
        let ctx = Self::new(config, backend, store);
        let Some(stored) = ctx.store.load() else {
            debug!("No stored session");
            return Ok(ctx);
        };

        if !stored.is_expired(Utc::now()) {
            info!(user = %stored.user.id, "Session restored");
            *ctx.session.write().unwrap_or_else(|e| e.into_inner()) = Some(stored);
            return Ok(ctx);
        }

        match ctx.backend.refresh_session(&stored.refresh_token).await {
            Ok(fresh) => {
                info!(user = %fresh.user.id, "Expired session refreshed");
                ctx.store.save(&fresh)?;
                *ctx.session.write().unwrap_or_else(|e| e.into_inner()) = Some(fresh);
            }
            Err(e) => {
                warn!("Stored session could not be refreshed: {}", e);
                ctx.store.clear()?;
            }
        }
        Ok(ctx)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn session(&self) -> Option<Session> {
        self.session.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn user(&self) -> Option<User> {
        self.session().map(|s| s.user)
    }

    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    pub fn require_user(&self) -> Result<User> {
        self.user().ok_or_else(|| AppError::auth("Vous devez être connecté"))
    }

    /// Register a listener. It is called right away with
    /// `InitialSession`, then on every later auth change.
    pub fn on_auth_change<F>(&self, listener: F) -> AuthSubscription
    where
        F: Fn(AuthEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let id = {
            let mut registry = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            registry.next_id += 1;
            let id = registry.next_id;
            registry.listeners.insert(id, listener.clone());
            id
        };
        listener(AuthEvent::InitialSession, self.session().as_ref());
        AuthSubscription { id, registry: Arc::downgrade(&self.listeners) }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner()).listeners.len()
    }

    pub fn set_session(&self, session: Session, event: AuthEvent) -> Result<()> {
        self.store.save(&session)?;
        *self.session.write().unwrap_or_else(|e| e.into_inner()) = Some(session.clone());
        self.emit(event, Some(&session));
        Ok(())
    }

    /// Drop the session everywhere and tell listeners.
    pub fn clear_session(&self) -> Result<()> {
        self.session.write().unwrap_or_else(|e| e.into_inner()).take();
        self.store.clear()?;
        self.emit(AuthEvent::SignedOut, None);
        Ok(())
    }

    pub fn emit(&self, event: AuthEvent, session: Option<&Session>) {
        // Snapshot so listeners may subscribe or unsubscribe while running.
        let listeners: Vec<Listener> = {
            let registry = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            registry.listeners.values().cloned().collect()
        };
        debug!(?event, listeners = listeners.len(), "Auth state changed");
        for listener in listeners {
            listener(event, session);
        }
    }
}
