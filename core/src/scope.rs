//! Fixed team/database scope shared between clients.
//!
//! # Design
//! Every client built with `NinoxClient::new` points at the same process-wide
//! `SharedScope`, so fixing a team on one client fixes it for all of them:
//! last writer wins, and the change is visible to calls already running on
//! other threads. Tests and callers that want isolation build their clients
//! over a private `SharedScope` instead.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::types::Scope;

static GLOBAL_SCOPE: OnceLock<SharedScope> = OnceLock::new();

/// Cloneable handle to a fixed scope. Clones observe each other's writes.
#[derive(Debug, Clone, Default)]
pub struct SharedScope {
    inner: Arc<RwLock<Scope>>,
}

impl SharedScope {
    /// A new scope not shared with anyone yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope shared by every client in this process.
    pub fn global() -> SharedScope {
        GLOBAL_SCOPE.get_or_init(SharedScope::new).clone()
    }

    pub fn set_team(&self, team: Option<&str>) {
        self.inner.write().team = team.map(str::to_string);
    }

    pub fn set_database(&self, database: Option<&str>) {
        self.inner.write().database = database.map(str::to_string);
    }

    pub fn snapshot(&self) -> Scope {
        self.inner.read().clone()
    }

    pub fn shares_with(&self, other: &SharedScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}
