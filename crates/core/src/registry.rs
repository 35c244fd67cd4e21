//! The publisher table and session set.
//!
//! Both live under one reader/writer lock, owned here and exposed to
//! callers as `read()`/`write()` guards. The lock is not re-entrant: the
//! forwarder (in [`crate::forwarder`]) must be invoked with the read guard
//! already held by its caller (the interleaved RECORD loop or a UDP
//! receiver), never taking it itself.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{RtspError, Result};
use crate::publisher::Publisher;
use crate::session::Session;

#[derive(Default)]
pub struct RegistryInner {
    /// path -> the publisher currently occupying it. At most one per path.
    publishers: HashMap<String, Arc<dyn Publisher>>,
    /// All live TCP sessions, publisher and reader alike, keyed by session id.
    /// Used for forwarding fan-out and bulk close on shutdown.
    sessions: HashMap<String, Arc<Session>>,
}

impl RegistryInner {
    pub fn publisher(&self, path: &str) -> Option<Arc<dyn Publisher>> {
        self.publishers.get(path).cloned()
    }

    pub fn session(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).cloned()
    }

    /// All sessions at `path` whose state is `PLAY` (reader fan-out targets).
    pub fn readers_at(&self, path: &str) -> Vec<Arc<Session>> {
        use crate::session::SessionState;
        self.sessions
            .values()
            .filter(|s| s.path() == path && s.state() == SessionState::Play)
            .cloned()
            .collect()
    }

    pub fn all_sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.values().cloned().collect()
    }

    pub fn all_publishers(&self) -> Vec<Arc<dyn Publisher>> {
        self.publishers.values().cloned().collect()
    }
}

/// Thread-safe handle to the publisher table + session set, shared by the
/// TCP listener, the UDP listeners, and the pull-client pusher registry's
/// host server.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write()
    }

    pub fn insert_session(&self, session: Arc<Session>) {
        self.inner.write().sessions.insert(session.id.clone(), session);
    }

    pub fn remove_session(&self, id: &str) -> Option<Arc<Session>> {
        self.inner.write().sessions.remove(id)
    }

    /// Claim `path` for `publisher`, failing with [`RtspError::ResourceBusy`]
    /// if another publisher already owns it.
    pub fn register_publisher(&self, path: &str, publisher: Arc<dyn Publisher>) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.publishers.contains_key(path) {
            return Err(RtspError::ResourceBusy(path.to_string()));
        }
        inner.publishers.insert(path.to_string(), publisher);
        tracing::info!(path, "publisher registered");
        Ok(())
    }

    /// Vacate `path`'s publisher slot and close every reader session bound
    /// to it, in that order: on publisher close, its table entry is removed
    /// and every reader session bound to the same path is closed.
    pub fn unregister_publisher(&self, path: &str) {
        let readers = {
            let mut inner = self.inner.write();
            if inner.publishers.remove(path).is_none() {
                return;
            }
            inner.readers_at(path)
        };
        tracing::info!(path, readers = readers.len(), "publisher closed, cascading to readers");
        for reader in readers {
            reader.close();
        }
    }
}
