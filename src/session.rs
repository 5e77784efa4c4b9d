//! Session capability supplied by the external auth provider.
//!
//! The client only asks "who is signed in, and with which token"; signing in
//! and out belong to the provider.

use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user: String,
    pub token: Option<String>,
}

pub trait SessionProvider: Send + Sync {
    /// Current identity, `None` when signed out
    fn current(&self) -> Option<Identity>;
}

/// Session held in memory, switched by the embedding application
#[derive(Debug, Default)]
pub struct StaticSession {
    identity: RwLock<Option<Identity>>,
}

impl StaticSession {
    pub fn new(identity: Option<Identity>) -> Self {
        Self {
            identity: RwLock::new(identity),
        }
    }

    pub fn login(&self, identity: Identity) {
        tracing::info!(user = %identity.user, "Session started");
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(identity);
    }

    pub fn logout(&self) {
        tracing::info!("Session ended");
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl SessionProvider for StaticSession {
    fn current(&self) -> Option<Identity> {
        self.identity
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
