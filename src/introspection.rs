use crate::visitor::{Timestamp, VisitorStore};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only view of admission state plus manual per-identity reset.
#[derive(Clone)]
pub struct IntrospectionGateway {
    store: Arc<VisitorStore>,
}

impl IntrospectionGateway {
    pub fn new(store: Arc<VisitorStore>) -> Self {
        Self { store }
    }

    // identity -> admission timestamps, oldest first; sorted by identity
    pub fn list_all(&self) -> BTreeMap<String, Vec<Timestamp>> {
        self.store.snapshot().into_iter().collect()
    }

    /// Drops the identity's record so its next request starts a fresh quota.
    /// Returns whether a record existed.
    pub fn reset_identity(&self, identity: &str) -> bool {
        let removed = self.store.remove(identity);
        tracing::info!(identity = %identity, removed, "Visitor quota reset");
        removed
    }
}
