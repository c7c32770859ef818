//! The Rule Store collaborator — persists per-cluster scaling specs.
//!
//! The core consumes a snapshot on demand; it never merges or mutates
//! the store's state directly.

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::RuleSetSnapshot;

/// Fetches the current scaling rules for a cluster.
///
/// An empty snapshot (`rules` empty) is a valid response — the
/// controller simply idles for SKUs it has no rule for.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get_scale_rules(&self, cluster_id: &str) -> TransportResult<RuleSetSnapshot>;
}
