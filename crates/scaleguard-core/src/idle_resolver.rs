//! `IdleResolver` — for scale-down decisions, tracks the pending
//! idle-instance query and correlates the eventual reply back to it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use scaleguard_transport::{
    GetClusterIdleInstancesRequest, MachineDefinition, ScaleDecision, SkuId,
};
use tracing::debug;

use crate::model::PendingScaleDown;

/// Tracks in-flight scale-down resolutions for one cluster, keyed by
/// `(sku_id, desire_size)`.
#[derive(Default)]
pub struct IdleResolver {
    pending: HashMap<(SkuId, u32), PendingScaleDown>,
}

impl IdleResolver {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Build the idle-instance request for a scale-down decision, and
    /// register a pending entry so the eventual reply can be matched.
    ///
    /// Returns `None` (and registers nothing) when `total <= desire_size`,
    /// since `max_instance_count` would be zero or negative — the
    /// decision's rule-level no-op rejection means this should not
    /// normally happen, but a defensive guard is cheap.
    pub fn prepare(
        &mut self,
        decision: &ScaleDecision,
        machine_def: MachineDefinition,
        total: u32,
        now: Instant,
    ) -> Option<GetClusterIdleInstancesRequest> {
        let max_instance_count = total.checked_sub(decision.desire_size)?;
        if max_instance_count == 0 {
            debug!(
                sku_id = %decision.sku_id,
                total,
                desire_size = decision.desire_size,
                "skipping idle-instance query: max_instance_count is zero"
            );
            return None;
        }

        self.pending.insert(
            (decision.sku_id.clone(), decision.desire_size),
            PendingScaleDown {
                sku_id: decision.sku_id.clone(),
                desire_size: decision.desire_size,
                created_at: now,
            },
        );

        Some(GetClusterIdleInstancesRequest {
            cluster_id: decision.cluster_id.clone(),
            sku_id: decision.sku_id.clone(),
            machine_def,
            desire_size: decision.desire_size,
            max_instance_count,
        })
    }

    /// Correlate a reply to a pending entry, removing it if matched.
    /// A reply with no matching entry is dropped by the caller (logged
    /// at debug) rather than treated as an error.
    pub fn resolve(&mut self, sku_id: &str, desire_size: u32) -> Option<PendingScaleDown> {
        self.pending.remove(&(sku_id.to_string(), desire_size))
    }

    /// Drop pending entries older than `ttl`. Called once per sample
    /// tick; entries are bounded to strictly younger than the
    /// rule-refresh interval by construction (`ttl` is
    /// `sample_interval * 2`).
    pub fn sweep_expired(&mut self, now: Instant, ttl: Duration) {
        self.pending
            .retain(|_, pending| now.saturating_duration_since(pending.created_at) < ttl);
    }
}
