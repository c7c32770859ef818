//! Error taxonomy for the controller core.
//!
//! Per the error handling design, every variant here is handled locally
//! inside the actor loop — the controller never surfaces these to its
//! owner. The enum exists so the handling has a typed vocabulary and so
//! tests can assert on which case fired.

use thiserror::Error;

use scaleguard_transport::{SkuId, TransportError};

pub type ControllerResult<T> = Result<T, ControllerError>;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// A usage or idle-instance query failed or timed out. The
    /// affected SKU is skipped for this tick; cooldown is not touched.
    #[error("transient query error: {source}")]
    TransientQuery {
        #[source]
        source: TransportError,
    },

    /// The Rule Store could not be reached. The previous `RuleSet` is
    /// kept; the next `RefreshTick` retries.
    #[error("rule store error: {source}")]
    RuleStore {
        #[source]
        source: TransportError,
    },

    /// The Host Provisioner rejected or failed to receive a scale
    /// request. The pending entry (if any) is already cleared by this
    /// point; cooldown was already recorded when the decision was made.
    #[error("dispatch error for sku {sku_id}: {source}")]
    Dispatch {
        sku_id: SkuId,
        #[source]
        source: TransportError,
    },

    /// A usage entry violated an invariant (e.g. `idle_count >
    /// total_count`). The entry is dropped with a warning; other SKUs
    /// are processed normally.
    #[error("invariant violation for sku {sku_id}: {detail}")]
    InvariantViolation { sku_id: SkuId, detail: String },
}
