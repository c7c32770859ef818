//! Error types for collaborator transports.

use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors a `RuleStore`, `ClusterQuery`, or `HostProvisioner`
/// implementation may return. The controller core maps these onto the
/// error taxonomy in its own error handling design; this enum only
/// needs to distinguish the cases the core treats differently.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {collaborator} timed out")]
    Timeout { collaborator: &'static str },

    #[error("{collaborator} unavailable: {detail}")]
    Unavailable {
        collaborator: &'static str,
        detail: String,
    },

    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("unknown sku: {0}")]
    UnknownSku(String),
}
