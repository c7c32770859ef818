//! scaleguard-transport — collaborator traits and wire types for the
//! autoscaling controller's external dependencies.
//!
//! The controller core never hard-codes a transport: it depends on
//! `Arc<dyn RuleStore>`, `Arc<dyn ClusterQuery>`, `Arc<dyn HostProvisioner>`
//! so that a deployment can wire in gRPC, HTTP, or an in-process channel
//! without touching `scaleguard-core`.
//!
//! `mock` ships an in-memory implementation of all three traits for
//! tests and for the bundled demo binary.

pub mod cluster;
pub mod error;
pub mod mock;
pub mod provisioner;
pub mod rule_store;
pub mod types;

pub use cluster::ClusterQuery;
pub use error::{TransportError, TransportResult};
pub use mock::MockTransport;
pub use provisioner::HostProvisioner;
pub use rule_store::RuleStore;
pub use types::*;
