//! The Host Provisioner collaborator — actuates scale requests against
//! the underlying fleet (cloud ASG, Kubernetes, etc.).

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::ScaleResourceRequest;

/// Dispatches scale requests to the fleet.
///
/// Idempotent at the provisioner — the controller may resend a request
/// after cooldown without coordinating with a prior attempt. Dispatch is
/// fire-and-forget from the controller's perspective: it does not wait
/// for fleet convergence before advancing to the next tick.
#[async_trait]
pub trait HostProvisioner: Send + Sync {
    async fn scale_resource(&self, req: ScaleResourceRequest) -> TransportResult<()>;
}
