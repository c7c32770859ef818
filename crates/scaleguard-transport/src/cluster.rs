//! The Resource Cluster collaborator — owns the executor registry,
//! answers usage queries and idle-instance lookups.

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::types::{
    GetClusterIdleInstancesRequest, GetClusterIdleInstancesResponse, GetClusterUsageRequest,
    GetClusterUsageResponse,
};

/// Queries the Resource Cluster for usage and idle-instance data.
///
/// Implementations are expected to be idempotent and safe to call
/// concurrently from many controller instances — the controller never
/// holds a long-lived handle or lock on cluster state.
#[async_trait]
pub trait ClusterQuery: Send + Sync {
    async fn get_cluster_usage(
        &self,
        req: GetClusterUsageRequest,
    ) -> TransportResult<GetClusterUsageResponse>;

    async fn get_cluster_idle_instances(
        &self,
        req: GetClusterIdleInstancesRequest,
    ) -> TransportResult<GetClusterIdleInstancesResponse>;
}
