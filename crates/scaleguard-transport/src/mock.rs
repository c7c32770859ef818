//! In-memory reference implementation of all three collaborators.
//!
//! Stands in for the real Resource Cluster, Host Provisioner, and Rule
//! Store in tests and in the bundled demo binary — none of which are
//! part of this repository's scope. Fixtures are set with the `set_*`
//! methods; dispatched scale requests are recorded and readable via
//! [`MockTransport::dispatched`] for assertions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::cluster::ClusterQuery;
use crate::error::{TransportError, TransportResult};
use crate::provisioner::HostProvisioner;
use crate::rule_store::RuleStore;
use crate::types::{
    ClusterId, GetClusterIdleInstancesRequest, GetClusterIdleInstancesResponse,
    GetClusterUsageRequest, GetClusterUsageResponse, InstanceId, RuleSetSnapshot, ScaleResourceRequest,
    ScaleSpec, SkuId, UsageByMachineDefinition,
};

#[derive(Default)]
struct MockState {
    rules: BTreeMap<SkuId, ScaleSpec>,
    usage: Vec<UsageByMachineDefinition>,
    idle_instances: BTreeMap<SkuId, Vec<InstanceId>>,
    dispatched: Vec<ScaleResourceRequest>,
    cluster_unavailable: bool,
    rule_store_unavailable: bool,
}

/// A shared, cloneable in-memory transport implementing
/// [`RuleStore`], [`ClusterQuery`], and [`HostProvisioner`].
#[derive(Clone)]
pub struct MockTransport {
    cluster_id: ClusterId,
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(cluster_id: impl Into<ClusterId>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Replace the rule snapshot the next `get_scale_rules` call returns.
    pub async fn set_rules(&self, rules: BTreeMap<SkuId, ScaleSpec>) {
        self.state.lock().await.rules = rules;
    }

    /// Replace the usage snapshot the next `get_cluster_usage` call returns.
    pub async fn set_usage(&self, usage: Vec<UsageByMachineDefinition>) {
        self.state.lock().await.usage = usage;
    }

    /// Set which instance IDs are returned as idle for a given SKU.
    pub async fn set_idle_instances(&self, sku_id: impl Into<SkuId>, instances: Vec<InstanceId>) {
        self.state
            .lock()
            .await
            .idle_instances
            .insert(sku_id.into(), instances);
    }

    /// Simulate the Resource Cluster being unreachable for subsequent
    /// usage/idle queries.
    pub async fn set_cluster_unavailable(&self, unavailable: bool) {
        self.state.lock().await.cluster_unavailable = unavailable;
    }

    /// Simulate the Rule Store being unreachable for subsequent refreshes.
    pub async fn set_rule_store_unavailable(&self, unavailable: bool) {
        self.state.lock().await.rule_store_unavailable = unavailable;
    }

    /// All `ScaleResourceRequest`s dispatched so far, in dispatch order.
    pub async fn dispatched(&self) -> Vec<ScaleResourceRequest> {
        self.state.lock().await.dispatched.clone()
    }
}

#[async_trait]
impl RuleStore for MockTransport {
    async fn get_scale_rules(&self, cluster_id: &str) -> TransportResult<RuleSetSnapshot> {
        let state = self.state.lock().await;
        if state.rule_store_unavailable {
            return Err(TransportError::Unavailable {
                collaborator: "rule store",
                detail: "mock configured unavailable".into(),
            });
        }
        Ok(RuleSetSnapshot {
            cluster_id: cluster_id.to_string(),
            rules: state.rules.clone(),
        })
    }
}

#[async_trait]
impl ClusterQuery for MockTransport {
    async fn get_cluster_usage(
        &self,
        req: GetClusterUsageRequest,
    ) -> TransportResult<GetClusterUsageResponse> {
        let state = self.state.lock().await;
        if state.cluster_unavailable {
            return Err(TransportError::Unavailable {
                collaborator: "resource cluster",
                detail: "mock configured unavailable".into(),
            });
        }
        Ok(GetClusterUsageResponse {
            cluster_id: req.cluster_id,
            usages: state.usage.clone(),
        })
    }

    async fn get_cluster_idle_instances(
        &self,
        req: GetClusterIdleInstancesRequest,
    ) -> TransportResult<GetClusterIdleInstancesResponse> {
        let state = self.state.lock().await;
        if state.cluster_unavailable {
            return Err(TransportError::Unavailable {
                collaborator: "resource cluster",
                detail: "mock configured unavailable".into(),
            });
        }
        let instance_ids = state
            .idle_instances
            .get(&req.sku_id)
            .cloned()
            .unwrap_or_default();
        Ok(GetClusterIdleInstancesResponse {
            cluster_id: req.cluster_id,
            sku_id: req.sku_id,
            desire_size: req.desire_size,
            instance_ids,
        })
    }
}

#[async_trait]
impl HostProvisioner for MockTransport {
    async fn scale_resource(&self, req: ScaleResourceRequest) -> TransportResult<()> {
        self.state.lock().await.dispatched.push(req);
        Ok(())
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("cluster_id", &self.cluster_id)
            .finish()
    }
}
