//! Domain and wire types shared between the controller core and every
//! external collaborator (Resource Cluster, Host Provisioner, Rule Store).
//!
//! All types are plain data — `Serialize`/`Deserialize` even though this
//! repository never itself puts them on a wire, so that whichever
//! transport a deployment wires in (gRPC, HTTP, an in-process channel)
//! can (de)serialize them without a wrapper layer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identifier for a cluster under control. One controller per cluster.
pub type ClusterId = String;

/// Opaque identifier for a machine class ("SKU"), unique per cluster.
pub type SkuId = String;

/// Identifier for a concrete executor instance, as handed back by the
/// Resource Cluster's idle-instance lookup.
pub type InstanceId = String;

/// Immutable descriptor of a machine class's hardware shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineDefinition {
    pub cpu_cores: u32,
    pub mem_mb: u64,
    pub network_mbps: u32,
    pub disk_mb: u64,
    pub num_ports: u32,
}

/// Per-SKU availability rule configuration, as loaded from the Rule Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleSpec {
    pub cluster_id: ClusterId,
    pub sku_id: SkuId,
    pub min_size: u32,
    pub max_size: u32,
    pub min_idle_to_keep: u32,
    pub max_idle_to_keep: u32,
    pub cool_down_secs: u64,
}

/// A usage snapshot for a single SKU at sample time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageByMachineDefinition {
    pub sku_id: SkuId,
    pub def: MachineDefinition,
    pub idle_count: u32,
    pub total_count: u32,
}

/// A full cluster usage snapshot: one entry per active SKU. No ordering
/// is implied by the wire representation — the evaluator sorts by
/// `sku_id` before processing.
pub type ClusterUsage = Vec<UsageByMachineDefinition>;

/// Direction (or absence) of a scaling action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleType {
    ScaleUp,
    ScaleDown,
    NoOp,
}

/// A scaling decision emitted by a rule. Only constructed with
/// `type != NoOp` — a rule that decides nothing returns no decision at
/// all, rather than a `NoOp` one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleDecision {
    pub cluster_id: ClusterId,
    pub sku_id: SkuId,
    pub r#type: ScaleType,
    pub desire_size: u32,
    pub min_size: u32,
    pub max_size: u32,
}

/// Outbound request to the Host Provisioner. `idle_instances` is present
/// only for scale-down actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleResourceRequest {
    pub cluster_id: ClusterId,
    pub sku_id: SkuId,
    pub desire_size: u32,
    pub idle_instances: Option<Vec<InstanceId>>,
}

/// A snapshot of the full rule set for one cluster, as served by the
/// Rule Store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetSnapshot {
    pub cluster_id: ClusterId,
    pub rules: BTreeMap<SkuId, ScaleSpec>,
}

// ── Resource Cluster request/response pairs ────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetClusterUsageRequest {
    pub cluster_id: ClusterId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetClusterUsageResponse {
    pub cluster_id: ClusterId,
    pub usages: ClusterUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetClusterIdleInstancesRequest {
    pub cluster_id: ClusterId,
    pub sku_id: SkuId,
    pub machine_def: MachineDefinition,
    pub desire_size: u32,
    pub max_instance_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetClusterIdleInstancesResponse {
    pub cluster_id: ClusterId,
    pub sku_id: SkuId,
    pub desire_size: u32,
    pub instance_ids: Vec<InstanceId>,
}

// ── Introspection ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRuleSetResponse {
    pub rules: BTreeMap<SkuId, ScaleSpec>,
}
