//! `Dispatcher` — maps a ready decision onto a `ScaleResourceRequest`
//! for the Host Provisioner.

use scaleguard_transport::{InstanceId, ScaleDecision, ScaleResourceRequest};

pub struct Dispatcher;

impl Dispatcher {
    /// Build the outbound scale request for a decision. `idle_instances`
    /// must be `Some` for `ScaleDown` and `None` for `ScaleUp` — the
    /// controller enforces this by only calling the two construction
    /// paths below from the matching branch.
    pub fn for_scale_up(decision: &ScaleDecision) -> ScaleResourceRequest {
        ScaleResourceRequest {
            cluster_id: decision.cluster_id.clone(),
            sku_id: decision.sku_id.clone(),
            desire_size: decision.desire_size,
            idle_instances: None,
        }
    }

    pub fn for_scale_down(
        cluster_id: &str,
        sku_id: &str,
        desire_size: u32,
        idle_instances: Vec<InstanceId>,
    ) -> ScaleResourceRequest {
        ScaleResourceRequest {
            cluster_id: cluster_id.to_string(),
            sku_id: sku_id.to_string(),
            desire_size,
            idle_instances: Some(idle_instances),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaleguard_transport::ScaleType;

    #[test]
    fn scale_up_request_has_no_idle_instances() {
        let decision = ScaleDecision {
            cluster_id: "cluster-1".to_string(),
            sku_id: "small".to_string(),
            r#type: ScaleType::ScaleUp,
            desire_size: 11,
            min_size: 11,
            max_size: 11,
        };
        let req = Dispatcher::for_scale_up(&decision);
        assert!(req.idle_instances.is_none());
        assert_eq!(req.desire_size, 11);
    }

    #[test]
    fn scale_down_request_carries_idle_instances() {
        let req = Dispatcher::for_scale_down("cluster-1", "large", 15, vec!["agent1".to_string()]);
        assert_eq!(req.idle_instances, Some(vec!["agent1".to_string()]));
    }
}
