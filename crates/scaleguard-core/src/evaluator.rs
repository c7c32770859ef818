//! `UsageEvaluator` — turns a cluster usage snapshot into an ordered
//! sequence of scaling decisions by invoking each SKU's rule.

use scaleguard_transport::{ClusterUsage, ScaleDecision};
use tracing::warn;

use crate::error::ControllerError;
use crate::model::RuleSet;

pub struct UsageEvaluator;

impl UsageEvaluator {
    /// Evaluate a usage snapshot against the current rule set.
    ///
    /// SKUs with no matching rule are skipped (unmanaged). Usage entries
    /// violating `idle_count <= total_count` are dropped with a warning;
    /// the rest of the snapshot is still processed. The output is
    /// ordered by `sku_id` ascending so callers (and tests) see a
    /// deterministic sequence even though the input is an unordered set.
    pub fn evaluate(rules: &mut RuleSet, usage: &ClusterUsage) -> Vec<ScaleDecision> {
        let mut ordered: Vec<&scaleguard_transport::UsageByMachineDefinition> =
            usage.iter().collect();
        ordered.sort_by(|a, b| a.sku_id.cmp(&b.sku_id));

        let mut decisions = Vec::new();
        for entry in ordered {
            if entry.idle_count > entry.total_count {
                let error = ControllerError::InvariantViolation {
                    sku_id: entry.sku_id.clone(),
                    detail: format!("idle_count {} exceeds total_count {}", entry.idle_count, entry.total_count),
                };
                warn!(sku_id = %entry.sku_id, error = %error, "dropping usage entry");
                continue;
            }

            let Some(rule) = rules.get_mut(&entry.sku_id) else {
                continue;
            };

            if let Some(decision) = rule.apply(entry) {
                decisions.push(decision);
            }
        }
        decisions
    }
}
