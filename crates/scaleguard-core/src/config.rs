//! Controller configuration.

use std::time::Duration;

use scaleguard_transport::ClusterId;

/// Configuration for a single [`crate::ScalerController`] instance.
///
/// One controller is configured per cluster; `sample_interval` and
/// `refresh_interval` are independent of each other.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub cluster_id: ClusterId,
    pub sample_interval: Duration,
    pub refresh_interval: Duration,
}

impl ControllerConfig {
    pub fn new(
        cluster_id: impl Into<ClusterId>,
        sample_interval: Duration,
        refresh_interval: Duration,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            sample_interval,
            refresh_interval,
        }
    }

    /// The lifetime a `PendingScaleDown` entry is allowed before it is
    /// swept as expired: twice the sample interval.
    pub fn pending_scale_down_ttl(&self) -> Duration {
        self.sample_interval * 2
    }
}
