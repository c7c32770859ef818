//! `ScalerController` — the outer control loop.
//!
//! Implemented as a single-threaded actor: one `tokio` task owns all
//! mutable state (the `RuleSet`, the pending scale-down table, every
//! rule's cooldown clock) and drains a FIFO `tokio::sync::mpsc`
//! mailbox. Timers are two small forwarding tasks that tick an
//! interval and push a message into that same mailbox — so "a timer
//! fires" and "a query replied" are both just messages arriving in
//! order, and the actor body never needs to `select!` between them.
//!
//! The actor never blocks synchronously on I/O: each async request
//! (usage query, idle-instance query, rule-store fetch, scale dispatch)
//! is spawned as its own task that reports back into the mailbox on
//! completion, which is what makes the handler single-threaded without
//! serializing the underlying network calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use scaleguard_transport::{
    ClusterQuery, GetClusterIdleInstancesResponse, GetClusterUsageRequest,
    GetClusterUsageResponse, GetRuleSetResponse, HostProvisioner, RuleSetSnapshot, RuleStore,
    ScaleType, TransportError,
};

use crate::clock::Clock;
use crate::config::ControllerConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ControllerError, ControllerResult};
use crate::evaluator::UsageEvaluator;
use crate::idle_resolver::IdleResolver;
use crate::model::RuleSet;

const MAILBOX_CAPACITY: usize = 64;

enum ActorMessage {
    SampleTick,
    RefreshTick,
    UsageResult(Result<GetClusterUsageResponse, TransportError>),
    IdleResult(Result<GetClusterIdleInstancesResponse, TransportError>),
    RuleSetResult(Result<RuleSetSnapshot, TransportError>),
    GetRuleSet(oneshot::Sender<GetRuleSetResponse>),
    Shutdown,
}

/// A live handle to a spawned [`ScalerController`] actor.
///
/// Dropping the handle without calling [`ScalerHandle::shutdown`] leaves
/// the actor and its timers running; callers that need a clean stop
/// should always call `shutdown`.
pub struct ScalerHandle {
    mailbox: mpsc::Sender<ActorMessage>,
    sample_timer: tokio::task::JoinHandle<()>,
    refresh_timer: tokio::task::JoinHandle<()>,
    actor: tokio::task::JoinHandle<()>,
}

impl ScalerHandle {
    /// Introspection: fetch the currently installed rule set.
    pub async fn get_rule_set(&self) -> Option<GetRuleSetResponse> {
        let (tx, rx) = oneshot::channel();
        self.mailbox.send(ActorMessage::GetRuleSet(tx)).await.ok()?;
        rx.await.ok()
    }

    /// Cancel both timers, discard pending state, and stop the actor.
    /// Subsequent replies for in-flight queries are dropped.
    pub async fn shutdown(self) {
        self.sample_timer.abort();
        self.refresh_timer.abort();
        let _ = self.mailbox.send(ActorMessage::Shutdown).await;
        let _ = self.actor.await;
    }
}

/// The autoscaling control loop for a single cluster.
pub struct ScalerController {
    config: ControllerConfig,
    clock: Arc<dyn Clock>,
    rule_store: Arc<dyn RuleStore>,
    cluster: Arc<dyn ClusterQuery>,
    provisioner: Arc<dyn HostProvisioner>,
    rules: RuleSet,
    pending: IdleResolver,
    sampling_in_flight: bool,
    refreshing_in_flight: bool,
    mailbox: mpsc::Receiver<ActorMessage>,
    self_tx: mpsc::Sender<ActorMessage>,
}

impl ScalerController {
    /// Spawn a new controller: loads the rule set once (blocking this
    /// call on the first fetch), then starts the sample/refresh timers
    /// and the actor loop.
    pub async fn spawn(
        config: ControllerConfig,
        clock: Arc<dyn Clock>,
        rule_store: Arc<dyn RuleStore>,
        cluster: Arc<dyn ClusterQuery>,
        provisioner: Arc<dyn HostProvisioner>,
    ) -> ScalerHandle {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);

        let mut controller = Self {
            config: config.clone(),
            clock,
            rule_store,
            cluster,
            provisioner,
            rules: RuleSet::empty(),
            pending: IdleResolver::new(),
            sampling_in_flight: false,
            refreshing_in_flight: false,
            mailbox: rx,
            self_tx: tx.clone(),
        };

        // Initialized -> load rule set, blocking on the first fetch -> Running.
        controller.load_rules_blocking().await;

        let sample_timer = spawn_timer(tx.clone(), config.sample_interval, || ActorMessage::SampleTick);
        let refresh_timer = spawn_timer(tx.clone(), config.refresh_interval, || ActorMessage::RefreshTick);
        let actor = tokio::spawn(controller.run());

        ScalerHandle {
            mailbox: tx,
            sample_timer,
            refresh_timer,
            actor,
        }
    }

    async fn load_rules_blocking(&mut self) {
        match self.rule_store.get_scale_rules(&self.config.cluster_id).await {
            Ok(snapshot) if snapshot.cluster_id == self.config.cluster_id => {
                info!(
                    cluster_id = %self.config.cluster_id,
                    skus = snapshot.rules.len(),
                    "initial rule set loaded"
                );
                self.rules = RuleSet::replace_from(snapshot.rules, &self.config.cluster_id, Arc::clone(&self.clock));
            }
            Ok(snapshot) => {
                warn!(
                    expected = %self.config.cluster_id,
                    got = %snapshot.cluster_id,
                    "rule store returned a snapshot for a different cluster, starting with an empty rule set"
                );
            }
            Err(source) => {
                warn!(
                    cluster_id = %self.config.cluster_id,
                    error = %source,
                    "rule store unreachable on boot, starting with an empty rule set"
                );
            }
        }
    }

    async fn run(mut self) {
        info!(cluster_id = %self.config.cluster_id, "scaler controller running");

        while let Some(message) = self.mailbox.recv().await {
            let outcome = match message {
                ActorMessage::SampleTick => {
                    self.on_sample_tick().await;
                    Ok(())
                }
                ActorMessage::RefreshTick => {
                    self.on_refresh_tick().await;
                    Ok(())
                }
                ActorMessage::UsageResult(result) => self.on_usage_result(result).await,
                ActorMessage::IdleResult(result) => self.on_idle_result(result).await,
                ActorMessage::RuleSetResult(result) => self.on_ruleset_result(result),
                ActorMessage::GetRuleSet(reply) => {
                    let _ = reply.send(GetRuleSetResponse {
                        rules: self.rules.to_spec_map(),
                    });
                    Ok(())
                }
                ActorMessage::Shutdown => break,
            };

            if let Err(error) = outcome {
                warn!(cluster_id = %self.config.cluster_id, error = %error, "tick handler returned an error");
            }
        }

        info!(cluster_id = %self.config.cluster_id, "scaler controller stopped");
    }

    async fn on_sample_tick(&mut self) {
        let ttl = self.config.pending_scale_down_ttl();
        self.pending.sweep_expired(self.clock.now(), ttl);

        if self.sampling_in_flight {
            debug!(
                cluster_id = %self.config.cluster_id,
                "sample tick skipped: previous usage query still in flight"
            );
            return;
        }
        self.sampling_in_flight = true;

        let cluster = Arc::clone(&self.cluster);
        let cluster_id = self.config.cluster_id.clone();
        let sample_interval = self.config.sample_interval;
        let reply_tx = self.self_tx.clone();

        tokio::spawn(async move {
            let req = GetClusterUsageRequest { cluster_id };
            let result = match tokio::time::timeout(sample_interval, cluster.get_cluster_usage(req)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    collaborator: "resource cluster",
                }),
            };
            let _ = reply_tx.send(ActorMessage::UsageResult(result)).await;
        });
    }

    async fn on_usage_result(
        &mut self,
        result: Result<GetClusterUsageResponse, TransportError>,
    ) -> ControllerResult<()> {
        self.sampling_in_flight = false;

        let response = result.map_err(|source| ControllerError::TransientQuery { source })?;

        if response.cluster_id != self.config.cluster_id {
            warn!(
                expected = %self.config.cluster_id,
                got = %response.cluster_id,
                "dropping usage response for a different cluster"
            );
            return Ok(());
        }

        // Index total counts by sku for the idle-query stage below,
        // since a ScaleDecision doesn't carry `total` itself.
        let totals: std::collections::HashMap<String, (u32, scaleguard_transport::MachineDefinition)> = response
            .usages
            .iter()
            .map(|u| (u.sku_id.clone(), (u.total_count, u.def.clone())))
            .collect();

        let decisions = UsageEvaluator::evaluate(&mut self.rules, &response.usages);

        for decision in decisions {
            match decision.r#type {
                ScaleType::ScaleUp => self.dispatch_scale_up(&decision),
                ScaleType::ScaleDown => self.begin_idle_resolution(&decision, &totals),
                ScaleType::NoOp => {}
            }
        }

        Ok(())
    }

    fn dispatch_scale_up(&self, decision: &scaleguard_transport::ScaleDecision) {
        let req = Dispatcher::for_scale_up(decision);
        self.spawn_dispatch(decision.sku_id.clone(), req);
    }

    fn begin_idle_resolution(
        &mut self,
        decision: &scaleguard_transport::ScaleDecision,
        totals: &std::collections::HashMap<String, (u32, scaleguard_transport::MachineDefinition)>,
    ) {
        let Some((total, machine_def)) = totals.get(&decision.sku_id).cloned() else {
            return;
        };

        let Some(req) = self
            .pending
            .prepare(decision, machine_def, total, self.clock.now())
        else {
            return;
        };

        let cluster = Arc::clone(&self.cluster);
        let sample_interval = self.config.sample_interval;
        let reply_tx = self.self_tx.clone();

        tokio::spawn(async move {
            let result = match tokio::time::timeout(sample_interval, cluster.get_cluster_idle_instances(req)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout {
                    collaborator: "resource cluster",
                }),
            };
            let _ = reply_tx.send(ActorMessage::IdleResult(result)).await;
        });
    }

    async fn on_idle_result(
        &mut self,
        result: Result<GetClusterIdleInstancesResponse, TransportError>,
    ) -> ControllerResult<()> {
        let response = result.map_err(|source| ControllerError::TransientQuery { source })?;

        if response.cluster_id != self.config.cluster_id {
            warn!(
                expected = %self.config.cluster_id,
                got = %response.cluster_id,
                "dropping idle-instance response for a different cluster"
            );
            return Ok(());
        }

        let Some(_pending) = self.pending.resolve(&response.sku_id, response.desire_size) else {
            debug!(
                cluster_id = %self.config.cluster_id,
                sku_id = %response.sku_id,
                desire_size = response.desire_size,
                "dropping idle-instance reply: no matching pending scale-down"
            );
            return Ok(());
        };

        let req = Dispatcher::for_scale_down(
            &self.config.cluster_id,
            &response.sku_id,
            response.desire_size,
            response.instance_ids,
        );
        self.spawn_dispatch(response.sku_id, req);
        Ok(())
    }

    fn spawn_dispatch(&self, sku_id: scaleguard_transport::SkuId, req: scaleguard_transport::ScaleResourceRequest) {
        let provisioner = Arc::clone(&self.provisioner);
        let cluster_id = self.config.cluster_id.clone();

        tokio::spawn(async move {
            if let Err(source) = provisioner.scale_resource(req).await {
                let error = ControllerError::Dispatch { sku_id: sku_id.clone(), source };
                warn!(cluster_id = %cluster_id, sku_id = %sku_id, error = %error, "dispatch failed");
            }
        });
    }

    async fn on_refresh_tick(&mut self) {
        if self.refreshing_in_flight {
            debug!(
                cluster_id = %self.config.cluster_id,
                "refresh tick skipped: previous rule store fetch still in flight"
            );
            return;
        }
        self.refreshing_in_flight = true;

        let rule_store = Arc::clone(&self.rule_store);
        let cluster_id = self.config.cluster_id.clone();
        let reply_tx = self.self_tx.clone();

        tokio::spawn(async move {
            let result = rule_store.get_scale_rules(&cluster_id).await;
            let _ = reply_tx.send(ActorMessage::RuleSetResult(result)).await;
        });
    }

    fn on_ruleset_result(
        &mut self,
        result: Result<RuleSetSnapshot, TransportError>,
    ) -> ControllerResult<()> {
        self.refreshing_in_flight = false;

        let snapshot = result.map_err(|source| ControllerError::RuleStore { source })?;

        if snapshot.cluster_id != self.config.cluster_id {
            warn!(
                expected = %self.config.cluster_id,
                got = %snapshot.cluster_id,
                "dropping rule set snapshot for a different cluster"
            );
            return Ok(());
        }

        info!(
            cluster_id = %self.config.cluster_id,
            skus = snapshot.rules.len(),
            "rule set reloaded"
        );
        self.rules = RuleSet::replace_from(snapshot.rules, &self.config.cluster_id, Arc::clone(&self.clock));
        Ok(())
    }
}

fn spawn_timer(
    tx: mpsc::Sender<ActorMessage>,
    interval: Duration,
    make_message: impl Fn() -> ActorMessage + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval fires immediately on the first tick; that's the
        // first SampleTick/RefreshTick and is the desired behavior.
        loop {
            ticker.tick().await;
            if tx.send(make_message()).await.is_err() {
                break;
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use scaleguard_transport::{MachineDefinition, MockTransport, ScaleSpec, UsageByMachineDefinition};

    use super::*;
    use crate::clock::SystemClock;

    fn def() -> MachineDefinition {
        MachineDefinition {
            cpu_cores: 4,
            mem_mb: 16_384,
            network_mbps: 1_000,
            disk_mb: 102_400,
            num_ports: 4,
        }
    }

    fn spec(sku_id: &str, min_size: u32, max_size: u32, min_idle: u32, max_idle: u32) -> ScaleSpec {
        ScaleSpec {
            cluster_id: "cluster-1".to_string(),
            sku_id: sku_id.to_string(),
            min_size,
            max_size,
            min_idle_to_keep: min_idle,
            max_idle_to_keep: max_idle,
            cool_down_secs: 0,
        }
    }

    /// Poll `check` (an async closure) until it returns `true` or the
    /// attempt budget runs out, sleeping briefly between attempts. Used
    /// to wait for the actor's background dispatch tasks without
    /// pinning the test to an exact timing.
    async fn wait_until<F, Fut>(mut check: F, attempts: usize) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..attempts {
            if check().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        check().await
    }

    // E1: boot with {small, large}; usage small(idle=4,total=10),
    // large(idle=16,total=16), medium(idle=8,total=15, unmanaged).
    #[tokio::test(flavor = "multi_thread")]
    async fn e1_end_to_end_scale_up_and_two_stage_scale_down() {
        let transport = MockTransport::new("cluster-1");
        transport
            .set_rules(BTreeMap::from([
                ("small".to_string(), spec("small", 11, 15, 5, 10)),
                ("large".to_string(), spec("large", 11, 15, 5, 15)),
            ]))
            .await;
        transport
            .set_usage(vec![
                UsageByMachineDefinition {
                    sku_id: "small".to_string(),
                    def: def(),
                    idle_count: 4,
                    total_count: 10,
                },
                UsageByMachineDefinition {
                    sku_id: "large".to_string(),
                    def: def(),
                    idle_count: 16,
                    total_count: 16,
                },
                UsageByMachineDefinition {
                    sku_id: "medium".to_string(),
                    def: def(),
                    idle_count: 8,
                    total_count: 15,
                },
            ])
            .await;
        transport
            .set_idle_instances("large", vec!["agent1".to_string()])
            .await;

        let transport = Arc::new(transport);
        let config = ControllerConfig::new("cluster-1", Duration::from_millis(20), Duration::from_secs(3600));
        let handle = ScalerController::spawn(
            config,
            Arc::new(SystemClock),
            transport.clone(),
            transport.clone(),
            transport.clone(),
        )
        .await;

        let ready = wait_until(
            || async { transport.dispatched().await.len() >= 2 },
            300,
        )
        .await;
        assert!(ready, "expected both the small scale-up and the large scale-down to dispatch");

        let dispatched = transport.dispatched().await;
        let small_req = dispatched
            .iter()
            .find(|r| r.sku_id == "small")
            .expect("expected a scale-up dispatch for small");
        assert_eq!(small_req.desire_size, 11);
        assert!(small_req.idle_instances.is_none());

        let large_req = dispatched
            .iter()
            .find(|r| r.sku_id == "large")
            .expect("expected a scale-down dispatch for large");
        assert_eq!(large_req.desire_size, 15);
        assert_eq!(large_req.idle_instances, Some(vec!["agent1".to_string()]));

        assert!(!dispatched.iter().any(|r| r.sku_id == "medium"));

        handle.shutdown().await;
    }

    // E2: rule-refresh swap: start with {small, large}; after a refresh
    // returns {medium}, introspection shows only medium.
    #[tokio::test(flavor = "multi_thread")]
    async fn e2_rule_refresh_swaps_the_rule_set() {
        let transport = MockTransport::new("cluster-1");
        transport
            .set_rules(BTreeMap::from([
                ("small".to_string(), spec("small", 1, 5, 1, 2)),
                ("large".to_string(), spec("large", 1, 5, 1, 2)),
            ]))
            .await;

        let transport = Arc::new(transport);
        let config = ControllerConfig::new(
            "cluster-1",
            Duration::from_secs(3600),
            Duration::from_millis(20),
        );
        let handle = ScalerController::spawn(
            config,
            Arc::new(SystemClock),
            transport.clone(),
            transport.clone(),
            transport.clone(),
        )
        .await;

        let initial = handle.get_rule_set().await.expect("actor should reply");
        assert_eq!(initial.rules.len(), 2);

        transport
            .set_rules(BTreeMap::from([("medium".to_string(), spec("medium", 1, 5, 1, 2))]))
            .await;

        let ready = wait_until(
            || async {
                handle
                    .get_rule_set()
                    .await
                    .map(|r| r.rules.len() == 1 && r.rules.contains_key("medium"))
                    .unwrap_or(false)
            },
            300,
        )
        .await;
        assert!(ready, "expected the refresh tick to swap in the medium-only rule set");

        handle.shutdown().await;
    }
}
