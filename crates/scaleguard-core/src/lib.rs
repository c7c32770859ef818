//! scaleguard-core — the autoscaling control loop.
//!
//! Periodically samples cluster usage, applies per-SKU availability
//! rules (min/max size, desired idle headroom, cooldown), and emits
//! scaling decisions to a Host Provisioner. Scale-down decisions are
//! resolved to concrete idle executors before dispatch.
//!
//! # Control flow
//!
//! ```text
//! RefreshTick   ⇒ reload RuleSet from the Rule Store
//! SampleTick    ⇒ ask the Resource Cluster for usage ⇒ Evaluator
//!                 ⇒ for each decision:
//!                     ScaleUp   → Dispatcher
//!                     ScaleDown → IdleResolver → (on reply) Dispatcher
//! ```
//!
//! [`ScalerController`] owns all of this as a single-threaded actor with
//! a FIFO mailbox: see its module docs for the concurrency model.

pub mod clock;
pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod evaluator;
pub mod idle_resolver;
pub mod model;

pub use clock::{Clock, SystemClock};
pub use config::ControllerConfig;
pub use controller::{ScalerController, ScalerHandle};
pub use dispatcher::Dispatcher;
pub use error::{ControllerError, ControllerResult};
pub use evaluator::UsageEvaluator;
pub use idle_resolver::IdleResolver;
pub use model::{AvailabilityRule, PendingScaleDown, RuleSet};

pub use scaleguard_transport as transport;
