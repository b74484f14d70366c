use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{config::Config, pool::ExecutionPool, registry::JobRegistry};
use crate::{
    events::Bus,
    subscribers::{JobBoard, Subscribe, SubscriberSet},
};

/// Builder for constructing an [`ExecutionPool`] with optional subscribers.
pub struct PoolBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl PoolBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers (dashboards, audit, metrics).
    ///
    /// Subscribers receive every bus event through dedicated workers with bounded queues.
    /// The built-in [`JobBoard`] is always attached in addition to these.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Builds the pool and starts its listeners.
    ///
    /// Initializes:
    /// - Event bus for broadcasting
    /// - Job registry and its abort-routing listener
    /// - Subscriber workers (including the [`JobBoard`])
    /// - Optional concurrency semaphore
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> Arc<ExecutionPool> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let board = Arc::new(JobBoard::new());

        let mut subscribers = self.subscribers;
        subscribers.push(Arc::clone(&board) as Arc<dyn Subscribe>);
        let subs = Arc::new(SubscriberSet::new(subscribers));

        let semaphore = self
            .cfg
            .concurrency_limit()
            .map(Semaphore::new)
            .map(Arc::new);

        let listeners_token = CancellationToken::new();
        let registry = JobRegistry::new();
        Arc::clone(&registry).spawn_listener(bus.subscribe(), listeners_token.clone());

        let pool = ExecutionPool::new_internal(
            self.cfg,
            bus,
            subs,
            board,
            registry,
            semaphore,
            listeners_token,
            TaskTracker::new(),
        );
        pool.subscriber_listener();
        Arc::new(pool)
    }
}
