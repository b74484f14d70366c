//! # Job registry - routes abort requests to live supervisors.
//!
//! Maps job id → [`JobSupervisor`] for every job that has been submitted and has
//! not reached a terminal state yet.
//!
//! ## Architecture
//! ```text
//! ExecutionPool::submit ──► register(sup)
//! Bus → JobRegistry listener
//!         └─► AbortRequested(id) → get(id)?.abort()   (unknown id: dropped)
//! JobSupervisor terminal transition ──► unregister(id)
//! ```
//!
//! ## Rules
//! - Shared between the pool and any abort issuer (`Arc<JobRegistry>`); no external locking.
//! - Entries are removed unconditionally on any terminal transition.
//! - A job id is never registered twice; each submission mints a fresh id.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast::{Receiver, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    core::supervisor::JobSupervisor,
    events::{Event, EventKind},
    jobs::JobId,
};

/// Live jobs by id.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobSupervisor>>>,
}

impl JobRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawns the listener routing `AbortRequested` events to their supervisor.
    ///
    /// Stops when `token` is cancelled or the bus closes.
    pub(crate) fn spawn_listener(self: Arc<Self>, mut rx: Receiver<Event>, token: CancellationToken) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => self.handle_event(&ev),
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "registry listener lagged; abort requests may be lost");
                        }
                    }
                }
            }
        });
    }

    fn handle_event(&self, ev: &Event) {
        if ev.kind != EventKind::AbortRequested {
            return;
        }
        match self.get(&ev.job) {
            Some(sup) => sup.abort(),
            None => debug!(job = %ev.job, "abort request for unknown job dropped"),
        }
    }

    /// Associates the supervisor's id with it.
    ///
    /// Returns `false` (and keeps the existing entry) if the id is already registered.
    pub fn register(&self, sup: Arc<JobSupervisor>) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(sup.id()) {
            warn!(job = %sup.id(), "job id already registered");
            return false;
        }
        jobs.insert(sup.id().clone(), sup);
        true
    }

    /// Removes the association if present.
    pub fn unregister(&self, id: &JobId) -> Option<Arc<JobSupervisor>> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn get(&self, id: &JobId) -> Option<Arc<JobSupervisor>> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &JobId) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Returns sorted list of live job ids.
    pub fn list(&self) -> Vec<JobId> {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<JobId> = jobs.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests abort of every live job.
    pub fn abort_all(&self) {
        let sups: Vec<Arc<JobSupervisor>> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for sup in sups {
            sup.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::supervisor::{AbortState, SupervisorParams};
    use crate::events::Bus;
    use crate::jobs::JobSpec;
    use std::{path::PathBuf, time::Duration};

    fn supervisor(bus: &Bus, registry: &Arc<JobRegistry>) -> Arc<JobSupervisor> {
        Arc::new(JobSupervisor::new(
            JobId::generate(),
            JobSpec::new("job.sh"),
            SupervisorParams {
                bus: bus.clone(),
                registry: Arc::downgrade(registry),
                log_dir: PathBuf::from("logs"),
                kill_grace: Duration::from_millis(50),
            },
        ))
    }

    #[test]
    fn test_register_unregister() {
        let bus = Bus::new(8);
        let registry = JobRegistry::new();
        let sup = supervisor(&bus, &registry);
        let id = sup.id().clone();

        assert!(registry.register(Arc::clone(&sup)));
        assert!(!registry.register(Arc::clone(&sup)));
        assert!(registry.contains(&id));
        assert_eq!(registry.list(), vec![id.clone()]);

        assert!(registry.unregister(&id).is_some());
        assert!(registry.unregister(&id).is_none());
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_finish_deregisters() {
        let bus = Bus::new(8);
        let registry = JobRegistry::new();
        let sup = supervisor(&bus, &registry);
        registry.register(Arc::clone(&sup));

        sup.finish();
        assert!(!registry.contains(sup.id()));
    }

    #[tokio::test]
    async fn test_abort_request_is_routed_to_matching_job_only() {
        let bus = Bus::new(8);
        let registry = JobRegistry::new();
        let token = CancellationToken::new();
        Arc::clone(&registry).spawn_listener(bus.subscribe(), token.clone());

        let a = supervisor(&bus, &registry);
        let b = supervisor(&bus, &registry);
        registry.register(Arc::clone(&a));
        registry.register(Arc::clone(&b));

        bus.publish(Event::abort_requested(JobId::generate()));
        bus.publish(Event::abort_requested(a.id().clone()));

        tokio::time::timeout(Duration::from_secs(2), a.abort_requested())
            .await
            .unwrap();
        assert_eq!(a.abort_state(), AbortState::AbortRequested);
        assert_eq!(b.abort_state(), AbortState::Running);
        token.cancel();
    }

    #[test]
    fn test_abort_all() {
        let bus = Bus::new(8);
        let registry = JobRegistry::new();
        let sups: Vec<_> = (0..3).map(|_| supervisor(&bus, &registry)).collect();
        for s in &sups {
            registry.register(Arc::clone(s));
        }

        registry.abort_all();
        assert!(
            sups.iter()
                .all(|s| s.abort_state() == AbortState::AbortRequested)
        );
    }
}
