//! # SubscriberSet: hands job events to every consumer without waiting on any.
//!
//! The pool's subscriber listener calls [`SubscriberSet::emit`] once per bus event.
//! Each consumer (the [`JobBoard`](crate::JobBoard), a UI bridge, an audit sink) owns a
//! lane: a bounded queue drained by its own worker task. A slow or broken consumer
//! only ever hurts its own lane; job supervisors and the other consumers keep going.
//!
//! ```text
//! bus event ──► emit ──┬─► lane "JobBoard"  [queue] ─► worker ─► on_event
//!                      ├─► lane "ui-bridge" [queue] ─► worker ─► on_event
//!                      └─► lane ...
//! ```
//!
//! A lane delivers events in bus order. When its queue is full the event is dropped for
//! that lane only and counted ([`SubscriberSet::dropped`]); consumers must not assume
//! they saw every progress line. A panic in `on_event` is logged and the worker moves
//! on to the next event.

use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use futures::FutureExt;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::warn;

use crate::events::Event;

use super::Subscribe;

struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
    dropped: Arc<AtomicU64>,
}

/// Per-consumer queues and workers for job events.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Opens one lane per subscriber and starts its worker.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let (lanes, workers) = subs
            .into_iter()
            .map(|sub| {
                let (queue, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    name: sub.name(),
                    queue,
                    dropped: Arc::new(AtomicU64::new(0)),
                };
                (lane, tokio::spawn(run_lane(sub, rx)))
            })
            .unzip();

        Self { lanes, workers }
    }

    /// Queues `event` on every lane; never waits.
    pub fn emit(&self, event: &Event) {
        let shared = Arc::new(event.clone());
        for lane in &self.lanes {
            let reason = match lane.queue.try_send(Arc::clone(&shared)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "queue full",
                Err(TrySendError::Closed(_)) => "worker gone",
            };
            lane.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                subscriber = lane.name,
                job = %shared.job,
                kind = ?shared.kind,
                reason,
                "job event not delivered"
            );
        }
    }

    /// Events dropped so far for the subscriber called `name` (`None` if no such lane).
    pub fn dropped(&self, name: &str) -> Option<u64> {
        self.lanes
            .iter()
            .find(|lane| lane.name == name)
            .map(|lane| lane.dropped.load(Ordering::Relaxed))
    }

    /// Closes every lane and waits until the workers have handled what was queued.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

/// Worker of one lane: runs until the set is dropped.
async fn run_lane(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>) {
    while let Some(event) = rx.recv().await {
        let handled = std::panic::AssertUnwindSafe(sub.on_event(&event))
            .catch_unwind()
            .await;
        if let Err(payload) = handled {
            warn!(
                subscriber = sub.name(),
                job = %event.job,
                panic = %panic_message(payload.as_ref()),
                "subscriber panicked; event skipped"
            );
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobId;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::{Notify, mpsc::UnboundedSender};

    struct Faulty;

    #[async_trait]
    impl Subscribe for Faulty {
        async fn on_event(&self, _event: &Event) {
            panic!("dashboard exploded");
        }
        fn name(&self) -> &'static str {
            "faulty"
        }
    }

    struct Recorder(UnboundedSender<JobId>);

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            let _ = self.0.send(event.job.clone());
        }
    }

    /// Blocks on its first event until released.
    struct Stuck(Arc<Notify>);

    #[async_trait]
    impl Subscribe for Stuck {
        async fn on_event(&self, _event: &Event) {
            self.0.notified().await;
        }
        fn name(&self) -> &'static str {
            "stuck"
        }
        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn test_panicking_subscriber_is_isolated() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let set = SubscriberSet::new(vec![Arc::new(Faulty), Arc::new(Recorder(tx))]);
        assert_eq!(set.len(), 2);

        let first = JobId::generate();
        let second = JobId::generate();
        set.emit(&Event::finished(first.clone()));
        set.emit(&Event::finished(second.clone()));

        assert_eq!(rx.recv().await, Some(first));
        assert_eq!(rx.recv().await, Some(second));
        assert_eq!(set.dropped("faulty"), Some(0));
        set.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_lane_drops_and_counts() {
        let release = Arc::new(Notify::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let set = SubscriberSet::new(vec![
            Arc::new(Stuck(Arc::clone(&release))),
            Arc::new(Recorder(tx)),
        ]);

        let job = JobId::generate();
        set.emit(&Event::finished(job.clone()));
        // Let the stuck worker take the first event off its queue.
        tokio::time::sleep(Duration::from_millis(50)).await;
        for _ in 0..3 {
            set.emit(&Event::finished(job.clone()));
        }

        // Queue of one: one event waits, two are dropped.
        assert_eq!(set.dropped("stuck"), Some(2));
        assert_eq!(set.dropped("missing"), None);
        for _ in 0..4 {
            assert_eq!(rx.recv().await, Some(job.clone()));
        }
        release.notify_waiters();
    }

    #[test]
    fn test_panic_message_variants() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
