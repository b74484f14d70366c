//! # Job event bus.
//!
//! Every lifecycle step of every job goes through one [`Bus`]: the pool announces
//! `JobStarted`, supervisors stream progress and their terminal outcome, and anyone
//! holding a job id can drop an `AbortRequested` on it.
//!
//! ```text
//!   ExecutionPool::submit ──────┐                ┌──► subscriber listener ──► SubscriberSet
//!   JobSupervisor (per job) ────┼──► Bus ────────┼──► JobRegistry listener (abort routing)
//!   ExecutionPool::request_abort┘                └──► ExecutionPool::subscribe() callers
//! ```
//!
//! Publishing never waits. Receivers share one ring buffer of `Config::bus_capacity`
//! events; a receiver that falls further behind gets `RecvError::Lagged(n)` and
//! continues with the oldest event still buffered. Nothing is replayed: a receiver
//! only sees events sent after it subscribed.

use tokio::sync::broadcast;

use super::event::Event;

/// Shared handle to the job event channel; clones publish into the same channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Opens a bus buffering up to `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Hands `ev` to every current receiver; with none, it is discarded.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Receivers currently attached (listeners included).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobId;

    #[tokio::test]
    async fn test_fan_out_to_every_receiver() {
        let bus = Bus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        let job = JobId::generate();

        bus.publish(Event::finished(job.clone()));

        assert_eq!(a.recv().await.unwrap().job, job);
        assert_eq!(b.recv().await.unwrap().job, job);
    }

    #[tokio::test]
    async fn test_lagging_receiver_skips_oldest() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        let jobs: Vec<JobId> = (0..3).map(|_| JobId::generate()).collect();
        for job in &jobs {
            bus.publish(Event::finished(job.clone()));
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().job, jobs[1]);
        assert_eq!(rx.recv().await.unwrap().job, jobs[2]);
    }

    #[test]
    fn test_publish_without_receivers_does_not_block() {
        let bus = Bus::new(0);
        for _ in 0..10 {
            bus.publish(Event::aborted(JobId::generate()));
        }
        assert_eq!(bus.receiver_count(), 0);
    }
}
