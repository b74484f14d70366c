//! Job events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to job lifecycle events.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ExecutionPool::submit` (`JobStarted`), `JobSupervisor`
//!   (progress and terminal events), `ExecutionPool::request_abort` (`AbortRequested`).
//! - **Consumers**: the pool's subscriber listener (fans out to `SubscriberSet`),
//!   the `JobRegistry` abort router, and any `ExecutionPool::subscribe()` receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
