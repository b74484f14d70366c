//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the fan-out [`SubscriberSet`],
//! and built-in subscribers for events broadcast through the [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   JobSupervisor ── publish(Event) ──► Bus ──► pool listener ──► SubscriberSet::emit
//!                                                                    │
//!                                                       ┌────────────┼────────────┐
//!                                                       ▼            ▼            ▼
//!                                                   JobBoard     LogWriter     Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use jobvisor::{Event, EventKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::JobError {
//!             // increment failure counter
//!         }
//!     }
//! }
//! ```

mod board;
#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

pub use board::{JobBoard, JobStatus, JobView};
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
