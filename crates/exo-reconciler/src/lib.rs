//! exo-reconciler
//!
//! Generic reconciliation engine for externally-owned resources.
//!
//! Public API:
//! - [`ExternalClient`] — the Observe/Create/Update/Delete contract one
//!   resource kind implements
//! - [`Connector`] / [`AdapterRegistry`] — produce the adapter for a record
//! - [`Reconciler`] — one reconcile of one identity
//! - [`WorkQueue`] — dedup, single flight, delays, backoff, rate limit
//! - [`Controller`] — worker pool + watch, runs until shutdown

pub mod backoff;
pub mod config;
pub mod connector;
pub mod context;
pub mod controller;
pub mod error;
pub mod external;
pub mod publisher;
pub mod queue;
pub mod ratelimit;
pub mod reconciler;

pub use crate::backoff::Backoff;
pub use crate::config::ReconcilerConfig;
pub use crate::connector::{AdapterRegistry, Connector};
pub use crate::context::ReconcileContext;
pub use crate::controller::Controller;
pub use crate::error::{format_err_chain, ConnectError, ErrorClass, ProviderError};
pub use crate::external::{
    BoxFuture, ConnectionDetails, ExternalClient, ExternalCreation, ExternalObservation,
    ExternalUpdate,
};
pub use crate::publisher::{ConnectionPublisher, SecretPublisher};
pub use crate::queue::WorkQueue;
pub use crate::ratelimit::RateLimiter;
pub use crate::reconciler::{ReconcileOutcome, Reconciler, Requeue};
