//! Exoscale v2 API client: request signing, the SKS object model and the
//! calls the adapter needs.

pub mod client;
pub mod error;
pub mod models;
pub mod signer;

pub use client::{ExoscaleClient, DEFAULT_ENDPOINT};
pub use error::ApiError;
pub use models::{IdRef, Operation, SksCluster, SksNodepool, UpdateSksCluster};
pub use signer::RequestSigner;
