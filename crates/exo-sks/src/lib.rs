//! exo-sks
//!
//! Exoscale SKS cluster adapter for the reconciler: a signed v2 API client,
//! the cluster parameters, the lifecycle adapter and its connector.

pub mod adapter;
pub mod api;
pub mod config;
pub mod connector;
pub mod params;

pub use crate::adapter::SksExternal;
pub use crate::config::ProviderFile;
pub use crate::connector::{CredentialEncoding, Credentials, ProviderConfig, SksConnector};
pub use crate::params::SksParameters;

/// Resource kind served by this adapter.
pub const SKS_KIND: &str = "SksCluster";
