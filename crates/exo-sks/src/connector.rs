use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use exo_core::{ResourceRecord, SecretData, SecretRef};
use exo_reconciler::{BoxFuture, ConnectError, Connector, ExternalClient, ReconcileContext};
use exo_store::SecretStore;
use serde::{Deserialize, Serialize};

use crate::adapter::SksExternal;
use crate::api::ExoscaleClient;

pub const API_KEY: &str = "EXOSCALE_API_KEY";
pub const API_SECRET: &str = "EXOSCALE_API_SECRET";

/// How credential values are stored in the secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialEncoding {
    #[default]
    Base64,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub secret_ref: SecretRef,
    #[serde(default)]
    pub encoding: CredentialEncoding,
}

/// Named account settings a record points at via `providerConfigRef`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub name: String,
    pub credentials: Credentials,
    /// API endpoint template override; `{zone}` is substituted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

struct CachedClient {
    secret: String,
    client: ExoscaleClient,
}

/// Resolves provider config and credentials for SKS records and hands out
/// adapters. HTTP clients are reused per API key and endpoint.
pub struct SksConnector {
    configs: HashMap<String, ProviderConfig>,
    secrets: Arc<dyn SecretStore>,
    clients: Mutex<HashMap<String, CachedClient>>,
}

impl SksConnector {
    pub fn new(configs: Vec<ProviderConfig>, secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            configs: configs.into_iter().map(|c| (c.name.clone(), c)).collect(),
            secrets,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn cached_clients(&self) -> usize {
        self.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn client_for(&self, config: &ProviderConfig, key: String, secret: String) -> ExoscaleClient {
        let endpoint = config.endpoint.as_deref();
        let cache_key = format!("{key}@{}", endpoint.unwrap_or_default());
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = clients.get(&cache_key).filter(|c| c.secret == secret) {
            return cached.client.clone();
        }

        tracing::debug!(provider_config = %config.name, "building exoscale client");
        let mut client = ExoscaleClient::new(key, secret.clone());
        if let Some(endpoint) = endpoint {
            client = client.with_endpoint(endpoint);
        }
        clients.insert(
            cache_key,
            CachedClient {
                secret,
                client: client.clone(),
            },
        );
        client
    }
}

fn credential(
    data: &SecretData,
    secret: &SecretRef,
    key: &str,
    encoding: CredentialEncoding,
) -> Result<String, ConnectError> {
    let fetch_err = |reason: String| ConnectError::CredentialFetch {
        secret: secret.to_string(),
        reason,
    };
    let raw = data
        .get(key)
        .ok_or_else(|| fetch_err(format!("key {key} not found")))?;
    let bytes = match encoding {
        CredentialEncoding::Base64 => STANDARD
            .decode(raw.trim_ascii())
            .map_err(|e| fetch_err(format!("cannot decode {key}: {e}")))?,
        CredentialEncoding::Plain => raw.clone(),
    };
    let value = String::from_utf8(bytes).map_err(|e| fetch_err(format!("{key} is not UTF-8: {e}")))?;
    if value.is_empty() {
        return Err(fetch_err(format!("{key} is empty")));
    }
    Ok(value)
}

impl Connector for SksConnector {
    fn connect<'a>(
        &'a self,
        _ctx: &'a ReconcileContext,
        record: &'a ResourceRecord,
    ) -> BoxFuture<'a, Result<Box<dyn ExternalClient>, ConnectError>> {
        Box::pin(async move {
            let name = &record.spec.provider_config_ref;
            let config = self
                .configs
                .get(name)
                .ok_or_else(|| ConnectError::ReferenceNotFound { name: name.clone() })?;

            let secret_ref = &config.credentials.secret_ref;
            let data = self
                .secrets
                .get(secret_ref)
                .await
                .map_err(|e| ConnectError::CredentialFetch {
                    secret: secret_ref.to_string(),
                    reason: e.to_string(),
                })?;
            let encoding = config.credentials.encoding;
            let key = credential(&data, secret_ref, API_KEY, encoding)?;
            let secret = credential(&data, secret_ref, API_SECRET, encoding)?;

            let client = self.client_for(config, key, secret);
            Ok(Box::new(SksExternal::new(client)) as Box<dyn ExternalClient>)
        })
    }
}
