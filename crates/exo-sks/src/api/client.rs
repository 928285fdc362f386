use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::ApiError;
use super::models::{
    Operation, ScaleNodepool, SksCluster, SksClusterList, SksNodepool, UpdateSksCluster,
};
use super::signer::{RequestSigner, SIGNATURE_TTL_SECS};

/// Exoscale v2 API root; `{zone}` is replaced per request.
pub const DEFAULT_ENDPOINT: &str = "https://api-{zone}.exoscale.com/v2";

/// Thin client over the SKS part of the Exoscale v2 API. Never retries.
#[derive(Debug, Clone)]
pub struct ExoscaleClient {
    http: reqwest::Client,
    signer: RequestSigner,
    endpoint: String,
}

impl ExoscaleClient {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            signer: RequestSigner::new(key, secret),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    /// Override the endpoint template; may contain `{zone}`.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub async fn list_clusters(&self, zone: &str) -> Result<Vec<SksCluster>, ApiError> {
        let list: SksClusterList = self.call(Method::GET, zone, "/sks-cluster", None::<&()>).await?;
        Ok(list.clusters)
    }

    pub async fn find_cluster(&self, zone: &str, name: &str) -> Result<Option<SksCluster>, ApiError> {
        let clusters = self.list_clusters(zone).await?;
        Ok(clusters.into_iter().find(|c| c.name == name))
    }

    pub async fn get_cluster(&self, zone: &str, id: &str) -> Result<SksCluster, ApiError> {
        self.call(Method::GET, zone, &format!("/sks-cluster/{id}"), None::<&()>)
            .await
    }

    pub async fn create_cluster(
        &self,
        zone: &str,
        cluster: &SksCluster,
    ) -> Result<Operation, ApiError> {
        self.call(Method::POST, zone, "/sks-cluster", Some(cluster))
            .await
    }

    pub async fn update_cluster(
        &self,
        zone: &str,
        id: &str,
        update: &UpdateSksCluster,
    ) -> Result<Operation, ApiError> {
        self.call(Method::PUT, zone, &format!("/sks-cluster/{id}"), Some(update))
            .await
    }

    pub async fn delete_cluster(&self, zone: &str, id: &str) -> Result<Operation, ApiError> {
        self.call(Method::DELETE, zone, &format!("/sks-cluster/{id}"), None::<&()>)
            .await
    }

    pub async fn create_nodepool(
        &self,
        zone: &str,
        cluster_id: &str,
        nodepool: &SksNodepool,
    ) -> Result<Operation, ApiError> {
        let path = format!("/sks-cluster/{cluster_id}/nodepool");
        self.call(Method::POST, zone, &path, Some(nodepool)).await
    }

    pub async fn scale_nodepool(
        &self,
        zone: &str,
        cluster_id: &str,
        nodepool_id: &str,
        size: u64,
    ) -> Result<Operation, ApiError> {
        let path = format!("/sks-cluster/{cluster_id}/nodepool/{nodepool_id}:scale");
        self.call(Method::PUT, zone, &path, Some(&ScaleNodepool { size }))
            .await
    }

    fn url(&self, zone: &str, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}{path}", self.endpoint.replace("{zone}", zone));
        Url::parse(&raw).map_err(|e| ApiError::InvalidEndpoint(format!("{raw}: {e}")))
    }

    async fn call<B, T>(
        &self,
        method: Method,
        zone: &str,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(zone, path)?;
        let body = match body {
            Some(b) => serde_json::to_vec(b)?,
            None => Vec::new(),
        };
        let expires = jiff::Timestamp::now().as_second() + SIGNATURE_TTL_SECS;
        let authorization = self
            .signer
            .authorization(method.as_str(), url.path(), &body, expires)?;

        tracing::debug!(method = %method, url = %url, "exoscale api request");
        let mut request = self
            .http
            .request(method, url.clone())
            .header(reqwest::header::AUTHORIZATION, authorization);
        if !body.is_empty() {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound {
                path: url.path().to_string(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Exoscale error bodies carry a `message` field; fall back to the raw text.
fn error_message(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned())
}
