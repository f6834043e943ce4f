//! Clients for the model registry

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::{Endpoint, Model};
use crate::error::{CoreError, Result};

/// Source of model listings and per-model serving endpoints
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Fetch every model the registry knows about.
    async fn list_models(&self) -> Result<Vec<Model>>;

    /// Fetch the serving endpoints for one model.
    ///
    /// `Ok(None)` means the registry answered but listed no endpoints.
    async fn list_endpoints(&self, model: &Model) -> Result<Option<Vec<Endpoint>>>;
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<Model>,
}

#[derive(Debug, Deserialize)]
struct EndpointsResponse {
    data: EndpointsData,
}

#[derive(Debug, Deserialize)]
struct EndpointsData {
    #[serde(default)]
    endpoints: Option<Vec<Endpoint>>,
}

/// OpenRouter's public model listing API
#[derive(Debug, Clone)]
pub struct OpenRouterRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterRegistry {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.base_url)
    }

    fn endpoints_url(&self, model: &Model) -> String {
        let slug = if model.canonical_slug.is_empty() {
            &model.id
        } else {
            &model.canonical_slug
        };
        format!("{}/models/{}/endpoints", self.base_url, slug)
    }
}

#[async_trait]
impl ModelRegistry for OpenRouterRegistry {
    async fn list_models(&self) -> Result<Vec<Model>> {
        let url = self.models_url();
        let fetch_failed = |cause: String| CoreError::CatalogFetchFailed {
            url: url.clone(),
            cause,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {status}")));
        }

        let body: ModelsResponse = response
            .json()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        debug!(count = body.data.len(), "fetched model registry");
        Ok(body.data)
    }

    async fn list_endpoints(&self, model: &Model) -> Result<Option<Vec<Endpoint>>> {
        let url = self.endpoints_url(model);
        let fetch_failed = |cause: String| CoreError::EndpointFetchFailed {
            model_id: model.id.clone(),
            cause,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fetch_failed(format!("HTTP {status}")));
        }

        let body: EndpointsResponse = response
            .json()
            .await
            .map_err(|e| fetch_failed(e.to_string()))?;

        Ok(body.data.endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::test_support::model;

    #[test]
    fn test_urls_use_canonical_slug() {
        let registry =
            OpenRouterRegistry::with_client(reqwest::Client::new(), "https://example.test/api/v1/");
        let mut m = model("openai/gpt-5", "OpenAI: GPT-5");
        m.canonical_slug = "openai/gpt-5-2025-08-07".to_string();

        assert_eq!(registry.models_url(), "https://example.test/api/v1/models");
        assert_eq!(
            registry.endpoints_url(&m),
            "https://example.test/api/v1/models/openai/gpt-5-2025-08-07/endpoints"
        );

        m.canonical_slug.clear();
        assert_eq!(
            registry.endpoints_url(&m),
            "https://example.test/api/v1/models/openai/gpt-5/endpoints"
        );
    }

    #[test]
    fn test_endpoint_payload_without_list() {
        let body: EndpointsResponse =
            serde_json::from_value(serde_json::json!({"data": {"id": "x"}})).unwrap();
        assert!(body.data.endpoints.is_none());

        let body: EndpointsResponse = serde_json::from_value(serde_json::json!({
            "data": {"endpoints": [
                {"name": "Anthropic | claude", "provider_name": "Anthropic", "status": 0, "context_length": 200000},
                {"name": "OpenAI | gpt", "provider_name": "OpenAI", "status": 0}
            ]}
        }))
        .unwrap();
        assert_eq!(body.data.endpoints.unwrap().len(), 2);
    }
}
