use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;

use parley_core::config::CatalogConfig;
use parley_core::model::Endpoint;
use parley_core::{CurationPolicy, Model, ModelCatalog, ModelRegistry, Result};

/// Serves a registry listing parsed from JSON, the way the HTTP client would.
struct JsonRegistry {
    models: serde_json::Value,
    endpoints: serde_json::Value,
}

#[async_trait]
impl ModelRegistry for JsonRegistry {
    async fn list_models(&self) -> Result<Vec<Model>> {
        Ok(serde_json::from_value(self.models["data"].clone()).unwrap())
    }

    async fn list_endpoints(&self, model: &Model) -> Result<Option<Vec<Endpoint>>> {
        let listed = &self.endpoints[&model.canonical_slug];
        if listed.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(listed.clone()).unwrap()))
    }
}

fn entry(id: &str, name: &str, days_old: i64, prompt: &str, completion: &str) -> serde_json::Value {
    json!({
        "id": id,
        "canonical_slug": id,
        "name": name,
        "created": Utc::now().timestamp() - days_old * 24 * 60 * 60,
        "description": null,
        "context_length": 200000,
        "architecture": {
            "modality": "text+image->text",
            "input_modalities": ["text", "image"],
            "output_modalities": ["text"],
            "tokenizer": "Other"
        },
        "pricing": {"prompt": prompt, "completion": completion, "image": "0", "request": "0"},
        "top_provider": {"context_length": 200000, "is_moderated": false}
    })
}

fn active(provider: &str) -> serde_json::Value {
    json!({"name": format!("{provider} | x"), "provider_name": provider, "status": 0, "context_length": 200000})
}

#[tokio::test]
async fn registry_listing_is_curated_end_to_end() {
    let mut alias = entry("anthropic/claude-x:beta", "Anthropic: Claude X (self-moderated)", 10, "0.000003", "0.000015");
    alias["canonical_slug"] = json!("anthropic/claude-x");

    let models = json!({"data": [
        entry("anthropic/claude-x", "Anthropic: Claude X", 10, "0.000003", "0.000015"),
        alias,
        entry("google/gemini-old", "Google: Gemini Old", 400, "0.000001", "0.000002"),
        entry("google/gemini-exp", "Google: Gemini Experimental", 5, "0.000001", "0.000002"),
        entry("openai/gpt-huge", "OpenAI: GPT Huge", 5, "0.00006", "0.00012"),
        entry("mistralai/mistral", "Mistral: Mistral", 5, "0.000001", "0.000002"),
        entry("x-ai/grok", "xAI: Grok", 5, "0.000002", "0.00001"),
        entry("openai/gpt-only-openai", "OpenAI: GPT Only", 5, "0.000001", "0.000002"),
        entry("deepseek/deepseek-chat", "DeepSeek: DeepSeek Chat", 5, "0.0000003", "0.000001"),
    ]});
    let endpoints = json!({
        "anthropic/claude-x": [active("Anthropic"), active("Amazon Bedrock")],
        "x-ai/grok": [{"name": "xAI | grok", "provider_name": "xAI", "status": -2}],
        "openai/gpt-only-openai": [active("OpenAI")],
        "deepseek/deepseek-chat": [active("DeepSeek")]
    });

    let catalog = ModelCatalog::new(
        Arc::new(JsonRegistry { models, endpoints }),
        CurationPolicy::from(&CatalogConfig::default()),
        25,
    );
    let snapshot = catalog.refresh().await;

    let ids: Vec<&str> = snapshot.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["anthropic/claude-x", "deepseek/deepseek-chat"]);

    // duplicated provider name is stripped from the model half
    assert_eq!(snapshot[1].name, "DeepSeek:  Chat");
    assert_eq!(snapshot[0].endpoints.len(), 2);
    assert_eq!(catalog.least_expensive().unwrap().id, "deepseek/deepseek-chat");
}

#[tokio::test]
async fn stricter_config_narrows_the_catalog() {
    let models = json!({"data": [
        entry("anthropic/claude-x", "Anthropic: Claude X", 10, "0.000003", "0.000015"),
        entry("google/gemini", "Google: Gemini", 10, "0.000001", "0.000002"),
    ]});
    let endpoints = json!({
        "anthropic/claude-x": [active("Anthropic")],
        "google/gemini": [active("Google")]
    });

    let config = CatalogConfig {
        allowed_providers: vec!["Google".to_string()],
        ..CatalogConfig::default()
    };
    let catalog = ModelCatalog::new(
        Arc::new(JsonRegistry { models, endpoints }),
        CurationPolicy::from(&config),
        25,
    );

    let ids: Vec<String> = catalog.refresh().await.iter().map(|m| m.id.clone()).collect();
    assert_eq!(ids, vec!["google/gemini"]);
}
