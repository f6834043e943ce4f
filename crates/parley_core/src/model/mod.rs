//! Backend model descriptions as published by the model registry, plus the
//! catalog that curates and serves them.

pub mod catalog;
pub mod curation;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use catalog::{CatalogSnapshot, CatalogUpdate, ModelCatalog};
pub use curation::CurationPolicy;
pub use registry::{ModelRegistry, OpenRouterRegistry};

/// A candidate backend model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    /// Display name, usually `Provider: Model`
    pub name: String,
    /// Stable identifier shared by aliases of the same model
    #[serde(default, deserialize_with = "null_as_default")]
    pub canonical_slug: String,
    /// Creation time in unix seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub created: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context_length: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub architecture: Architecture,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pricing: Pricing,
    /// Filled in by endpoint enrichment
    #[serde(default, deserialize_with = "null_as_default")]
    pub endpoints: Vec<Endpoint>,
}

impl Model {
    /// Combined per-token price used for least-cost selection.
    pub fn price(&self) -> f64 {
        self.pricing.prompt() + self.pricing.completion()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }

    pub fn accepts(&self, modality: Modality) -> bool {
        self.architecture.input_modalities.contains(&modality)
    }

    pub fn produces(&self, modality: Modality) -> bool {
        self.architecture.output_modalities.contains(&modality)
    }

    /// The `Provider` half of a `Provider: Model` display name.
    pub fn provider_name(&self) -> Option<&str> {
        self.name.split_once(": ").map(|(provider, _)| provider)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Architecture {
    #[serde(default)]
    pub input_modalities: Vec<Modality>,
    #[serde(default)]
    pub output_modalities: Vec<Modality>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    File,
    Audio,
    Video,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Per-unit prices as decimal strings, the way the registry publishes them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Pricing {
    pub fn prompt(&self) -> f64 {
        parse_price(self.prompt.as_deref())
    }

    pub fn completion(&self) -> f64 {
        parse_price(self.completion.as_deref())
    }

    pub fn image(&self) -> f64 {
        parse_price(self.image.as_deref())
    }
}

/// Absent or unparsable prices count as free.
fn parse_price(raw: Option<&str>) -> f64 {
    raw.and_then(|p| p.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// A provider serving a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider_name: String,
    /// 0 means the endpoint is active
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub context_length: Option<u64>,
}

impl Endpoint {
    pub fn is_active(&self) -> bool {
        self.status == 0
    }
}

/// Registry payloads use explicit nulls for missing fields.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The cheapest model by prompt + completion price; ties go to the first.
pub fn least_expensive(models: &[Model]) -> Option<&Model> {
    models.iter().fold(None, |best: Option<&Model>, model| match best {
        Some(current) if current.price() <= model.price() => Some(current),
        _ => Some(model),
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_least_expensive_picks_lowest_sum() {
        let models = vec![
            priced("a/first", "0.00001", "0.00002"),
            priced("a/second", "0.000005", "0.00001"),
        ];
        assert_eq!(least_expensive(&models).unwrap().id, "a/second");
    }

    #[test]
    fn test_least_expensive_tie_keeps_first() {
        let models = vec![
            priced("a/first", "0.000001", "0.000002"),
            priced("a/second", "0.000002", "0.000001"),
            priced("a/third", "0.000001", "0.000002"),
        ];
        assert_eq!(least_expensive(&models).unwrap().id, "a/first");
        assert!(least_expensive(&[]).is_none());
    }

    #[test]
    fn test_unparsable_price_counts_as_zero() {
        let m = priced("a/odd", "n/a", "0.000002");
        assert_eq!(m.pricing.prompt(), 0.0);
        assert_eq!(m.price(), 0.000002);
    }

    #[test]
    fn test_registry_json_shape() {
        let json = serde_json::json!({
            "id": "anthropic/claude-sonnet-4",
            "canonical_slug": "anthropic/claude-4-sonnet-20250522",
            "name": "Anthropic: Claude Sonnet 4",
            "created": 1747930371,
            "description": "Sonnet",
            "context_length": 200000,
            "architecture": {
                "input_modalities": ["image", "text", "file"],
                "output_modalities": ["text"],
                "tokenizer": "Claude"
            },
            "pricing": {"prompt": "0.000003", "completion": "0.000015", "image": "0.0048", "request": "0"},
            "top_provider": {"is_moderated": false}
        });

        let model: Model = serde_json::from_value(json).unwrap();
        assert!(model.accepts(Modality::Image));
        assert!(model.accepts(Modality::File));
        assert!(model.produces(Modality::Text));
        assert!(!model.accepts(Modality::Audio));
        assert_eq!(model.provider_name(), Some("Anthropic"));
        assert!(model.endpoints.is_empty());
        assert_eq!(model.pricing.image(), 0.0048);
    }

    #[test]
    fn test_unknown_modality_is_tolerated() {
        let arch: Architecture = serde_json::from_value(serde_json::json!({
            "input_modalities": ["text", "hologram"],
            "output_modalities": ["text"]
        }))
        .unwrap();
        assert_eq!(arch.input_modalities, vec![Modality::Text, Modality::Other]);
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let model: Model = serde_json::from_value(serde_json::json!({
            "id": "openai/gpt-x",
            "name": "OpenAI: GPT X",
            "canonical_slug": null,
            "description": null,
            "context_length": null,
            "created": 1750000000
        }))
        .unwrap();
        assert_eq!(model.context_length, 0);
        assert!(model.canonical_slug.is_empty());
        assert!(model.architecture.input_modalities.is_empty());
    }
}
