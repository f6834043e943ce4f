//! Catalog curation stages
//!
//! Each stage takes the candidate list and returns a subset of it, in the
//! original order. The endpoint enrichment step sits between
//! [`CurationPolicy::prefilter`] and [`CurationPolicy::viable`] because it
//! needs network access; see [`super::catalog::ModelCatalog::try_refresh`].

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use regex::RegexBuilder;

use super::{Endpoint, Modality, Model};
use crate::config::CatalogConfig;

/// Thresholds applied to registry listings
#[derive(Debug, Clone)]
pub struct CurationPolicy {
    pub recency: Duration,
    pub min_context_length: u64,
    pub max_prompt_price: f64,
    pub max_completion_price: f64,
    pub max_image_price: f64,
    pub allowed_providers: Vec<String>,
    pub excluded_endpoint_providers: Vec<String>,
    pub excluded_name_markers: Vec<String>,
}

impl From<&CatalogConfig> for CurationPolicy {
    fn from(config: &CatalogConfig) -> Self {
        Self {
            recency: Duration::days(config.recency_days),
            min_context_length: config.min_context_length,
            max_prompt_price: config.max_prompt_price,
            max_completion_price: config.max_completion_price,
            max_image_price: config.max_image_price,
            allowed_providers: config
                .allowed_providers
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            excluded_endpoint_providers: config.excluded_endpoint_providers.clone(),
            excluded_name_markers: config
                .excluded_name_markers
                .iter()
                .map(|m| m.to_lowercase())
                .collect(),
        }
    }
}

impl Default for CurationPolicy {
    fn default() -> Self {
        Self::from(&CatalogConfig::default())
    }
}

impl CurationPolicy {
    /// Every stage that runs before endpoint enrichment, in order.
    pub fn prefilter(&self, models: Vec<Model>, now: DateTime<Utc>) -> Vec<Model> {
        let models = self.recent(models, now);
        let models = self.capable(models);
        let models = self.affordable(models);
        let models = self.from_allowed_provider(models);
        let models = dedupe_by_slug(models);
        let models = self.mature(models);
        models.into_iter().map(clean_display_name).collect()
    }

    /// Keep models created within the recency window.
    pub fn recent(&self, models: Vec<Model>, now: DateTime<Utc>) -> Vec<Model> {
        let cutoff = (now - self.recency).timestamp();
        models.into_iter().filter(|m| m.created > cutoff).collect()
    }

    /// Keep long-context models that read and write text.
    pub fn capable(&self, models: Vec<Model>) -> Vec<Model> {
        models
            .into_iter()
            .filter(|m| m.context_length >= self.min_context_length)
            .filter(|m| m.accepts(Modality::Text) && m.produces(Modality::Text))
            .collect()
    }

    /// Drop models above any of the price ceilings.
    pub fn affordable(&self, models: Vec<Model>) -> Vec<Model> {
        models
            .into_iter()
            .filter(|m| {
                m.pricing.prompt() <= self.max_prompt_price
                    && m.pricing.completion() <= self.max_completion_price
                    && m.pricing.image() <= self.max_image_price
            })
            .collect()
    }

    /// Keep models whose id starts with an allowed provider prefix.
    pub fn from_allowed_provider(&self, models: Vec<Model>) -> Vec<Model> {
        models
            .into_iter()
            .filter(|m| {
                let id = m.id.to_lowercase();
                self.allowed_providers
                    .iter()
                    .any(|provider| id.starts_with(provider.as_str()))
            })
            .collect()
    }

    /// Drop preview, experimental and beta releases.
    pub fn mature(&self, models: Vec<Model>) -> Vec<Model> {
        models
            .into_iter()
            .filter(|m| {
                let name = m.name.to_lowercase();
                !self
                    .excluded_name_markers
                    .iter()
                    .any(|marker| name.contains(marker.as_str()))
            })
            .collect()
    }

    /// Endpoints that are active and not served by an excluded provider.
    pub fn usable_endpoints(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints
            .into_iter()
            .filter(|e| {
                e.is_active()
                    && !self
                        .excluded_endpoint_providers
                        .iter()
                        .any(|p| p == &e.provider_name)
            })
            .collect()
    }

    /// Drop models left without a usable endpoint.
    pub fn viable(&self, models: Vec<Model>) -> Vec<Model> {
        models
            .into_iter()
            .filter(|m| !m.endpoints.is_empty())
            .collect()
    }
}

/// Collapse models sharing a canonical slug, keeping the first.
pub fn dedupe_by_slug(models: Vec<Model>) -> Vec<Model> {
    let mut seen = HashSet::new();
    models
        .into_iter()
        .filter(|m| {
            let key = if m.canonical_slug.is_empty() {
                m.id.clone()
            } else {
                m.canonical_slug.clone()
            };
            seen.insert(key)
        })
        .collect()
}

/// Turn `Google: Google Gemini 2.5` into `Google:  Gemini 2.5`.
///
/// Every case-insensitive occurrence of the provider inside the model half is
/// removed, incidental substrings included.
pub fn clean_display_name(mut model: Model) -> Model {
    let Some((provider, rest)) = model.name.split_once(": ") else {
        return model;
    };
    if provider.is_empty() || rest.is_empty() {
        return model;
    }
    if !rest.to_lowercase().contains(&provider.to_lowercase()) {
        return model;
    }

    let pattern = RegexBuilder::new(&regex::escape(provider))
        .case_insensitive(true)
        .build();
    if let Ok(pattern) = pattern {
        let stripped = pattern.replace_all(rest, "");
        model.name = format!("{provider}: {stripped}");
    }
    model
}
