pub mod config;
pub mod models;

use std::sync::Arc;

use miette::Result;
use parley_core::config::ParleyConfig;
use parley_core::model::{CurationPolicy, ModelCatalog, OpenRouterRegistry};

/// An empty catalog wired to the configured registry. Refresh it before use.
pub fn build_catalog(config: &ParleyConfig) -> Result<Arc<ModelCatalog>> {
    let registry = OpenRouterRegistry::new(&config.catalog.registry_url)?;
    Ok(Arc::new(ModelCatalog::new(
        Arc::new(registry),
        CurationPolicy::from(&config.catalog),
        config.catalog.selectable_models,
    )))
}
