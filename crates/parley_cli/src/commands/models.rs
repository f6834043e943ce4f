use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL};
use miette::Result;
use parley_core::config::ParleyConfig;
use parley_core::model::Model;
use parley_core::utils::with_thousands;

use super::build_catalog;
use crate::output::Output;

/// Fetch and curate the registry once, then print the result.
pub async fn list(config: &ParleyConfig, all: bool, output: &Output) -> Result<()> {
    let catalog = build_catalog(config)?;
    output.status(&format!(
        "Fetching models from {}...",
        config.catalog.registry_url
    ));
    let snapshot = catalog.try_refresh().await?;

    if snapshot.is_empty() {
        output.warning("No models passed curation");
        return Ok(());
    }

    let models: Vec<Model> = if all {
        snapshot.iter().cloned().collect()
    } else {
        catalog.selectable_models()
    };

    println!("{}", model_table(&models));
    output.kv("Curated", &snapshot.len().to_string());
    output.kv("Selectable", &catalog.selectable_models().len().to_string());
    if let Some(cheapest) = catalog.least_expensive() {
        output.kv("Default", &format!("{} ({})", cheapest.name, cheapest.id));
    }
    Ok(())
}

fn model_table(models: &[Model]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "#", "Name", "Id", "Context", "$/M in", "$/M out", "Endpoints",
        ]);

    for (i, model) in models.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            model.name.clone(),
            model.id.clone(),
            with_thousands(model.context_length),
            format!("{:.2}", model.pricing.prompt() * 1_000_000.0),
            format!("{:.2}", model.pricing.completion() * 1_000_000.0),
            model
                .endpoints
                .iter()
                .map(|e| e.provider_name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ]);
    }
    table
}
