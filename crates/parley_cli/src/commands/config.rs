use std::path::Path;

use miette::{IntoDiagnostic, Result};
use parley_core::config::{self, ParleyConfig};

use crate::output::Output;

pub fn show(config: &ParleyConfig, output: &Output) -> Result<()> {
    let rendered = toml::to_string_pretty(config).into_diagnostic()?;

    output.section("Effective configuration");
    output.print(&rendered);
    output.section("Secrets");
    output.kv("OPENROUTER_API_KEY", presence(config.backend.api_key.as_deref()));
    output.kv("DISCORD_TOKEN", presence(config.discord.token.as_deref()));
    Ok(())
}

pub async fn save(config: &ParleyConfig, path: &Path, output: &Output) -> Result<()> {
    config::save_config(config, path).await?;
    output.success(&format!("Configuration written to {}", path.display()));
    output.info("Note:", "secrets are not written; keep them in the environment");
    Ok(())
}

fn presence(secret: Option<&str>) -> &'static str {
    match secret {
        Some(_) => "set",
        None => "not set",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_saved_config_omits_secrets_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("parley.toml");

        let mut config = ParleyConfig::default();
        config.backend.api_key = Some("sk-secret".to_string());
        config.defaults.model = Some("google/gemini".to_string());

        save(&config, &path, &Output::new()).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(!written.contains("sk-secret"));

        let reloaded = config::load_config(&path).await.unwrap();
        assert_eq!(reloaded.defaults.model.as_deref(), Some("google/gemini"));
        assert_eq!(reloaded.backend.api_key, None);
    }
}
