//! Wiring for `parley run`

use std::sync::Arc;

use miette::Result;
use parley_core::backend::OpenRouterBackend;
use parley_core::config::ParleyConfig;
use parley_core::respond::Responder;
use parley_core::router::Router;
use parley_core::users::UserDirectory;
use parley_db::PreferenceDb;
use parley_discord::serenity::all::GatewayIntents;
use parley_discord::{ParleyBot, ParleyEventHandler};

use crate::commands::build_catalog;
use crate::output::Output;

/// Build every component and run the bot until the gateway stops or Ctrl+C.
pub async fn run(config: ParleyConfig, output: Output) -> Result<()> {
    let api_key = config.require_api_key()?.to_string();
    let token = config.require_discord_token()?.to_string();

    let catalog = build_catalog(&config)?;
    output.status("Fetching model catalog...");
    let snapshot = catalog.refresh().await;
    if snapshot.is_empty() {
        output.warning("No models available yet; the next refresh will retry");
    } else {
        output.info("Models:", &format!("{} curated", snapshot.len()));
    }
    let refresh_handle = catalog.spawn_refresh(config.catalog.refresh_interval());

    let db = PreferenceDb::open(&config.database.path).await?;
    output.info("Database:", &config.database.path.display().to_string());

    let backend = OpenRouterBackend::new(&config.backend, api_key)?;
    let users = UserDirectory::new(
        Arc::new(db.clone()),
        Arc::clone(&catalog),
        config.defaults.clone(),
    );
    let router = Router::new(Arc::clone(&catalog), Arc::new(backend));
    let responder = Arc::new(Responder::new(users, router, config.chat.clone()));

    let bot = Arc::new(ParleyBot::new(responder));
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    output.status("Building Discord client...");
    let mut client = parley_discord::serenity::Client::builder(&token, intents)
        .event_handler(ParleyEventHandler::new(bot))
        .await
        .map_err(|e| miette::miette!("Failed to create Discord client: {}", e))?;

    let shard_manager = client.shard_manager.clone();
    output.status("Discord bot starting... Press Ctrl+C to stop.");
    tokio::select! {
        result = client.start() => {
            match result {
                Ok(()) => output.status("Discord client stopped normally"),
                Err(e) => output.error(&format!("Discord client error: {}", e)),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            output.status("Shutting down...");
            shard_manager.shutdown_all().await;
        }
    }

    refresh_handle.abort();
    db.close().await;
    Ok(())
}
