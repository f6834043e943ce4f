mod commands;
mod discord;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use parley_core::config::{self, ParleyConfig};
use tracing::info;

use crate::output::Output;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Discord chat bot backed by a curated set of LLMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Database file path (overrides config)
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Discord bot
    Run,
    /// Show the curated model catalog
    Models {
        /// Show every curated model instead of only the selectable ones
        #[arg(long)]
        all: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Write the effective configuration to a file
    Save {
        /// Destination path
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    use tracing_appender::rolling;
    use tracing_subscriber::{
        EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parley")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, "parley.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // RUST_LOG wins over the built-in levels
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.debug {
            EnvFilter::new(
                "parley_core=debug,parley_db=debug,parley_discord=debug,parley_cli=debug,serenity=warn,info",
            )
        } else {
            EnvFilter::new(
                "parley_core=info,parley_db=info,parley_discord=info,parley_cli=info,serenity=warn,warn",
            )
        }
    });

    let terminal_layer = if cli.debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .compact()
            .boxed()
    };

    let file_env_filter = EnvFilter::new(
        "parley_core=debug,parley_db=debug,parley_discord=debug,parley_cli=debug,serenity=info,info",
    );

    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(non_blocking)
        .pretty();

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join("parley.log")
    );

    let config = load_effective_config(&cli).await?;
    let output = Output::new();

    match cli.command {
        Commands::Run => discord::run(config, output).await?,
        Commands::Models { all } => commands::models::list(&config, all, &output).await?,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => commands::config::show(&config, &output)?,
            ConfigCommands::Save { path } => commands::config::save(&config, &path, &output).await?,
        },
    }

    Ok(())
}

/// File settings, then environment, then command line overrides.
async fn load_effective_config(cli: &Cli) -> Result<ParleyConfig> {
    let config = if let Some(config_path) = &cli.config {
        info!("Loading config from: {:?}", config_path);
        config::load_config(config_path).await?
    } else {
        config::load_config_from_standard_locations().await?
    };

    let mut config = config.apply_env();
    if let Some(db_path) = &cli.db_path {
        info!("Using database path from command line: {:?}", db_path);
        config.database.path = db_path.clone();
    }
    config.validate()?;
    Ok(config)
}
