//! Discord slash command implementations

use std::sync::Arc;

use miette::Result;
use parley_core::model::{Modality, Model, ModelCatalog};
use parley_core::users::UserDirectory;
use parley_core::utils::{truncate_chars, with_thousands};
use serenity::{
    all::{AutoArchiveDuration, ChannelType},
    builder::{
        CreateCommand, CreateCommandOption, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseMessage, CreateThread,
    },
    client::Context,
    http::Http,
    model::{
        application::{Command, CommandInteraction, CommandOptionType},
        channel::Channel,
        colour::Colour,
    },
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Longest name Discord accepts for a command choice
const MAX_CHOICE_NAME: usize = 100;
const MAX_SYSTEM_PROMPT: u16 = 2000;
const MAX_EMBED_DESCRIPTION: usize = 4096;
const MAX_FIELD_VALUE: usize = 1024;

const SAVE_FAILED: &str = "Sorry, your settings could not be saved. Please try again.";

/// Create all slash commands for registration
///
/// `models` become the choices of `/model`, in order.
pub fn create_commands(models: &[Model]) -> Vec<CreateCommand> {
    let mut model_option =
        CreateCommandOption::new(CommandOptionType::String, "model", "The model to use")
            .required(true);
    for model in models {
        model_option = model_option.add_string_choice(choice_name(&model.name), &model.id);
    }

    vec![
        CreateCommand::new("model")
            .description("Set the model to use for responses")
            .dm_permission(true)
            .add_option(model_option),
        CreateCommand::new("system")
            .description("Set the system prompt")
            .dm_permission(true)
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "prompt",
                    "The system prompt to use",
                )
                .required(true)
                .max_length(MAX_SYSTEM_PROMPT),
            ),
        CreateCommand::new("info")
            .description("Get info about your current model")
            .dm_permission(true),
        CreateCommand::new("reset")
            .description("Reset all settings to default")
            .dm_permission(true),
        CreateCommand::new("chat")
            .description("Start a private chat thread")
            .dm_permission(false),
    ]
}

pub fn choice_name(name: &str) -> &str {
    truncate_chars(name, MAX_CHOICE_NAME)
}

/// Replace the global command set, using the current selectable models.
pub async fn register_commands(http: &Arc<Http>, catalog: &ModelCatalog) -> Result<()> {
    let models = catalog.selectable_models();
    let registered = Command::set_global_commands(http, create_commands(&models))
        .await
        .map_err(|e| miette::miette!("Failed to register slash commands: {}", e))?;

    info!(
        commands = registered.len(),
        model_choices = models.len(),
        "registered slash commands"
    );
    Ok(())
}

/// Re-register commands whenever the selectable models change.
pub fn spawn_command_refresh(http: Arc<Http>, catalog: Arc<ModelCatalog>) -> JoinHandle<()> {
    let mut updates = catalog.subscribe();
    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    debug!(
                        selectable = update.selectable.len(),
                        total = update.total,
                        "catalog changed"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "missed catalog updates, re-registering with latest");
                }
                Err(RecvError::Closed) => break,
            }

            if let Err(e) = register_commands(&http, &catalog).await {
                warn!("Failed to re-register slash commands: {}", e);
            }
        }
    })
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

async fn send_ephemeral(
    ctx: &Context,
    command: &CommandInteraction,
    message: CreateInteractionResponseMessage,
) -> Result<()> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(message.ephemeral(true)),
        )
        .await
        .map_err(|e| {
            miette::miette!(
                "Failed to send /{} response: {}",
                command.data.name,
                e
            )
        })
}

async fn send_text(ctx: &Context, command: &CommandInteraction, content: &str) -> Result<()> {
    send_ephemeral(
        ctx,
        command,
        CreateInteractionResponseMessage::new().content(content),
    )
    .await
}

/// Handle the /model command
pub async fn handle_model_command(
    ctx: &Context,
    command: &CommandInteraction,
    users: &UserDirectory,
) -> Result<()> {
    let Some(model_id) = string_option(command, "model") else {
        return send_text(ctx, command, "You must specify a model.").await;
    };

    let user_id = command.user.id.to_string();
    let content = match users.select_model(&user_id, model_id).await {
        Ok(Some(model)) => {
            info!(user = %user_id, model = %model.id, "user selected model");
            format!("You are now using **{}** ({})", model.name, model.id)
        }
        Ok(None) => "Sorry, that model is no longer available.".to_string(),
        Err(e) => {
            error!(user = %user_id, error = %e, "failed to store model selection");
            SAVE_FAILED.to_string()
        }
    };

    send_text(ctx, command, &content).await
}

/// Handle the /system command
pub async fn handle_system_command(
    ctx: &Context,
    command: &CommandInteraction,
    users: &UserDirectory,
) -> Result<()> {
    let Some(prompt) = string_option(command, "prompt").filter(|p| !p.trim().is_empty()) else {
        return send_text(ctx, command, "You must provide a system prompt.").await;
    };

    let user_id = command.user.id.to_string();
    let content = match users.set_system_prompt(&user_id, prompt).await {
        Ok(()) => "Your system prompt has been set.",
        Err(e) => {
            error!(user = %user_id, error = %e, "failed to store system prompt");
            SAVE_FAILED
        }
    };

    send_text(ctx, command, content).await
}

/// Handle the /info command
pub async fn handle_info_command(
    ctx: &Context,
    command: &CommandInteraction,
    users: &UserDirectory,
) -> Result<()> {
    let user = users.resolve(&command.user.id.to_string()).await;
    let Some(model) = user.model.as_ref() else {
        return send_text(ctx, command, "No models are currently available.").await;
    };

    let embed = info_embed(model, user.system_prompt.as_deref());
    send_ephemeral(ctx, command, CreateInteractionResponseMessage::new().embed(embed)).await
}

fn info_embed(model: &Model, system_prompt: Option<&str>) -> CreateEmbed {
    let updated = model
        .created_at()
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let system_prompt = system_prompt
        .map(|p| p.split(['\r', '\n']).filter(|l| !l.is_empty()).collect::<Vec<_>>().join(" "))
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "not set".to_string());

    let mut embed = CreateEmbed::new()
        .title(&model.name)
        .colour(Colour::from_rgb(100, 150, 200))
        .field("Last updated", updated, true)
        .field(
            "Context",
            format!("{} tokens", with_thousands(model.context_length)),
            true,
        )
        .field(
            "Price",
            format!(
                "{}/M input tokens, {}/M output tokens",
                price_per_million(model.pricing.prompt()),
                price_per_million(model.pricing.completion())
            ),
            false,
        )
        .field(
            "Modality",
            format!(
                "{} -> {}",
                modality_list(&model.architecture.input_modalities),
                modality_list(&model.architecture.output_modalities)
            ),
            false,
        )
        .field(
            "System Prompt",
            truncate_chars(&system_prompt, MAX_FIELD_VALUE),
            false,
        );

    if !model.description.trim().is_empty() {
        embed = embed.description(truncate_chars(&model.description, MAX_EMBED_DESCRIPTION));
    }
    embed
}

/// Per-token price as dollars per million tokens.
fn price_per_million(per_token: f64) -> String {
    format!("${:.2}", per_token * 1_000_000.0)
}

fn modality_list(modalities: &[Modality]) -> String {
    modalities
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Handle the /reset command
pub async fn handle_reset_command(
    ctx: &Context,
    command: &CommandInteraction,
    users: &UserDirectory,
) -> Result<()> {
    let user_id = command.user.id.to_string();
    let content = match users.reset(&user_id).await {
        Ok(()) => {
            info!(user = %user_id, "user reset settings");
            "Your settings have been reset to default."
        }
        Err(e) => {
            error!(user = %user_id, error = %e, "failed to reset settings");
            SAVE_FAILED
        }
    };

    send_text(ctx, command, content).await
}

/// Handle the /chat command
///
/// Opens a private thread owned by the bot and invites the caller into it.
pub async fn handle_chat_command(ctx: &Context, command: &CommandInteraction) -> Result<()> {
    let in_text_channel = matches!(
        command.channel_id.to_channel(ctx).await,
        Ok(Channel::Guild(ref channel)) if channel.kind == ChannelType::Text
    );
    if !in_text_channel {
        return send_text(ctx, command, "This command can only be used in a text channel.").await;
    }

    let name = format!("Chat with {}", command.user.display_name());
    let thread = command
        .channel_id
        .create_thread(
            &ctx.http,
            CreateThread::new(truncate_chars(&name, MAX_CHOICE_NAME))
                .kind(ChannelType::PrivateThread)
                .auto_archive_duration(AutoArchiveDuration::OneDay)
                .audit_log_reason("User started a chat"),
        )
        .await
        .map_err(|e| miette::miette!("Failed to create chat thread: {}", e))?;

    thread
        .id
        .add_thread_member(&ctx.http, command.user.id)
        .await
        .map_err(|e| miette::miette!("Failed to add user to chat thread: {}", e))?;

    info!(user = %command.user.id, thread = %thread.id, "started chat thread");
    send_text(
        ctx,
        command,
        &format!("Started a new chat thread: <#{}>", thread.id),
    )
    .await
}
