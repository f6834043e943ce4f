//! Gateway event handling

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use parley_core::context::{AgentIdentity, ThreadMembership};
use parley_core::model::ModelCatalog;
use parley_core::respond::{Outcome, Responder};
use serenity::all::{
    Channel, ChannelId, Context, CreateAllowedMentions, CreateMessage, EditThread, EventHandler,
    GuildId, Interaction, Message, MessageReference, Ready, UserId,
};
use tracing::{debug, error, info, warn};

use crate::convert::{thread_membership, to_node};
use crate::error::{DiscordError, Result};
use crate::slash_commands::{
    handle_chat_command, handle_info_command, handle_model_command, handle_reset_command,
    handle_system_command, register_commands, spawn_command_refresh,
};
use crate::source::DiscordMessageSource;

/// Threads opened by `/chat` start with this name until they get a title.
const UNTITLED_CHAT_PREFIX: &str = "Chat with";

/// Why a message might be addressed to the bot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerFacts {
    pub from_bot: bool,
    pub in_owned_thread: bool,
    pub is_dm: bool,
    pub mentions_agent: bool,
    pub replies_to_agent: bool,
}

impl TriggerFacts {
    pub fn should_respond(&self) -> bool {
        !self.from_bot
            && (self.in_owned_thread || self.is_dm || self.mentions_agent || self.replies_to_agent)
    }
}

pub fn is_untitled_chat(thread_name: &str) -> bool {
    thread_name.starts_with(UNTITLED_CHAT_PREFIX)
}

/// Where a message was posted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChannelFacts {
    thread: ThreadMembership,
    owned_by_agent: bool,
    is_dm: bool,
    name: String,
}

impl ChannelFacts {
    fn direct_message() -> Self {
        Self {
            is_dm: true,
            ..Default::default()
        }
    }

    /// Facts that follow from the event alone. Messages without a guild are
    /// DMs and never need a channel lookup.
    fn from_event(guild_id: Option<GuildId>) -> Option<Self> {
        match guild_id {
            None => Some(Self::direct_message()),
            Some(_) => None,
        }
    }
}

/// Shared bot state
pub struct ParleyBot {
    responder: Arc<Responder>,
    identity: OnceLock<(UserId, AgentIdentity)>,
    command_refresh_started: AtomicBool,
}

impl ParleyBot {
    pub fn new(responder: Arc<Responder>) -> Self {
        Self {
            responder,
            identity: OnceLock::new(),
            command_refresh_started: AtomicBool::new(false),
        }
    }

    pub fn responder(&self) -> &Arc<Responder> {
        &self.responder
    }

    fn catalog(&self) -> &Arc<ModelCatalog> {
        self.responder.router().catalog()
    }

    fn identity(&self) -> Result<&(UserId, AgentIdentity)> {
        self.identity.get().ok_or(DiscordError::NotReady)
    }

    async fn channel_facts(&self, ctx: &Context, msg: &Message, bot_id: UserId) -> ChannelFacts {
        if let Some(facts) = ChannelFacts::from_event(msg.guild_id) {
            return facts;
        }
        // cache first, HTTP only on a miss
        match msg.channel_id.to_channel(ctx).await {
            Ok(Channel::Guild(channel)) => {
                let thread = thread_membership(channel.kind);
                ChannelFacts {
                    thread,
                    owned_by_agent: thread.is_thread() && channel.owner_id == Some(bot_id),
                    is_dm: false,
                    name: channel.name,
                }
            }
            Ok(Channel::Private(_)) => ChannelFacts::direct_message(),
            Ok(_) => ChannelFacts::default(),
            Err(e) => {
                warn!(channel = %msg.channel_id, error = %e, "failed to look up channel");
                ChannelFacts::default()
            }
        }
    }

    async fn replies_to(&self, ctx: &Context, msg: &Message, bot_id: UserId) -> bool {
        if let Some(referenced) = msg.referenced_message.as_deref() {
            return referenced.author.id == bot_id;
        }
        let Some(reference) = msg.message_reference.as_ref() else {
            return false;
        };
        let Some(message_id) = reference.message_id else {
            return false;
        };
        match reference.channel_id.message(ctx, message_id).await {
            Ok(referenced) => referenced.author.id == bot_id,
            Err(e) => {
                debug!(message = %message_id, error = %e, "could not fetch referenced message");
                false
            }
        }
    }

    /// Decide whether to answer `msg`, and answer it.
    pub async fn handle_message(&self, ctx: &Context, msg: &Message) -> Result<()> {
        if msg.author.bot {
            return Ok(());
        }
        let (bot_id, agent) = self.identity()?;
        let bot_id = *bot_id;

        let channel = self.channel_facts(ctx, msg, bot_id).await;
        let mut facts = TriggerFacts {
            from_bot: false,
            in_owned_thread: channel.owned_by_agent,
            is_dm: channel.is_dm,
            mentions_agent: msg.mentions_user_id(bot_id),
            replies_to_agent: false,
        };
        if !facts.should_respond() {
            facts.replies_to_agent = self.replies_to(ctx, msg, bot_id).await;
        }
        if !facts.should_respond() {
            return Ok(());
        }

        info!(
            author = %msg.author.name,
            channel = %msg.channel_id,
            thread = channel.owned_by_agent,
            "processing message"
        );
        let _typing = msg.channel_id.start_typing(&ctx.http);

        let source =
            DiscordMessageSource::new(ctx.clone(), bot_id).with_leaf(msg, channel.thread);
        let leaf = to_node(msg, bot_id, channel.thread);
        let outcome = self.responder.respond(&source, agent, &leaf).await;

        if channel.owned_by_agent {
            self.deliver_to_thread(ctx, msg.channel_id, &outcome).await?;
            if let Outcome::Reply(reply) = &outcome {
                if is_untitled_chat(&channel.name) {
                    self.retitle_thread(ctx, msg.channel_id, reply).await?;
                }
            }
        } else {
            self.deliver_as_replies(ctx, msg, &outcome).await?;
        }

        Ok(())
    }

    fn payloads(outcome: &Outcome) -> Vec<String> {
        match outcome {
            Outcome::Reply(reply) => reply
                .chunks
                .iter()
                .map(|chunk| chunk.render())
                .filter(|rendered| !rendered.trim().is_empty())
                .collect(),
            other => other
                .user_message()
                .map(|m| vec![m.to_string()])
                .unwrap_or_default(),
        }
    }

    async fn deliver_to_thread(
        &self,
        ctx: &Context,
        thread: ChannelId,
        outcome: &Outcome,
    ) -> Result<()> {
        for payload in Self::payloads(outcome) {
            thread
                .send_message(
                    &ctx.http,
                    CreateMessage::new()
                        .content(payload)
                        .allowed_mentions(CreateAllowedMentions::new().replied_user(true)),
                )
                .await?;
        }
        Ok(())
    }

    /// Each payload replies to the one before it, the first to `msg`.
    async fn deliver_as_replies(&self, ctx: &Context, msg: &Message, outcome: &Outcome) -> Result<()> {
        let mut reference = MessageReference::from(msg);
        for payload in Self::payloads(outcome) {
            let sent = msg
                .channel_id
                .send_message(
                    &ctx.http,
                    CreateMessage::new()
                        .content(payload)
                        .reference_message(reference)
                        .allowed_mentions(CreateAllowedMentions::new().replied_user(true)),
                )
                .await?;
            reference = MessageReference::from(&sent);
        }
        Ok(())
    }

    async fn retitle_thread(
        &self,
        ctx: &Context,
        thread: ChannelId,
        reply: &parley_core::respond::Reply,
    ) -> Result<()> {
        let Some(title) = self.responder.title_for(reply).await else {
            debug!(thread = %thread, "no title generated");
            return Ok(());
        };

        thread
            .edit_thread(&ctx.http, EditThread::new().name(&title))
            .await?;
        info!(thread = %thread, title = %title, "renamed chat thread");
        Ok(())
    }
}

impl std::fmt::Debug for ParleyBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParleyBot")
            .field("ready", &self.identity.get().is_some())
            .finish()
    }
}

/// Serenity event handler delegating to a shared [`ParleyBot`]
#[derive(Debug, Clone)]
pub struct ParleyEventHandler {
    bot: Arc<ParleyBot>,
}

impl ParleyEventHandler {
    pub fn new(bot: Arc<ParleyBot>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl EventHandler for ParleyEventHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("logged in as {}", ready.user.name);
        let identity = AgentIdentity::new(ready.user.id.to_string(), ready.user.display_name());
        if self.bot.identity.set((ready.user.id, identity)).is_err() {
            debug!("identity already set, gateway reconnected");
        }

        if let Err(e) = register_commands(&ctx.http, self.bot.catalog()).await {
            error!("{}", e);
        }
        if !self.bot.command_refresh_started.swap(true, Ordering::SeqCst) {
            spawn_command_refresh(ctx.http.clone(), Arc::clone(self.bot.catalog()));
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if let Err(e) = self.bot.handle_message(&ctx, &msg).await {
            error!(message = %msg.id, error = %e, "failed to handle message");
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        let users = self.bot.responder.users();

        let result = match command.data.name.as_str() {
            "model" => handle_model_command(&ctx, &command, users).await,
            "system" => handle_system_command(&ctx, &command, users).await,
            "info" => handle_info_command(&ctx, &command, users).await,
            "reset" => handle_reset_command(&ctx, &command, users).await,
            "chat" => handle_chat_command(&ctx, &command).await,
            other => {
                debug!(command = %other, "ignoring unknown command");
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("Failed to handle /{}: {}", command.data.name, e);
        }
    }
}
