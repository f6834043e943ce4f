//! [`MessageSource`] over the Discord HTTP API

use async_trait::async_trait;
use dashmap::DashMap;
use parley_core::context::{MessageNode, MessageSource, ThreadMembership};
use parley_core::CoreError;
use serenity::builder::GetMessages;
use serenity::client::Context;
use serenity::model::channel::{Channel, Message};
use serenity::model::id::{ChannelId, MessageId, UserId};
use tracing::{debug, warn};

use crate::convert::{parse_channel_id, parse_message_id, thread_membership, to_node};

/// Discord caps a single history request at 100 messages.
const MAX_HISTORY_PAGE: usize = 100;

/// Reads reply chains and thread histories for one triggering message.
///
/// Messages the gateway already delivered (the referenced message embedded in
/// a create event) are served from memory. Channel lookups go through the
/// serenity cache before falling back to HTTP.
pub struct DiscordMessageSource {
    ctx: Context,
    agent_id: UserId,
    prefetched: DashMap<MessageId, Message>,
    channel_kinds: DashMap<ChannelId, ThreadMembership>,
}

impl DiscordMessageSource {
    pub fn new(ctx: Context, agent_id: UserId) -> Self {
        Self {
            ctx,
            agent_id,
            prefetched: DashMap::new(),
            channel_kinds: DashMap::new(),
        }
    }

    /// Seed the source with the triggering message and its embedded reference.
    pub fn with_leaf(self, message: &Message, thread: ThreadMembership) -> Self {
        self.channel_kinds.insert(message.channel_id, thread);
        if let Some(referenced) = message.referenced_message.as_deref() {
            self.prefetched.insert(referenced.id, referenced.clone());
        }
        self
    }

    /// The node for a live message, using the channel kind cache.
    pub async fn node_for(&self, message: &Message) -> MessageNode {
        let thread = self.membership_of(message.channel_id).await;
        to_node(message, self.agent_id, thread)
    }

    async fn membership_of(&self, channel_id: ChannelId) -> ThreadMembership {
        if let Some(kind) = self.channel_kinds.get(&channel_id) {
            return *kind;
        }

        let membership = match channel_id.to_channel(&self.ctx).await {
            Ok(Channel::Guild(channel)) => thread_membership(channel.kind),
            Ok(_) => ThreadMembership::None,
            Err(e) => {
                warn!(channel = %channel_id, error = %e, "failed to look up channel, assuming no thread");
                return ThreadMembership::None;
            }
        };
        self.channel_kinds.insert(channel_id, membership);
        membership
    }
}

impl std::fmt::Debug for DiscordMessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordMessageSource")
            .field("agent_id", &self.agent_id)
            .field("prefetched", &self.prefetched.len())
            .finish()
    }
}

fn fetch_failed(message_id: &str, cause: impl std::fmt::Display) -> CoreError {
    CoreError::MessageFetchFailed {
        message_id: message_id.to_string(),
        cause: cause.to_string(),
    }
}

#[async_trait]
impl MessageSource for DiscordMessageSource {
    async fn referenced_message(
        &self,
        message: &MessageNode,
    ) -> parley_core::Result<Option<MessageNode>> {
        let Some(reference) = message.reply_to.as_ref() else {
            return Ok(None);
        };
        let message_id = parse_message_id(&reference.message_id)
            .map_err(|e| fetch_failed(&reference.message_id, e))?;
        let channel_id = parse_channel_id(&reference.channel_id)
            .map_err(|e| fetch_failed(&reference.message_id, e))?;

        let referenced = match self.prefetched.remove(&message_id) {
            Some((_, cached)) => cached,
            None => {
                debug!(message = %message_id, "fetching referenced message");
                channel_id
                    .message(&self.ctx, message_id)
                    .await
                    .map_err(|e| fetch_failed(&reference.message_id, e))?
            }
        };

        Ok(Some(self.node_for(&referenced).await))
    }

    async fn thread_history(
        &self,
        message: &MessageNode,
        limit: usize,
    ) -> parley_core::Result<Vec<MessageNode>> {
        let channel_id =
            parse_channel_id(&message.channel_id).map_err(|e| fetch_failed(&message.id, e))?;
        let limit = limit.clamp(1, MAX_HISTORY_PAGE) as u8;

        let mut history = channel_id
            .messages(&self.ctx, GetMessages::new().limit(limit))
            .await
            .map_err(|e| fetch_failed(&message.id, e))?;
        // newest first from the API
        history.reverse();
        debug!(channel = %channel_id, fetched = history.len(), "fetched thread history");

        Ok(history
            .iter()
            .map(|m| to_node(m, self.agent_id, message.thread))
            .collect())
    }
}
