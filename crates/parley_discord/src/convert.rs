//! Conversion from serenity models to the core message view

use parley_core::context::{AttachmentView, EmbedView, MessageNode, ReplyRef, ThreadMembership};
use serenity::model::channel::{Attachment, ChannelType, Embed, Message};
use serenity::model::id::{ChannelId, MessageId, UserId};

use crate::error::{DiscordError, Result};

pub fn thread_membership(kind: ChannelType) -> ThreadMembership {
    match kind {
        ChannelType::PublicThread | ChannelType::NewsThread => ThreadMembership::Public,
        ChannelType::PrivateThread => ThreadMembership::Private,
        _ => ThreadMembership::None,
    }
}

pub fn embed_view(embed: &Embed) -> EmbedView {
    EmbedView {
        author_name: embed.author.as_ref().map(|a| a.name.clone()),
        title: embed.title.clone(),
        description: embed.description.clone(),
    }
}

pub fn attachment_view(attachment: &Attachment) -> AttachmentView {
    AttachmentView {
        url: attachment.url.clone(),
        filename: attachment.filename.clone(),
        content_type: attachment.content_type.clone(),
    }
}

/// Replace `<@id>` and `<@!id>` user mentions with `@name`.
pub fn resolve_user_mentions<'a>(
    content: &str,
    mentions: impl IntoIterator<Item = (UserId, &'a str)>,
) -> String {
    let mut resolved = content.to_string();
    for (user_id, name) in mentions {
        let readable = format!("@{name}");
        resolved = resolved
            .replace(&format!("<@{user_id}>"), &readable)
            .replace(&format!("<@!{user_id}>"), &readable);
    }
    resolved
}

/// Build the core view of `message`.
///
/// Mentions of other users are resolved to display names. Mentions of the
/// agent stay raw so the formatter can strip them.
///
/// `thread` describes the channel the message was posted in.
pub fn to_node(message: &Message, agent_id: UserId, thread: ThreadMembership) -> MessageNode {
    let reply_to = message.message_reference.as_ref().and_then(|reference| {
        reference.message_id.map(|message_id| ReplyRef {
            channel_id: reference.channel_id.to_string(),
            message_id: message_id.to_string(),
        })
    });

    MessageNode {
        id: message.id.to_string(),
        channel_id: message.channel_id.to_string(),
        author_id: message.author.id.to_string(),
        is_from_agent: message.author.id == agent_id,
        text: resolve_user_mentions(
            &message.content,
            message
                .mentions
                .iter()
                .filter(|user| user.id != agent_id)
                .map(|user| (user.id, user.display_name())),
        ),
        embeds: message.embeds.iter().map(embed_view).collect(),
        attachments: message.attachments.iter().map(attachment_view).collect(),
        thread,
        reply_to,
    }
}

fn parse_snowflake(raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| DiscordError::InvalidId(raw.to_string()))
}

pub fn parse_message_id(raw: &str) -> Result<MessageId> {
    parse_snowflake(raw).map(MessageId::new)
}

pub fn parse_channel_id(raw: &str) -> Result<ChannelId> {
    parse_snowflake(raw).map(ChannelId::new)
}
