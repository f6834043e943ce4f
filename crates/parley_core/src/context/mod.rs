//! Conversation context reconstruction
//!
//! Chat platforms hand us a single message. This module walks its reply
//! chain or thread through a [`MessageSource`] and normalizes every message
//! it finds into a [`ConversationTurn`] for the generation backend.

pub mod builder;
pub mod format;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use builder::ContextBuilder;
pub use format::{AgentIdentity, MessageFormatter, TurnFormatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One piece of a turn's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    Image {
        url: String,
    },
    File {
        url: String,
        filename: String,
        media_type: String,
    },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A normalized message in the dialogue
///
/// Always has at least one content part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    role: ChatRole,
    content: Vec<ContentPart>,
}

impl ConversationTurn {
    /// Returns `None` for an empty part list.
    pub fn new(role: ChatRole, content: Vec<ContentPart>) -> Option<Self> {
        if content.is_empty() {
            None
        } else {
            Some(Self { role, content })
        }
    }

    pub fn role(&self) -> ChatRole {
        self.role
    }

    pub fn content(&self) -> &[ContentPart] {
        &self.content
    }

    /// All text parts joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Where a message sits relative to threads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadMembership {
    #[default]
    None,
    Public,
    Private,
}

impl ThreadMembership {
    pub fn is_thread(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Pointer to the message a reply answers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedView {
    pub author_name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentView {
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
}

impl AttachmentView {
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("image/"))
    }
}

/// Read-only view of a chat platform message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: String,
    pub channel_id: String,
    pub author_id: String,
    /// Written by the agent itself
    pub is_from_agent: bool,
    pub text: String,
    pub embeds: Vec<EmbedView>,
    pub attachments: Vec<AttachmentView>,
    pub thread: ThreadMembership,
    pub reply_to: Option<ReplyRef>,
}

/// Read access to the chat platform's message graph
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch the message `message` replies to, if any.
    async fn referenced_message(&self, message: &MessageNode) -> Result<Option<MessageNode>>;

    /// Up to `limit` of the most recent messages of the thread containing
    /// `message`, oldest first.
    async fn thread_history(&self, message: &MessageNode, limit: usize)
    -> Result<Vec<MessageNode>>;
}
