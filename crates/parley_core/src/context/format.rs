//! Per-message normalization into conversation turns

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use super::{ChatRole, ContentPart, ConversationTurn, EmbedView, MessageNode};
use crate::model::{Modality, Model};

static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\r\n]+").expect("valid regex"));

/// Turns a platform message into a conversation turn
pub trait TurnFormatter: Send + Sync {
    /// `None` when the message carries nothing worth sending.
    fn format(&self, message: &MessageNode) -> Option<ConversationTurn>;
}

/// How the agent appears on the chat platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub user_id: String,
    pub display_name: String,
}

impl AgentIdentity {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }

    /// Remove every way the platform may render a mention of the agent.
    pub fn strip_mentions(&self, text: &str) -> String {
        let mut cleaned = text
            .replace(&format!("<@{}>", self.user_id), "")
            .replace(&format!("<@!{}>", self.user_id), "");
        if !self.display_name.is_empty() {
            cleaned = cleaned.replace(&format!("@{}", self.display_name), "");
        }
        cleaned.trim().to_string()
    }
}

/// The default formatter
///
/// Attachments are only forwarded when the selected model accepts them.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    agent: AgentIdentity,
    accepts_images: bool,
    accepts_files: bool,
}

impl MessageFormatter {
    pub fn new(agent: AgentIdentity, model: &Model) -> Self {
        Self {
            agent,
            accepts_images: model.accepts(Modality::Image),
            accepts_files: model.accepts(Modality::File),
        }
    }

    /// A formatter that forwards text only.
    pub fn text_only(agent: AgentIdentity) -> Self {
        Self {
            agent,
            accepts_images: false,
            accepts_files: false,
        }
    }

    pub fn with_modalities(mut self, images: bool, files: bool) -> Self {
        self.accepts_images = images;
        self.accepts_files = files;
        self
    }
}

impl TurnFormatter for MessageFormatter {
    fn format(&self, message: &MessageNode) -> Option<ConversationTurn> {
        let text = self.agent.strip_mentions(&message.text);

        if message.is_from_agent {
            if text.is_empty() {
                return None;
            }
            trace!(message = %message.id, "assistant: {}", text);
            return ConversationTurn::new(ChatRole::Assistant, vec![ContentPart::text(text)]);
        }

        let mut content = Vec::new();
        if !text.is_empty() {
            trace!(message = %message.id, "user: {}", text);
            content.push(ContentPart::text(text));
        }

        content.extend(
            message
                .embeds
                .iter()
                .filter_map(embed_text)
                .map(|text| ContentPart::text(format!("\"{text}\""))),
        );

        if self.accepts_images {
            content.extend(
                message
                    .attachments
                    .iter()
                    .filter(|a| a.is_image())
                    .map(|a| ContentPart::Image { url: a.url.clone() }),
            );
        }

        if self.accepts_files {
            content.extend(message.attachments.iter().filter_map(|a| {
                let media_type = a.content_type.as_ref()?;
                if a.is_image() {
                    return None;
                }
                Some(ContentPart::File {
                    url: a.url.clone(),
                    filename: a.filename.clone(),
                    media_type: media_type.clone(),
                })
            }));
        }

        ConversationTurn::new(ChatRole::User, content)
    }
}

/// Flatten an embed to a single line of text.
pub fn embed_text(embed: &EmbedView) -> Option<String> {
    let mut text = String::new();
    if let Some(author) = embed.author_name.as_deref().filter(|a| !a.is_empty()) {
        text.push_str(author);
        text.push_str(":\n");
    }
    if let Some(title) = embed.title.as_deref().filter(|t| !t.is_empty()) {
        text.push_str(title);
        text.push('\n');
    }
    if let Some(description) = embed.description.as_deref().filter(|d| !d.is_empty()) {
        text.push_str(description);
        text.push('\n');
    }

    // the platform escapes periods in embed markdown
    let text = text.replace("\\.", ".");
    let text = LINE_BREAKS.replace_all(text.trim(), " ").into_owned();

    if text.is_empty() { None } else { Some(text) }
}
