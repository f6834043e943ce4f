//! The respond pipeline: context, generation, chunking

use tracing::{debug, info};

use crate::chunker::{Chunker, ReplyChunk, ReplyFooter};
use crate::config::ChatConfig;
use crate::context::{
    AgentIdentity, ChatRole, ContentPart, ContextBuilder, ConversationTurn, MessageFormatter,
    MessageNode, MessageSource,
};
use crate::router::{GenerationResult, Router};
use crate::users::{User, UserDirectory};
use crate::utils::{dedent, truncate_chars};

pub const NO_MODEL_MESSAGE: &str = "No suitable model found. Please try again later.";
pub const EMPTY_CONTEXT_MESSAGE: &str = "Please provide some context.";
pub const GENERATION_FAILED_MESSAGE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Longest title a chat thread can carry
pub const MAX_TITLE_LEN: usize = 100;

const TITLE_PROMPT: &str = "You are a youtube video title generator.
    Generate a concise title for the following conversation.
    Please be as brief as possible, ideally only a couple words.
    Do not make it longer than 100 characters.";

/// A generated reply ready for delivery
#[derive(Debug, Clone)]
pub struct Reply {
    pub user: User,
    /// The context the reply was generated from
    pub turns: Vec<ConversationTurn>,
    pub result: GenerationResult,
    pub chunks: Vec<ReplyChunk>,
}

/// What the adapter should deliver for one triggering message
#[derive(Debug, Clone)]
pub enum Outcome {
    Reply(Box<Reply>),
    NoModel,
    EmptyContext,
    GenerationFailed,
}

impl Outcome {
    /// The fixed message for outcomes that are not a generated reply.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            Self::Reply(_) => None,
            Self::NoModel => Some(NO_MODEL_MESSAGE),
            Self::EmptyContext => Some(EMPTY_CONTEXT_MESSAGE),
            Self::GenerationFailed => Some(GENERATION_FAILED_MESSAGE),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Responder {
    users: UserDirectory,
    router: Router,
    chunker: Chunker,
    chat: ChatConfig,
}

impl Responder {
    pub fn new(users: UserDirectory, router: Router, chat: ChatConfig) -> Self {
        Self {
            users,
            router,
            chunker: Chunker::new(chat.chunk_size),
            chat,
        }
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Produce the outcome for a message that triggered the agent.
    pub async fn respond(
        &self,
        source: &dyn MessageSource,
        agent: &AgentIdentity,
        leaf: &MessageNode,
    ) -> Outcome {
        let user = self.users.resolve(&leaf.author_id).await;
        let Some(model) = user.model.as_ref() else {
            info!(user = %user.id, "no model available");
            return Outcome::NoModel;
        };
        debug!(user = %user.id, model = %model.id, "responding");

        let formatter = MessageFormatter::new(agent.clone(), model);
        let turns = ContextBuilder::new(source, &formatter)
            .with_config(&self.chat)
            .build(leaf)
            .await;
        if turns.is_empty() {
            return Outcome::EmptyContext;
        }
        debug!(user = %user.id, turns = turns.len(), "context built");

        let Some(result) = self.router.generate(&user, &turns).await else {
            return Outcome::GenerationFailed;
        };

        let footer = ReplyFooter {
            model_name: self
                .router
                .catalog()
                .find(&result.model_id)
                .map(|m| m.name),
            input_tokens: result.input_tokens,
            output_tokens: result.output_tokens,
        };
        let chunks = self.chunker.to_chunks(&result.text, Some(&footer));

        Outcome::Reply(Box::new(Reply {
            user,
            turns,
            result,
            chunks,
        }))
    }

    /// Ask the model for a short title summarizing a finished exchange.
    pub async fn title_for(&self, reply: &Reply) -> Option<String> {
        let mut turns = reply.turns.clone();
        turns.extend(ConversationTurn::new(
            ChatRole::Assistant,
            vec![ContentPart::text(reply.result.text.clone())],
        ));

        let generated = self
            .router
            .generate_with_system(&reply.user, &turns, dedent(TITLE_PROMPT))
            .await?;

        let title = truncate_chars(generated.text.trim(), MAX_TITLE_LEN).trim();
        if title.is_empty() {
            None
        } else {
            Some(title.to_string())
        }
    }
}
