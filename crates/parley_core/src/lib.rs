//! Parley Core - model curation, conversation context and reply delivery
//!
//! This crate holds everything Parley does that is independent of the chat
//! platform: the curated model catalog and its refresh loop, reconstruction
//! of a conversation from a reply chain or thread, routing to a generation
//! backend with failover, and chunking of the generated reply.

pub mod backend;
pub mod chunker;
pub mod config;
pub mod context;
pub mod error;
pub mod model;
pub mod respond;
pub mod router;
pub mod users;
pub mod utils;

pub use backend::{BackendResponse, GenerationBackend, GenerationRequest, OpenRouterBackend, Usage};
pub use chunker::{Chunker, ReplyChunk, ReplyFooter};
pub use config::ParleyConfig;
pub use context::{
    AgentIdentity, ChatRole, ContentPart, ContextBuilder, ConversationTurn, MessageFormatter,
    MessageNode, MessageSource, TurnFormatter,
};
pub use error::{ConfigError, CoreError, Result};
pub use model::{
    CatalogSnapshot, CatalogUpdate, CurationPolicy, Model, ModelCatalog, ModelRegistry,
    OpenRouterRegistry,
};
pub use respond::{Outcome, Reply, Responder};
pub use router::{GenerationResult, Router};
pub use users::{InMemoryPreferenceStore, PreferenceStore, User, UserDirectory, UserPreferences};
