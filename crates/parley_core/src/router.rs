//! Routes a conversation to the user's model with failover by blacklisting

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::backend::{GenerationBackend, GenerationRequest};
use crate::context::ConversationTurn;
use crate::model::ModelCatalog;
use crate::users::User;

const THINK_CLOSE: &str = "</think>";

/// The visible result of one generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Clone)]
pub struct Router {
    catalog: Arc<ModelCatalog>,
    backend: Arc<dyn GenerationBackend>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn new(catalog: Arc<ModelCatalog>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { catalog, backend }
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    /// Generate a reply with the user's own system prompt.
    ///
    /// `None` when the user has no model or the backend failed. A failing
    /// model is blacklisted before returning.
    pub async fn generate(
        &self,
        user: &User,
        turns: &[ConversationTurn],
    ) -> Option<GenerationResult> {
        let system = user.system_prompt.clone().unwrap_or_default();
        self.generate_with_system(user, turns, system).await
    }

    pub async fn generate_with_system(
        &self,
        user: &User,
        turns: &[ConversationTurn],
        system_prompt: String,
    ) -> Option<GenerationResult> {
        let model = user.model.as_ref()?;

        let request = GenerationRequest {
            model_id: model.id.clone(),
            system_prompt,
            messages: turns.to_vec(),
        };

        match self.backend.complete(request).await {
            Ok(response) => {
                info!(
                    user = %user.id,
                    model = %response.model_id,
                    input_tokens = ?response.usage.input_tokens,
                    output_tokens = ?response.usage.output_tokens,
                    "generation complete"
                );
                Some(GenerationResult {
                    text: strip_thinking(&response.text),
                    model_id: response.model_id,
                    input_tokens: response.usage.input_tokens,
                    output_tokens: response.usage.output_tokens,
                })
            }
            Err(e) => {
                error!(user = %user.id, model = %model.id, error = %e, "generation failed");
                self.catalog.blacklist(&model.id);
                None
            }
        }
    }
}

/// Keep only what follows the final reasoning block, trimmed.
pub fn strip_thinking(raw: &str) -> String {
    let visible = match raw.rfind(THINK_CLOSE) {
        Some(idx) => &raw[idx + THINK_CLOSE.len()..],
        None => raw,
    };
    visible.trim().to_string()
}
