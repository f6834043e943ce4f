//! Per-user model and system prompt preferences

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{DEFAULT_SYSTEM_PROMPT, DefaultsConfig};
use crate::error::Result;
use crate::model::{Model, ModelCatalog};
use crate::utils::dedent;

/// Persisted overrides for one user
///
/// In [`PreferenceStore::set`], `None` fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
}

impl UserPreferences {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            system_prompt: Some(prompt.into()),
        }
    }
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<UserPreferences>>;

    /// Merge `preferences` into the stored record, creating it if needed.
    async fn set(&self, user_id: &str, preferences: UserPreferences) -> Result<()>;

    async fn delete(&self, user_id: &str) -> Result<()>;
}

/// Volatile store for tests and runs without a database
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    users: DashMap<String, UserPreferences>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.users.get(user_id).map(|p| p.clone()))
    }

    async fn set(&self, user_id: &str, preferences: UserPreferences) -> Result<()> {
        let mut entry = self.users.entry(user_id.to_string()).or_default();
        if preferences.model.is_some() {
            entry.model = preferences.model;
        }
        if preferences.system_prompt.is_some() {
            entry.system_prompt = preferences.system_prompt;
        }
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<()> {
        self.users.remove(user_id);
        Ok(())
    }
}

/// A user with preferences resolved against the live catalog
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    /// `None` when no model is available at all
    pub model: Option<Model>,
    pub system_prompt: Option<String>,
}

/// Resolves [`User`] records and writes preference changes
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn PreferenceStore>,
    catalog: Arc<ModelCatalog>,
    defaults: DefaultsConfig,
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("catalog", &self.catalog)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl UserDirectory {
    pub fn new(
        store: Arc<dyn PreferenceStore>,
        catalog: Arc<ModelCatalog>,
        defaults: DefaultsConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            defaults,
        }
    }

    pub fn catalog(&self) -> &Arc<ModelCatalog> {
        &self.catalog
    }

    /// Look up a user, falling back to defaults for anything unset.
    ///
    /// Store failures are logged and treated as "no preferences".
    pub async fn resolve(&self, user_id: &str) -> User {
        let preferences = match self.store.get(user_id).await {
            Ok(p) => p.unwrap_or_default(),
            Err(e) => {
                warn!(user = %user_id, error = %e, "failed to read user preferences");
                UserPreferences::default()
            }
        };

        let model = self.resolve_model(preferences.model.as_deref());
        let system_prompt = preferences
            .system_prompt
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or(self.defaults.system_prompt.as_deref())
            .map(dedent)
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        User {
            id: user_id.to_string(),
            model,
            system_prompt: Some(system_prompt),
        }
    }

    /// Persisted choice, then the configured default, then the cheapest.
    pub fn resolve_model(&self, preferred: Option<&str>) -> Option<Model> {
        if let Some(model) = preferred.and_then(|id| self.catalog.find(id)) {
            return Some(model);
        }
        if let Some(id) = preferred {
            debug!(model = %id, "preferred model not in catalog, using default");
        }
        if let Some(model) = self
            .defaults
            .model
            .as_deref()
            .and_then(|id| self.catalog.find(id))
        {
            return Some(model);
        }
        self.catalog.least_expensive()
    }

    /// Persist a model choice. Returns `None` if the id is not in the catalog.
    pub async fn select_model(&self, user_id: &str, model_id: &str) -> Result<Option<Model>> {
        let Some(model) = self.catalog.find(model_id) else {
            return Ok(None);
        };
        self.store
            .set(user_id, UserPreferences::with_model(&model.id))
            .await?;
        Ok(Some(model))
    }

    pub async fn set_system_prompt(&self, user_id: &str, prompt: &str) -> Result<()> {
        self.store
            .set(user_id, UserPreferences::with_system_prompt(prompt))
            .await
    }

    /// Forget every preference of a user.
    pub async fn reset(&self, user_id: &str) -> Result<()> {
        self.store.delete(user_id).await
    }
}
