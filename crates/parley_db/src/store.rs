//! [`PreferenceStore`] backed by SQLite.

use async_trait::async_trait;
use parley_core::users::{PreferenceStore, UserPreferences};
use tracing::debug;

use crate::connection::PreferenceDb;
use crate::queries;

#[async_trait]
impl PreferenceStore for PreferenceDb {
    async fn get(&self, user_id: &str) -> parley_core::Result<Option<UserPreferences>> {
        let row = queries::get_user(self.pool(), user_id)
            .await
            .map_err(|e| e.into_store_error("get", user_id))?;

        Ok(row.map(|row| UserPreferences {
            model: row.model,
            system_prompt: row.system,
        }))
    }

    async fn set(&self, user_id: &str, preferences: UserPreferences) -> parley_core::Result<()> {
        queries::upsert_user(
            self.pool(),
            user_id,
            preferences.model.as_deref(),
            preferences.system_prompt.as_deref(),
        )
        .await
        .map_err(|e| e.into_store_error("set", user_id))?;

        debug!(user = %user_id, "stored preferences");
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> parley_core::Result<()> {
        let removed = queries::delete_user(self.pool(), user_id)
            .await
            .map_err(|e| e.into_store_error("delete", user_id))?;

        debug!(user = %user_id, removed, "deleted preferences");
        Ok(())
    }
}
