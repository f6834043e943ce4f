//! The live set of selectable models
//!
//! Readers take cheap `Arc` snapshots. Writers (the refresh task and
//! blacklisting after a failed generation) build a complete replacement list
//! and swap it in under a short write lock, so a snapshot is never partially
//! filtered.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CurationPolicy, Model, ModelRegistry, least_expensive};
use crate::error::Result;

/// Immutable view of the catalog at one point in time
pub type CatalogSnapshot = Arc<Vec<Model>>;

/// Sent when a refresh changes the set of selectable models
#[derive(Debug, Clone)]
pub struct CatalogUpdate {
    /// Ids of the selectable models, sorted
    pub selectable: Vec<String>,
    pub total: usize,
}

pub struct ModelCatalog {
    registry: Arc<dyn ModelRegistry>,
    policy: CurationPolicy,
    models: RwLock<CatalogSnapshot>,
    blacklisted: RwLock<HashSet<String>>,
    /// Number of models offered as explicit choices
    selectable: usize,
    updates: broadcast::Sender<CatalogUpdate>,
}

impl std::fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCatalog")
            .field("models", &self.models.read().len())
            .field("blacklisted", &self.blacklisted.read().len())
            .field("selectable", &self.selectable)
            .finish()
    }
}

impl ModelCatalog {
    /// Create an empty catalog. Call [`Self::refresh`] to populate it.
    pub fn new(registry: Arc<dyn ModelRegistry>, policy: CurationPolicy, selectable: usize) -> Self {
        let (updates, _) = broadcast::channel(8);
        Self {
            registry,
            policy,
            models: RwLock::new(Arc::new(Vec::new())),
            blacklisted: RwLock::new(HashSet::new()),
            selectable,
            updates,
        }
    }

    /// Current snapshot, in curation order.
    pub fn current_models(&self) -> CatalogSnapshot {
        self.models.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }

    pub fn find(&self, id: &str) -> Option<Model> {
        self.models.read().iter().find(|m| m.id == id).cloned()
    }

    pub fn least_expensive(&self) -> Option<Model> {
        let snapshot = self.current_models();
        least_expensive(&snapshot).cloned()
    }

    /// The first models of the snapshot, which are offered as choices.
    pub fn selectable_models(&self) -> Vec<Model> {
        self.current_models()
            .iter()
            .take(self.selectable)
            .cloned()
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogUpdate> {
        self.updates.subscribe()
    }

    /// Remove a model for the rest of the process lifetime.
    ///
    /// Unknown ids are ignored.
    pub fn blacklist(&self, id: &str) {
        self.blacklisted.write().insert(id.to_string());

        let mut models = self.models.write();
        if !models.iter().any(|m| m.id == id) {
            return;
        }
        let remaining: Vec<Model> = models.iter().filter(|m| m.id != id).cloned().collect();
        *models = Arc::new(remaining);
        info!(model = %id, remaining = models.len(), "blacklisted model");
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.blacklisted.read().contains(id)
    }

    /// Refresh the catalog, keeping the previous snapshot if the registry
    /// cannot be reached.
    pub async fn refresh(&self) -> CatalogSnapshot {
        match self.try_refresh().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "model catalog refresh failed, keeping previous catalog");
                self.current_models()
            }
        }
    }

    /// Fetch and curate a new catalog, then swap it in.
    pub async fn try_refresh(&self) -> Result<CatalogSnapshot> {
        let fetched = self.registry.list_models().await?;
        let fetched_count = fetched.len();

        let candidates = self.policy.prefilter(fetched, Utc::now());
        let enriched = self.enrich(candidates).await;
        let curated = self.policy.viable(enriched);

        let (previous, snapshot) = {
            let mut models = self.models.write();
            let blacklisted = self.blacklisted.read();
            let snapshot: CatalogSnapshot = Arc::new(
                curated
                    .into_iter()
                    .filter(|m| !blacklisted.contains(&m.id))
                    .collect(),
            );
            (std::mem::replace(&mut *models, snapshot.clone()), snapshot)
        };

        info!(
            fetched = fetched_count,
            curated = snapshot.len(),
            "model catalog refreshed"
        );

        let before = selectable_ids(&previous, self.selectable);
        let after = selectable_ids(&snapshot, self.selectable);
        if before != after {
            debug!(selectable = after.len(), "selectable models changed");
            // no subscribers is fine
            let _ = self.updates.send(CatalogUpdate {
                selectable: after,
                total: snapshot.len(),
            });
        }

        Ok(snapshot)
    }

    /// Attach usable endpoints to every candidate.
    ///
    /// A failed lookup leaves that model without endpoints.
    async fn enrich(&self, models: Vec<Model>) -> Vec<Model> {
        let lookups = models.iter().map(|m| self.registry.list_endpoints(m));
        let results = join_all(lookups).await;

        models
            .into_iter()
            .zip(results)
            .map(|(mut model, result)| {
                match result {
                    Ok(Some(endpoints)) => {
                        model.endpoints = self.policy.usable_endpoints(endpoints);
                    }
                    Ok(None) => {
                        debug!(model = %model.id, "no endpoints listed");
                        model.endpoints.clear();
                    }
                    Err(e) => {
                        warn!(model = %model.id, error = %e, "failed to fetch endpoints");
                        model.endpoints.clear();
                    }
                }
                model
            })
            .collect()
    }

    /// Refresh on a fixed interval until the returned task is aborted.
    ///
    /// The first refresh happens one interval from now; the startup fetch is
    /// the caller's job.
    pub fn spawn_refresh(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let catalog = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                catalog.refresh().await;
            }
        })
    }
}

fn selectable_ids(models: &[Model], n: usize) -> Vec<String> {
    let mut ids: Vec<String> = models.iter().take(n).map(|m| m.id.clone()).collect();
    ids.sort();
    ids
}
