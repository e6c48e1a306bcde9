//! Recurrence index maintenance
//!
//! Keeps an immutable [`SimilarityIndex`] snapshot in step with the record
//! store without ever rebuilding on the write path:
//! - writes call [`RecurrenceIndex::mark_stale`], which only bumps a counter
//! - a query rebuilds first when the snapshot is stale (if enabled)
//! - a background task rebuilds on a timer
//!
//! A rebuild already in progress is never waited on; callers keep using the
//! previous snapshot. Query results are cached per snapshot generation.

use crate::config::IndexSettings;
use moka::future::Cache;
use parking_lot::RwLock;
use rca_domain::{Rca, RcaId};
use rca_similarity::{CorpusDocument, IndexConfig, SimilarMatch, SimilarityIndex};
use rca_store::{RecordStore, StoreResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    generation: u64,
    text: String,
    top_k: usize,
    exclude: Option<RcaId>,
}

/// Text an RCA contributes to the corpus
///
/// Incident title, description and component, the RCA narrative and every
/// action description.
///
/// # Errors
/// Propagates store lookups of the incident and actions.
pub async fn corpus_document(store: &dyn RecordStore, rca: &Rca) -> StoreResult<CorpusDocument> {
    let incident = store.get_incident(rca.incident_id).await?;
    let mut text = incident.corpus_text();
    if !rca.narrative.trim().is_empty() {
        text.push(' ');
        text.push_str(&rca.narrative);
    }
    for action in store.actions_for_rca(rca.id).await? {
        text.push(' ');
        text.push_str(&action.description);
    }
    Ok(CorpusDocument::new(rca.id, text))
}

/// Shared handle to the current similarity snapshot
pub struct RecurrenceIndex {
    config: IndexConfig,
    current: RwLock<Arc<SimilarityIndex>>,
    /// Bumped by every write that changes corpus text
    corpus_generation: AtomicU64,
    /// Corpus generation the current snapshot was built from
    built_generation: AtomicU64,
    rebuild: Mutex<()>,
    cache: Cache<QueryKey, Arc<Vec<SimilarMatch>>>,
}

impl std::fmt::Debug for RecurrenceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecurrenceIndex")
            .field("documents", &self.current.read().len())
            .field("corpus_generation", &self.corpus_generation.load(Ordering::Relaxed))
            .field("built_generation", &self.built_generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl RecurrenceIndex {
    /// Empty index; the first query or refresh builds it
    #[must_use]
    pub fn new(config: IndexConfig, settings: &IndexSettings) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(SimilarityIndex::empty(config))),
            // one ahead so the first read builds
            corpus_generation: AtomicU64::new(1),
            built_generation: AtomicU64::new(0),
            rebuild: Mutex::new(()),
            cache: Cache::builder()
                .max_capacity(settings.query_cache_capacity)
                .time_to_live(Duration::from_secs(settings.query_cache_ttl_secs))
                .build(),
        }
    }

    /// Record that corpus text changed
    #[inline]
    pub fn mark_stale(&self) {
        self.corpus_generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Whether the snapshot lags behind the corpus
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.built_generation.load(Ordering::Acquire) < self.corpus_generation.load(Ordering::Acquire)
    }

    /// Current snapshot
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> Arc<SimilarityIndex> {
        Arc::clone(&self.current.read())
    }

    /// Rebuild from the store unless another rebuild is running
    ///
    /// Returns whether this call rebuilt the snapshot.
    ///
    /// # Errors
    /// Propagates store reads; the previous snapshot stays in place.
    pub async fn refresh(&self, store: &dyn RecordStore) -> StoreResult<bool> {
        let Ok(_guard) = self.rebuild.try_lock() else {
            tracing::debug!("index rebuild already running; serving previous snapshot");
            return Ok(false);
        };
        // read before the corpus so concurrent writes leave it stale
        let target = self.corpus_generation.load(Ordering::Acquire);

        let rcas = store.list_rcas().await;
        let mut documents = Vec::with_capacity(rcas.len());
        for rca in &rcas {
            documents.push(corpus_document(store, rca).await?);
        }
        let index = Arc::new(SimilarityIndex::build(self.config, documents));

        *self.current.write() = index;
        self.built_generation.store(target, Ordering::Release);
        self.cache.invalidate_all();

        tracing::debug!(generation = target, documents = rcas.len(), "recurrence index rebuilt");
        Ok(true)
    }

    /// Rank RCAs against `text`, leaving out `exclude`
    ///
    /// # Errors
    /// Propagates store reads of a rebuild triggered by this query.
    pub async fn query(
        &self,
        store: &dyn RecordStore,
        text: &str,
        top_k: usize,
        exclude: Option<RcaId>,
        rebuild_on_read: bool,
    ) -> StoreResult<Arc<Vec<SimilarMatch>>> {
        if rebuild_on_read && self.is_stale() {
            self.refresh(store).await?;
        }

        let (index, generation) = {
            let current = self.current.read();
            (Arc::clone(&current), self.built_generation.load(Ordering::Acquire))
        };
        let key = QueryKey {
            generation,
            text: text.trim().to_lowercase(),
            top_k,
            exclude,
        };
        if let Some(hit) = self.cache.get(&key).await {
            tracing::debug!(generation, "similarity cache hit");
            return Ok(hit);
        }

        let widened = top_k.saturating_add(usize::from(exclude.is_some()));
        let mut matches = index.find_similar(text, widened);
        matches.retain(|m| Some(m.rca_id) != exclude);
        matches.truncate(top_k);

        let matches = Arc::new(matches);
        self.cache.insert(key, Arc::clone(&matches)).await;
        Ok(matches)
    }

    /// Rebuild on a timer until the handle is aborted
    pub fn spawn_refresher(
        self: &Arc<Self>,
        store: Arc<dyn RecordStore>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let index = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !index.is_stale() {
                    continue;
                }
                if let Err(err) = index.refresh(store.as_ref()).await {
                    tracing::warn!(error = %err, "background index refresh failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rca_domain::IncidentDraft;
    use rca_store::MemoryStore;

    async fn seeded(titles: &[&str]) -> (MemoryStore, Vec<RcaId>) {
        let store = MemoryStore::new();
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let mut ids = Vec::new();
        for title in titles {
            let incident = store
                .create_incident(IncidentDraft::new(*title, "", "Line 3", at), at)
                .await
                .unwrap();
            ids.push(
                store
                    .create_rca(incident.id, String::new(), at)
                    .await
                    .unwrap()
                    .id,
            );
        }
        (store, ids)
    }

    fn index() -> RecurrenceIndex {
        RecurrenceIndex::new(IndexConfig::default(), &IndexSettings::default())
    }

    #[tokio::test]
    async fn first_query_builds_the_snapshot() {
        let (store, ids) = seeded(&["pump seal failure", "gateway timeout", "belt drift"]).await;
        let index = index();
        assert!(index.is_stale());

        let matches = index.query(&store, "seal failure", 1, None, true).await.unwrap();
        assert_eq!(matches[0].rca_id, ids[0]);
        assert!(!index.is_stale());
    }

    #[tokio::test]
    async fn stale_snapshot_is_served_when_rebuild_on_read_is_off() {
        let (store, _) = seeded(&["pump seal failure"]).await;
        let index = index();
        let matches = index.query(&store, "pump", 5, None, false).await.unwrap();
        assert!(matches.is_empty());
        assert!(index.is_stale());
    }

    #[tokio::test]
    async fn excluded_rca_never_appears() {
        let (store, ids) = seeded(&["pump seal failure", "pump seal failure", "belt"]).await;
        let index = index();
        let matches = index
            .query(&store, "pump seal failure", 2, Some(ids[1]), true)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.rca_id != ids[1]));
        assert_eq!(matches[0].rca_id, ids[0]);
    }

    #[tokio::test]
    async fn mark_stale_forces_a_rebuild_on_next_read() {
        let (store, _) = seeded(&["pump seal failure", "belt drift"]).await;
        let index = index();
        index.query(&store, "pump", 5, None, true).await.unwrap();
        assert_eq!(index.snapshot().len(), 2);

        let at = Utc.with_ymd_and_hms(2024, 6, 2, 8, 0, 0).unwrap();
        let incident = store
            .create_incident(IncidentDraft::new("valve leak", "", "Line 1", at), at)
            .await
            .unwrap();
        store.create_rca(incident.id, String::new(), at).await.unwrap();
        index.mark_stale();

        index.query(&store, "pump", 5, None, true).await.unwrap();
        assert_eq!(index.snapshot().len(), 3);
    }
}
