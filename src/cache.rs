use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::{Fingerprint, PostRecord, PredictionModel, Predictor, Result};

type ModelCell = Arc<OnceCell<Arc<PredictionModel>>>;

/// Fitted models keyed by record-set fingerprint.
///
/// Callers asking for the same fingerprint share one `OnceCell`, so only one
/// fit runs per fingerprint and nobody observes a half-built model. A fit that
/// fails leaves the cell empty and the next caller retries.
pub struct ModelCache {
    predictor: Predictor,
    max_entries: usize,
    entries: Mutex<CacheEntries>,
}

#[derive(Default)]
struct CacheEntries {
    cells: HashMap<Fingerprint, ModelCell>,
    order: VecDeque<Fingerprint>,
}

impl CacheEntries {
    fn oldest_fitted(&self, keep: Fingerprint) -> Option<Fingerprint> {
        self.order.iter().copied().find(|fingerprint| {
            *fingerprint != keep
                && self
                    .cells
                    .get(fingerprint)
                    .is_some_and(|cell| cell.initialized())
        })
    }

    fn remove(&mut self, fingerprint: Fingerprint) {
        self.cells.remove(&fingerprint);
        self.order.retain(|entry| *entry != fingerprint);
    }
}

impl ModelCache {
    pub fn new(predictor: Predictor, max_entries: usize) -> Self {
        Self {
            predictor,
            max_entries: max_entries.max(1),
            entries: Mutex::new(CacheEntries::default()),
        }
    }

    pub async fn get_or_fit(&self, records: &[PostRecord]) -> Result<Arc<PredictionModel>> {
        let fingerprint = Fingerprint::of(records);
        let cell = self.cell_for(fingerprint).await;
        let predictor = self.predictor;
        let fitted = cell
            .get_or_try_init(|| async move {
                debug!(%fingerprint, "prediction model cache miss");
                predictor.fit(records).map(Arc::new)
            })
            .await;
        match fitted {
            Ok(model) => {
                let model = model.clone();
                self.trim(fingerprint).await;
                Ok(model)
            }
            Err(err) => {
                // Fitting is deterministic, so a retry on the same records would
                // fail the same way; drop the empty cell instead of pinning it.
                let mut guard = self.entries.lock().await;
                let stale = guard
                    .cells
                    .get(&fingerprint)
                    .is_some_and(|current| Arc::ptr_eq(current, &cell) && !current.initialized());
                if stale {
                    guard.remove(fingerprint);
                }
                Err(err)
            }
        }
    }

    pub async fn get(&self, fingerprint: Fingerprint) -> Option<Arc<PredictionModel>> {
        let guard = self.entries.lock().await;
        guard
            .cells
            .get(&fingerprint)
            .and_then(|cell| cell.get().cloned())
    }

    /// Drops a fitted model. A fit still in flight is left alone: it was
    /// started for exactly this fingerprint, so its result cannot be stale.
    pub async fn invalidate(&self, fingerprint: Fingerprint) -> bool {
        let mut guard = self.entries.lock().await;
        let fitted = guard
            .cells
            .get(&fingerprint)
            .is_some_and(|cell| cell.initialized());
        if fitted {
            guard.remove(fingerprint);
        }
        fitted
    }

    /// Drops every fitted model; fits in flight keep their cells.
    pub async fn clear(&self) {
        let mut guard = self.entries.lock().await;
        guard.cells.retain(|_, cell| !cell.initialized());
        let CacheEntries { cells, order } = &mut *guard;
        order.retain(|fingerprint| cells.contains_key(fingerprint));
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.cells.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // Evicts oldest fitted models first. Cells still fitting are never evicted,
    // so the cache may briefly run over capacity while entries are in flight.
    async fn trim(&self, keep: Fingerprint) {
        let mut guard = self.entries.lock().await;
        while guard.order.len() > self.max_entries {
            match guard.oldest_fitted(keep) {
                Some(oldest) => guard.remove(oldest),
                None => break,
            }
        }
    }

    async fn cell_for(&self, fingerprint: Fingerprint) -> ModelCell {
        let mut guard = self.entries.lock().await;
        if let Some(cell) = guard.cells.get(&fingerprint) {
            return cell.clone();
        }

        let cell: ModelCell = Arc::new(OnceCell::new());
        guard.cells.insert(fingerprint, cell.clone());
        guard.order.push_back(fingerprint);
        cell
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn records(id: &str) -> Vec<PostRecord> {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
        vec![PostRecord::new(id, ts, 10, 0)]
    }

    #[tokio::test]
    async fn in_flight_cell_survives_eviction() {
        let cache = ModelCache::new(Predictor::utc(), 1);
        let pending = Fingerprint::of(&records("pending"));
        let pending_cell = cache.cell_for(pending).await;

        cache.get_or_fit(&records("other")).await.unwrap();

        let guard = cache.entries.lock().await;
        let kept = guard.cells.get(&pending).unwrap();
        assert!(Arc::ptr_eq(kept, &pending_cell));
        assert_eq!(guard.cells.len(), 2);
    }

    #[tokio::test]
    async fn fitted_cell_is_evicted_before_in_flight_one() {
        let cache = ModelCache::new(Predictor::utc(), 2);
        let pending = Fingerprint::of(&records("pending"));
        cache.cell_for(pending).await;
        let fitted = records("fitted");
        cache.get_or_fit(&fitted).await.unwrap();

        cache.get_or_fit(&records("newest")).await.unwrap();

        assert!(cache.get(Fingerprint::of(&fitted)).await.is_none());
        assert!(cache.entries.lock().await.cells.contains_key(&pending));
    }

    #[tokio::test]
    async fn in_flight_cell_survives_invalidation() {
        let cache = ModelCache::new(Predictor::utc(), 4);
        let pending = Fingerprint::of(&records("pending"));
        let pending_cell = cache.cell_for(pending).await;

        assert!(!cache.invalidate(pending).await);

        let again = cache.cell_for(pending).await;
        assert!(Arc::ptr_eq(&again, &pending_cell));
    }
}
