//! Request-scoped batches of deferred relation loads
//!
//! Sibling resolvers register the keys they need against a shared [`Batch`]
//! without suspending. The first read of any registration flushes the
//! batch: one bulk fetch covers every pending key, and each registration
//! picks its own group from the result.
//!
//! A batch flushes exactly once. Registering into a flushed batch is a
//! caller ordering bug and fails with `INVALID_BATCH_USE`.

pub mod key;
pub mod loader;
pub mod registry;

pub use key::{BatchKey, LoaderKind};
pub use loader::{BatchLoader, Grouped, RelationBatchLoader};
pub use registry::BatchRegistry;

use crate::core::error::{BatchError, LoaderError, Result};
use crate::core::field::{RecordKey, Row};
use indexmap::IndexMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OnceCell;

/// Outcome of the one bulk fetch, shared by every registration
type FlushOutcome = Result<Arc<Grouped>>;

/// A coalescing group of loads sharing one bulk fetch
pub struct Batch {
    key: BatchKey,
    loader: Arc<dyn BatchLoader>,
    state: Mutex<BatchState>,
    outcome: OnceCell<FlushOutcome>,
}

#[derive(Default)]
struct BatchState {
    /// Distinct keys in registration order -> number of registrations
    pending: IndexMap<RecordKey, usize>,
    flushed: bool,
}

impl Batch {
    pub fn new(key: BatchKey, loader: Arc<dyn BatchLoader>) -> Self {
        Self {
            key,
            loader,
            state: Mutex::new(BatchState::default()),
            outcome: OnceCell::new(),
        }
    }

    pub fn key(&self) -> &BatchKey {
        &self.key
    }

    /// Register a load for `key`, carrying the caller's `context`
    ///
    /// Never suspends. Every registration is honored independently, even
    /// for a key registered before.
    pub fn load<C>(self: &Arc<Self>, key: RecordKey, context: C) -> Result<PendingLoad<C>> {
        let mut state = self.lock()?;
        if state.flushed {
            return Err(BatchError::AlreadyFlushed {
                batch: self.key.to_string(),
            }
            .into());
        }
        *state.pending.entry(key.clone()).or_default() += 1;

        Ok(PendingLoad {
            batch: Arc::clone(self),
            key,
            context,
        })
    }

    /// Whether the batch has started (or finished) its flush
    pub fn is_flushed(&self) -> bool {
        self.lock().map(|state| state.flushed).unwrap_or(true)
    }

    /// Distinct pending keys, in registration order
    pub fn pending_keys(&self) -> Vec<RecordKey> {
        self.lock()
            .map(|state| state.pending.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Total number of registrations, duplicates included
    pub fn registrations(&self) -> usize {
        self.lock()
            .map(|state| state.pending.values().sum())
            .unwrap_or_default()
    }

    /// Flush the batch if it has not been flushed yet
    ///
    /// Concurrent readers all await the same fetch; a failure is delivered
    /// to every reader and never retried.
    pub async fn flush(&self) -> Result<Arc<Grouped>> {
        self.outcome.get_or_init(|| self.execute()).await.clone()
    }

    async fn execute(&self) -> FlushOutcome {
        let (keys, registrations) = {
            let mut state = self.lock()?;
            state.flushed = true;
            let keys: Vec<RecordKey> = state.pending.keys().cloned().collect();
            (keys, state.pending.values().sum::<usize>())
        };

        if keys.is_empty() {
            tracing::debug!(batch = %self.key, "flushing empty batch, nothing to fetch");
            return Ok(Arc::default());
        }

        tracing::debug!(
            batch = %self.key,
            keys = keys.len(),
            registrations,
            "flushing batch"
        );

        match self.loader.load(&keys).await {
            Ok(grouped) => Ok(Arc::new(grouped)),
            Err(e) => {
                tracing::warn!(batch = %self.key, error = %e, "bulk fetch failed");
                Err(BatchError::FetchFailed {
                    batch: self.key.to_string(),
                    message: format!("{:#}", e),
                }
                .into())
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BatchState>> {
        self.state
            .lock()
            .map_err(|e| LoaderError::Internal(format!("Failed to acquire batch lock: {}", e)))
    }
}

/// One registration in a batch, readable once the batch flushes
pub struct PendingLoad<C> {
    batch: Arc<Batch>,
    key: RecordKey,
    context: C,
}

impl<C> PendingLoad<C> {
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn batch(&self) -> &Arc<Batch> {
        &self.batch
    }

    /// Read the result, flushing the batch first if needed
    ///
    /// A key without related rows yields an empty group.
    pub async fn resolve(self) -> Result<Loaded<C>> {
        let grouped = self.batch.flush().await?;
        let rows = grouped.get(&self.key).cloned().unwrap_or_default();
        Ok(Loaded {
            context: self.context,
            rows,
        })
    }
}

/// A registration's share of the bulk fetch
#[derive(Debug, Clone)]
pub struct Loaded<C> {
    pub context: C,
    pub rows: Vec<Row>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::path::ResponsePath;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Answers every key with one row echoing it, counting fetches
    #[derive(Default)]
    struct EchoLoader {
        fetches: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BatchLoader for EchoLoader {
        async fn load(&self, keys: &[RecordKey]) -> anyhow::Result<Grouped> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("database unavailable");
            }
            Ok(keys
                .iter()
                .filter(|key| key.as_str() != "missing")
                .map(|key| {
                    let row = json!({ "key": key.as_str() }).as_object().cloned().unwrap();
                    (key.clone(), vec![row])
                })
                .collect())
        }
    }

    fn batch(loader: Arc<EchoLoader>) -> Arc<Batch> {
        let path = ResponsePath::root().field("posts").index(0).field("author");
        Arc::new(Batch::new(BatchKey::new(LoaderKind::Relation, &path), loader))
    }

    #[tokio::test]
    async fn test_one_fetch_for_many_registrations() {
        let loader = Arc::new(EchoLoader::default());
        let batch = batch(loader.clone());

        let pending: Vec<_> = (1..=5)
            .map(|i| batch.load(RecordKey::from(i), i).unwrap())
            .collect();
        assert_eq!(batch.pending_keys().len(), 5);

        for load in pending {
            let loaded = load.resolve().await.unwrap();
            assert_eq!(loaded.rows.len(), 1);
            assert_eq!(loaded.rows[0]["key"], json!(loaded.context.to_string()));
        }
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_keys_are_honored_independently() {
        let loader = Arc::new(EchoLoader::default());
        let batch = batch(loader.clone());

        let first = batch.load(RecordKey::from(1), "first").unwrap();
        let second = batch.load(RecordKey::from(1), "second").unwrap();
        assert_eq!(batch.pending_keys(), vec![RecordKey::from(1)]);
        assert_eq!(batch.registrations(), 2);

        let second = second.resolve().await.unwrap();
        let first = first.resolve().await.unwrap();
        assert_eq!(first.context, "first");
        assert_eq!(second.context, "second");
        assert_eq!(first.rows, second.rows);
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_key_yields_empty_group() {
        let batch = batch(Arc::new(EchoLoader::default()));
        let loaded = batch
            .load(RecordKey::new("missing"), ())
            .unwrap()
            .resolve()
            .await
            .unwrap();
        assert!(loaded.rows.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_fetch() {
        let loader = Arc::new(EchoLoader::default());
        let batch = batch(loader.clone());

        let grouped = batch.flush().await.unwrap();
        assert!(grouped.is_empty());
        assert!(batch.is_flushed());
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_after_flush_is_rejected() {
        let batch = batch(Arc::new(EchoLoader::default()));
        batch.load(RecordKey::from(1), ()).unwrap();
        batch.flush().await.unwrap();

        let err = batch.load(RecordKey::from(2), ()).err().unwrap();
        assert_eq!(err.error_code(), "INVALID_BATCH_USE");
    }

    #[tokio::test]
    async fn test_failure_reaches_every_registration_without_retry() {
        let loader = Arc::new(EchoLoader {
            fail: true,
            ..Default::default()
        });
        let batch = batch(loader.clone());

        let first = batch.load(RecordKey::from(1), ()).unwrap();
        let second = batch.load(RecordKey::from(2), ()).unwrap();

        let first = first.resolve().await.err().unwrap();
        let second = second.resolve().await.err().unwrap();
        assert_eq!(first.error_code(), "BATCH_FETCH_FAILURE");
        assert_eq!(first.to_string(), second.to_string());
        assert!(first.to_string().contains("database unavailable"));
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_the_fetch() {
        let loader = Arc::new(EchoLoader::default());
        let batch = batch(loader.clone());

        let reads: Vec<_> = (1..=3)
            .map(|i| batch.load(RecordKey::from(i), ()).unwrap().resolve())
            .collect();
        let results = futures::future::join_all(reads).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(loader.fetches.load(Ordering::SeqCst), 1);
    }
}
