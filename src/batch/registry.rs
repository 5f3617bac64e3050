//! Registry of the batches live in one request

use super::{Batch, BatchKey, BatchLoader, LoaderKind};
use crate::core::error::{LoaderError, Result};
use crate::core::path::ResponsePath;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Maps (loader kind, path) to the live batch for that group
///
/// Scoped to one request. [`instance`](Self::instance) returns the same
/// batch for the same key until it flushes; the next call then starts a
/// fresh batch for any later resolution phase.
#[derive(Default)]
pub struct BatchRegistry {
    batches: Mutex<HashMap<BatchKey, Arc<Batch>>>,
}

impl BatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live batch for `(kind, path)`, creating it with `make_loader`
    ///
    /// `make_loader` only runs when a new batch is created; the first
    /// registration's loader serves every sibling.
    pub fn instance<F>(
        &self,
        kind: LoaderKind,
        path: &ResponsePath,
        make_loader: F,
    ) -> Result<Arc<Batch>>
    where
        F: FnOnce() -> Result<Arc<dyn BatchLoader>>,
    {
        self.instance_for(BatchKey::new(kind, path), make_loader)
    }

    /// Get the live batch for an explicit (possibly scoped) key
    pub fn instance_for<F>(&self, key: BatchKey, make_loader: F) -> Result<Arc<Batch>>
    where
        F: FnOnce() -> Result<Arc<dyn BatchLoader>>,
    {
        let mut batches = self.lock()?;

        if let Some(batch) = batches.get(&key)
            && !batch.is_flushed()
        {
            return Ok(Arc::clone(batch));
        }

        tracing::debug!(batch = %key, "creating batch");
        let batch = Arc::new(Batch::new(key.clone(), make_loader()?));
        batches.insert(key, Arc::clone(&batch));
        Ok(batch)
    }

    /// Batches that have not flushed yet
    pub fn unflushed(&self) -> Result<Vec<Arc<Batch>>> {
        Ok(self
            .lock()?
            .values()
            .filter(|batch| !batch.is_flushed())
            .cloned()
            .collect())
    }

    /// Number of live batches (flushed ones included until replaced)
    pub fn len(&self) -> usize {
        self.lock().map(|batches| batches.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<BatchKey, Arc<Batch>>>> {
        self.batches
            .lock()
            .map_err(|e| LoaderError::Internal(format!("Failed to acquire registry lock: {}", e)))
    }
}
