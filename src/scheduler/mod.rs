//! Deferred values and the two-phase register/read protocol
//!
//! Resolution runs in two phases:
//!
//! - **register**: a resolver obtains the batch for its (loader kind, path)
//!   and registers the key it needs. This never suspends and returns a
//!   [`DeferredValue`] placeholder immediately.
//! - **read**: awaiting a deferred value flushes its batch if that has not
//!   happened yet, then runs the wrapped work on the registration's rows.
//!
//! As long as the engine registers every sibling before reading any of
//! them, each batch performs exactly one bulk fetch. Reading early only
//! degrades batching, never correctness.

use crate::batch::{
    Batch, BatchKey, BatchLoader, BatchRegistry, Loaded, LoaderKind, PendingLoad,
};
use crate::core::error::{LoaderError, Result};
use crate::core::field::RecordKey;
use crate::core::path::ResponsePath;
use futures::future::{BoxFuture, FutureExt};
use std::future::IntoFuture;
use std::sync::Arc;

/// Request-scoped coordinator of batches and deferred values
#[derive(Default)]
pub struct DeferredScheduler {
    registry: BatchRegistry,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &BatchRegistry {
        &self.registry
    }

    /// Get the live batch for `(kind, path)`
    pub fn batch<F>(
        &self,
        kind: LoaderKind,
        path: &ResponsePath,
        make_loader: F,
    ) -> Result<Arc<Batch>>
    where
        F: FnOnce() -> Result<Arc<dyn BatchLoader>>,
    {
        self.registry.instance(kind, path, make_loader)
    }

    /// Get the live batch for an explicit (possibly scoped) key
    pub fn batch_for<F>(&self, key: BatchKey, make_loader: F) -> Result<Arc<Batch>>
    where
        F: FnOnce() -> Result<Arc<dyn BatchLoader>>,
    {
        self.registry.instance_for(key, make_loader)
    }

    /// Register `key` in `batch` and defer `work` until the batch flushed
    pub fn defer<C, T, F>(
        &self,
        batch: &Arc<Batch>,
        key: RecordKey,
        context: C,
        work: F,
    ) -> Result<DeferredValue<T>>
    where
        C: Send + 'static,
        T: Send + 'static,
        F: FnOnce(Loaded<C>) -> Result<T> + Send + 'static,
    {
        Ok(self.wrap(batch.load(key, context)?, work))
    }

    /// Wrap a registration and the work consuming its rows
    pub fn wrap<C, T, F>(&self, pending: PendingLoad<C>, work: F) -> DeferredValue<T>
    where
        C: Send + 'static,
        T: Send + 'static,
        F: FnOnce(Loaded<C>) -> Result<T> + Send + 'static,
    {
        DeferredValue {
            future: async move { work(pending.resolve().await?) }.boxed(),
        }
    }

    /// Flush every batch nobody has read yet
    ///
    /// Ends a resolution pass. Failures were already delivered to (or will
    /// never be read by) their registrations, so they are only logged here.
    /// Returns the number of batches flushed.
    pub async fn flush_all(&self) -> Result<usize> {
        let batches = self.registry.unflushed()?;
        for batch in &batches {
            if let Err(e) = batch.flush().await {
                tracing::warn!(batch = %batch.key(), error = %e, "unread batch failed to flush");
            }
        }
        Ok(batches.len())
    }
}

/// A value available once its batch has flushed
///
/// Nothing runs until the value is awaited.
pub struct DeferredValue<T> {
    future: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> DeferredValue<T> {
    /// A value that needs no batch
    pub fn ready(value: T) -> Self {
        Self {
            future: futures::future::ready(Ok(value)).boxed(),
        }
    }

    /// A value that already failed
    pub fn failed(error: LoaderError) -> Self {
        Self {
            future: futures::future::ready(Err(error)).boxed(),
        }
    }

    /// Transform the value once available
    pub fn map<U, F>(self, f: F) -> DeferredValue<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        DeferredValue {
            future: self.future.map(|result| result.map(f)).boxed(),
        }
    }

    /// Read the value, flushing its batch if needed
    pub async fn resolve(self) -> Result<T> {
        self.future.await
    }
}

impl<T> IntoFuture for DeferredValue<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}
