//! Core executor orchestration

use super::field_resolver::{self, PendingField};
use super::host::LoaderHost;
use super::query_executor;
use super::response::{FieldError, Response, write_at};
use super::selection::Operation;
use crate::core::error::LoaderError;
use crate::core::path::ResponsePath;
use crate::scheduler::DeferredScheduler;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// State of one resolution pass
pub(crate) struct Pass<'op> {
    pub scheduler: DeferredScheduler,
    queue: VecDeque<PendingField<'op>>,
    errors: Vec<FieldError>,
}

impl<'op> Pass<'op> {
    fn new() -> Self {
        Self {
            scheduler: DeferredScheduler::new(),
            queue: VecDeque::new(),
            errors: Vec::new(),
        }
    }

    pub fn enqueue(&mut self, pending: PendingField<'op>) {
        self.queue.push_back(pending);
    }

    pub fn error(&mut self, path: &ResponsePath, error: &LoaderError) {
        tracing::debug!(path = %path, code = error.error_code(), error = %error, "field failed");
        self.errors.push(FieldError::new(path, error));
    }
}

/// Executes read operations against the loader host
///
/// Root fields are fetched first. Completing their objects registers every
/// relation field with its batch; the registrations are then read in FIFO
/// order. Reading the first registration of a path flushes the batch every
/// sibling registered into, and completing the loaded rows registers the
/// next level. Each relation path therefore costs one bulk fetch per pass.
pub struct Executor {
    host: Arc<LoaderHost>,
}

impl Executor {
    pub fn new(host: Arc<LoaderHost>) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &Arc<LoaderHost> {
        &self.host
    }

    /// Execute an operation
    ///
    /// Failures never abort the pass: the failed node is set to null and a
    /// [`FieldError`] is attached at its path. Repeated fields are merged
    /// first, so every response key is resolved once.
    pub async fn execute(&self, operation: &Operation) -> Response {
        let operation = operation.merged();
        let mut pass = Pass::new();
        let mut data = serde_json::Map::new();

        for node in &operation.selection {
            let path = ResponsePath::root().field(node.response_key());
            tracing::info!(field = %node.name, "resolving root field");

            let value =
                match query_executor::resolve_root_field(&self.host, &mut pass, node, &path).await
                {
                    Ok(value) => value,
                    Err(e) => {
                        pass.error(&path, &e);
                        Value::Null
                    }
                };
            data.insert(node.response_key().to_string(), value);
        }

        let mut data = Value::Object(data);

        while let Some(PendingField { target, value }) = pass.queue.pop_front() {
            let completed = match value.resolve().await {
                Ok(resolved) => {
                    field_resolver::complete_resolved(&self.host, &mut pass, &target, resolved)
                }
                Err(e) => Err(e),
            };
            let completed = match completed {
                Ok(value) => value,
                Err(e) => {
                    pass.error(&target.path, &e);
                    Value::Null
                }
            };

            if !write_at(&mut data, &target.path, completed) {
                tracing::debug!(path = %target.path, "dropped value of a removed node");
            }
        }

        match pass.scheduler.flush_all().await {
            Ok(0) => {}
            Ok(flushed) => tracing::debug!(flushed, "flushed unread batches"),
            Err(e) => tracing::warn!(error = %e, "failed to flush remaining batches"),
        }

        tracing::info!(
            batches = pass.scheduler.registry().len(),
            errors = pass.errors.len(),
            "operation executed"
        );

        Response {
            data,
            errors: pass.errors,
        }
    }
}
