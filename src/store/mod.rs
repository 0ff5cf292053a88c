//! Event store access: batch row lookups plus best-effort enrichment.
//!
//! The store holds two tables per namespace: raw payloads and normalized
//! events, both keyed by event id with the payload in a single column.
//! Lookup failures degrade to empty results instead of aborting a message;
//! the [`Enrichment`] type keeps that degradation visible to callers.

pub mod rest;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::metrics;
use crate::model::{NormalizedEvent, RawEvent};
use crate::pipeline::retry::RetryPolicy;

pub use rest::RestEventStore;

/// Qualified column holding the event payload.
pub const EVENT_COLUMN: &str = "n:e";

/// Transient lookups retry 3 times with a 1 second pause.
pub const STORE_RETRY: RetryPolicy = RetryPolicy::new(3, Duration::from_secs(1));

/// Errors raised by store lookups.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no store connections available: {0}")]
    NoConnections(String),

    #[error("store request timed out: {0}")]
    Timeout(String),

    #[error("store protocol error: {0}")]
    Protocol(String),

    #[error("row payload decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    /// Connection exhaustion, protocol-level failures, and timeouts are
    /// worth another attempt; a payload that does not decode is not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Decode(_))
    }
}

/// Single-batch row lookup against one table, projecting the event column.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    async fn fetch_rows(
        &self,
        table: &str,
        row_keys: &[String],
    ) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// Outcome of a best-effort enrichment lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Enrichment<T> {
    Loaded(T),
    Skipped { reason: String },
}

impl<T: Default> Enrichment<T> {
    /// The loaded value, or the type's default when enrichment was skipped.
    pub fn unwrap_or_default(self) -> T {
        match self {
            Enrichment::Loaded(value) => value,
            Enrichment::Skipped { .. } => T::default(),
        }
    }
}

impl<T> Enrichment<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Enrichment::Loaded(_))
    }
}

/// Best-effort reader over the raw and normalized event tables.
pub struct EventLoader {
    store: Arc<dyn EventStore>,
    namespace: String,
    raw_table: String,
    normalized_table: String,
    retry: RetryPolicy,
}

impl EventLoader {
    pub fn new(store: Arc<dyn EventStore>, config: &StoreConfig) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            raw_table: config.raw_table.clone(),
            normalized_table: config.normalized_table.clone(),
            retry: STORE_RETRY,
        }
    }

    /// Override the lookup retry policy (used by tests).
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn full_table_name(&self, table: &str) -> String {
        format!("{}:{}", self.namespace, table)
    }

    /// Fetch raw payload text for `ids`, best-effort.
    pub async fn raw_events(&self, ids: &[String]) -> Enrichment<Vec<String>> {
        let timer = metrics::STORE_LOADING_SECONDS.start_timer();
        let result = self
            .fetch(&self.full_table_name(&self.raw_table), ids)
            .await
            .and_then(decode_raw);
        drop(timer);
        match result {
            Ok(events) => {
                debug!(count = events.len(), "loaded raw events");
                metrics::LOADED_RAW_EVENTS.inc_by(events.len() as u64);
                Enrichment::Loaded(events)
            }
            Err(err) => {
                metrics::STORE_ERRORS.inc();
                Enrichment::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Fetch normalized events for `ids`, best-effort.
    pub async fn normalized_events(&self, ids: &[String]) -> Enrichment<Vec<NormalizedEvent>> {
        let timer = metrics::STORE_LOADING_SECONDS.start_timer();
        let result = self
            .fetch(&self.full_table_name(&self.normalized_table), ids)
            .await
            .and_then(decode_normalized);
        drop(timer);
        match result {
            Ok(events) => {
                info!(count = events.len(), "loaded normalized events");
                metrics::LOADED_NORMALIZED_EVENTS.inc_by(events.len() as u64);
                Enrichment::Loaded(events)
            }
            Err(err) => {
                metrics::STORE_ERRORS.inc();
                Enrichment::Skipped {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Batch lookup with transient-failure retries. An empty id list never
    /// touches the store.
    async fn fetch(&self, table: &str, ids: &[String]) -> Result<Vec<Vec<u8>>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run(
                "store_fetch",
                || self.store.fetch_rows(table, ids),
                StoreError::is_transient,
            )
            .await
    }
}

fn decode_raw(rows: Vec<Vec<u8>>) -> Result<Vec<String>, StoreError> {
    rows.iter()
        .map(|bytes| {
            serde_json::from_slice::<RawEvent>(bytes)
                .map(|event| event.raw)
                .map_err(StoreError::from)
        })
        .collect()
}

fn decode_normalized(rows: Vec<Vec<u8>>) -> Result<Vec<NormalizedEvent>, StoreError> {
    rows.iter()
        .map(|bytes| serde_json::from_slice::<NormalizedEvent>(bytes).map_err(StoreError::from))
        .collect()
}
