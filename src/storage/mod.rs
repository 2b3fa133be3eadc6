//! Index store abstractions.
//!
//! The indexer talks to the search index through [`IndexStore`]. Three
//! backends are provided:
//!
//! - [`ElasticStore`]: Elasticsearch-compatible REST API (feature `elastic`)
//! - [`LocalStore`]: JSON files on disk, for development and replays
//! - [`MemoryStore`]: in-process maps, for embedding and tests
//!
//! ## Document Layout
//!
//! ```text
//! {ci_index}/{document_kind}/{ciId}        # primary CI documents
//! {event_index}/{event_channel}/{hash}     # raw event projections (create-only)
//! {work_order_pattern}/{work_order_kind}/* # work orders, written by another producer
//! ```

#[cfg(feature = "elastic")]
pub mod elastic;
pub mod local;
pub mod memory;

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::models::{IndexConfig, StoreBackend, StoreConfig};

#[cfg(feature = "elastic")]
pub use elastic::ElasticStore;
pub use local::LocalStore;
pub use memory::MemoryStore;

/// Lookup of the latest completed work order referencing a CI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkOrderQuery {
    /// Id of the CI the work order's `rfcCi` points at
    pub ci_id: i64,
    /// Required `dpmtRecordState`
    pub state: String,
    /// Dotted path of the field to sort on, descending
    pub sort_field: String,
    pub limit: usize,
}

impl WorkOrderQuery {
    /// Latest `complete` work order for `ci_id`.
    pub fn latest_complete(ci_id: i64) -> Self {
        Self {
            ci_id,
            state: "complete".to_string(),
            sort_field: "searchTags.responseDequeTS".to_string(),
            limit: 1,
        }
    }

    /// Lucene query string form, as sent to a search backend.
    pub fn query_string(&self) -> String {
        format!("rfcCi.ciId:{} AND dpmtRecordState:{}", self.ci_id, self.state)
    }

    /// Evaluate the filter against a work order source document.
    pub fn matches(&self, source: &Value) -> bool {
        let ci_matches = match lookup(source, "rfcCi.ciId") {
            Some(Value::Number(n)) => n.as_i64() == Some(self.ci_id),
            Some(Value::String(s)) => s.parse::<i64>().ok() == Some(self.ci_id),
            _ => false,
        };
        let state = lookup(source, "dpmtRecordState").and_then(Value::as_str);
        ci_matches && state == Some(self.state.as_str())
    }

    /// Apply filter, descending sort and limit to a set of source documents.
    pub fn select<'a, I>(&self, sources: I) -> Vec<Value>
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut hits: Vec<&Value> = sources.into_iter().filter(|s| self.matches(s)).collect();
        hits.sort_by(|a, b| {
            compare_sort_keys(lookup(b, &self.sort_field), lookup(a, &self.sort_field))
        });
        hits.into_iter().take(self.limit).cloned().collect()
    }
}

/// Follow a dotted path into a JSON document.
fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.get(key))
}

/// Order sort keys: missing first, then numbers, then strings.
fn compare_sort_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(_)), Some(Value::String(_))) => Ordering::Less,
        (Some(Value::String(_)), Some(Value::Number(_))) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Trait for search index backends.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Write (create or replace) a document in the CI index.
    async fn index(&self, kind: &str, id: &str, body: &str) -> Result<()>;

    /// Write an event projection to the event index, keeping the first copy
    /// of identical events.
    async fn index_event(&self, channel: &str, body: &str) -> Result<()>;

    /// Read a document from the CI index, `None` when it does not exist.
    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>>;

    /// Search the work order collection, returning matching sources in order.
    async fn search_work_orders(&self, query: &WorkOrderQuery) -> Result<Vec<Value>>;
}

/// Build the store selected by configuration.
pub fn open_store(store: &StoreConfig, index: &IndexConfig) -> Result<Arc<dyn IndexStore>> {
    match store.backend {
        StoreBackend::Local => Ok(Arc::new(LocalStore::new(&store.local_root, index.clone()))),
        #[cfg(feature = "elastic")]
        StoreBackend::Elastic => Ok(Arc::new(ElasticStore::new(store, index.clone())?)),
        #[cfg(not(feature = "elastic"))]
        StoreBackend::Elastic => Err(crate::error::AppError::config(
            "store.backend = \"elastic\" requires the `elastic` feature",
        )),
    }
}
