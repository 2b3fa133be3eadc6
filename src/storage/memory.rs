//! In-process index store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::storage::{IndexStore, WorkOrderQuery};
use crate::utils::content_id;

/// Index store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<(String, String), Value>>,
    events: Mutex<HashMap<String, HashMap<String, Value>>>,
    work_orders: Mutex<Vec<Value>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a work order visible to searches.
    pub fn put_work_order(&self, source: Value) {
        lock(&self.work_orders).push(source);
    }

    /// Seed or replace a CI document directly.
    pub fn put_document(&self, kind: &str, id: &str, source: Value) {
        lock(&self.documents).insert((kind.to_string(), id.to_string()), source);
    }

    /// Current content of a CI document.
    pub fn document(&self, kind: &str, id: &str) -> Option<Value> {
        lock(&self.documents)
            .get(&(kind.to_string(), id.to_string()))
            .cloned()
    }

    /// Number of distinct events stored on a channel.
    pub fn event_count(&self, channel: &str) -> usize {
        lock(&self.events).get(channel).map_or(0, HashMap::len)
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn index(&self, kind: &str, id: &str, body: &str) -> Result<()> {
        let source: Value = serde_json::from_str(body)?;
        self.put_document(kind, id, source);
        Ok(())
    }

    async fn index_event(&self, channel: &str, body: &str) -> Result<()> {
        let source: Value = serde_json::from_str(body)?;
        lock(&self.events)
            .entry(channel.to_string())
            .or_default()
            .entry(content_id(channel, body))
            .or_insert(source);
        Ok(())
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        Ok(self.document(kind, id))
    }

    async fn search_work_orders(&self, query: &WorkOrderQuery) -> Result<Vec<Value>> {
        Ok(query.select(lock(&self.work_orders).iter()))
    }
}
