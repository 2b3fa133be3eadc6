//! Scripted index store and recording processors for pipeline tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::CiRecord;
use crate::services::CiProcessor;
use crate::storage::{IndexStore, MemoryStore, WorkOrderQuery};

/// Outcome of one scripted work order search.
#[derive(Debug, Clone)]
pub enum Search {
    Empty,
    Fail,
    Hit(Value),
}

/// Memory store with call counters and injectable failures.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    searches: Mutex<VecDeque<Search>>,
    pub search_calls: AtomicU32,
    pub index_calls: AtomicU32,
    pub event_calls: AtomicU32,
    pub get_calls: AtomicU32,
    index_failures: AtomicU32,
    pub fail_events: bool,
    pub fail_get: bool,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue search outcomes; once drained, searches go to the inner store.
    pub fn script_searches(&self, steps: impl IntoIterator<Item = Search>) {
        self.searches.lock().unwrap().extend(steps);
    }

    /// Make the next `n` primary writes fail.
    pub fn fail_next_index(&self, n: u32) {
        self.index_failures.store(n, Ordering::SeqCst);
    }

    pub fn searches(&self) -> u32 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn index_writes(&self) -> u32 {
        self.index_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IndexStore for ScriptedStore {
    async fn index(&self, kind: &str, id: &str, body: &str) -> Result<()> {
        self.index_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.index_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.index_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::index(format!("{kind}/{id}"), "status 503"));
        }
        self.inner.index(kind, id, body).await
    }

    async fn index_event(&self, channel: &str, body: &str) -> Result<()> {
        self.event_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_events {
            return Err(AppError::index(format!("event {channel}"), "status 500"));
        }
        self.inner.index_event(channel, body).await
    }

    async fn get(&self, kind: &str, id: &str) -> Result<Option<Value>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get {
            return Err(AppError::index(format!("get {kind}/{id}"), "status 500"));
        }
        self.inner.get(kind, id).await
    }

    async fn search_work_orders(&self, query: &WorkOrderQuery) -> Result<Vec<Value>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let step = self.searches.lock().unwrap().pop_front();
        match step {
            Some(Search::Empty) => Ok(Vec::new()),
            Some(Search::Fail) => Err(AppError::index("search", "status 503")),
            Some(Search::Hit(source)) => Ok(vec![source]),
            None => self.inner.search_work_orders(query).await,
        }
    }
}

/// Processor that remembers which records it saw.
#[derive(Default)]
pub struct RecordingProcessor {
    pub seen: Mutex<Vec<i64>>,
    pub fail: bool,
}

impl RecordingProcessor {
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl CiProcessor for RecordingProcessor {
    fn name(&self) -> &str {
        "recording"
    }

    async fn process(&self, record: &CiRecord) -> Result<()> {
        self.seen.lock().unwrap().push(record.ci_id);
        if self.fail {
            return Err(AppError::collaborator(self.name(), "boom"));
        }
        Ok(())
    }
}
