// src/pipeline/correlate.rs

//! Work order correlation for deployed-instance CIs.
//!
//! Work orders and CI changes come from independent producers, so the work
//! order for a CI may not be searchable yet when the CI event arrives. The
//! correlator polls a bounded number of times and, failing that, reuses the
//! work order already stored on the CI's previous document.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{
    CiRecord, CorrelationConfig, SearchDocument, WORK_ORDER_FIELD, WorkOrderRecord,
};
use crate::pipeline::Backoff;
use crate::storage::{IndexStore, WorkOrderQuery};
use crate::utils::date::{EXPIRES_ON, normalize_field};

/// Where a document's work order came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOrderSource {
    /// Found by the lookup on the given attempt (1-based)
    Fresh { attempt: u32 },
    /// Reused from the previously indexed document
    Previous,
    /// No work order attached
    Missing,
}

/// A correlated document and the provenance of its work order.
#[derive(Debug, Clone)]
pub struct Correlation {
    pub document: SearchDocument,
    pub source: WorkOrderSource,
}

/// Attaches the latest completed work order to a CI record.
pub struct Correlator {
    store: Arc<dyn IndexStore>,
    document_kind: String,
    max_attempts: u32,
    backoff: Backoff,
}

impl Correlator {
    pub fn new(
        store: Arc<dyn IndexStore>,
        document_kind: impl Into<String>,
        config: &CorrelationConfig,
    ) -> Self {
        Self {
            store,
            document_kind: document_kind.into(),
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::from_millis(config.retry_delay_ms),
        }
    }

    /// Build the search document for a deployed-instance record.
    ///
    /// Lookup and fallback failures are logged and never surface; the only
    /// error is [`AppError::Cancelled`](crate::error::AppError::Cancelled)
    /// when `cancel` fires during a wait.
    pub async fn correlate(
        &self,
        record: CiRecord,
        cancel: &CancellationToken,
    ) -> Result<Correlation> {
        let ci_id = record.ci_id;
        let query = WorkOrderQuery::latest_complete(ci_id);

        for attempt in 1..=self.max_attempts {
            match self.lookup(&query).await {
                Ok(Some(mut work_order)) => {
                    log::info!("WO found for ci {} on attempt {}", ci_id, attempt);
                    prepare_work_order(&mut work_order);
                    return Ok(Correlation {
                        document: SearchDocument::with_work_order(record, work_order),
                        source: WorkOrderSource::Fresh { attempt },
                    });
                }
                Ok(None) => {
                    log::debug!(
                        "No WO yet for ci {} (attempt {}/{})",
                        ci_id,
                        attempt,
                        self.max_attempts
                    );
                    if attempt < self.max_attempts {
                        self.backoff.wait(cancel).await?;
                    }
                }
                Err(e) => {
                    log::error!(
                        "Error retrieving WO for ci {} (attempt {}/{}): {}",
                        ci_id,
                        attempt,
                        self.max_attempts,
                        e
                    );
                }
            }
        }

        log::info!(
            "WO not found for ci {} of type {}",
            ci_id,
            record.ci_class_name
        );

        match self.previous_work_order(&record).await {
            Ok(Some(work_order)) => Ok(Correlation {
                document: SearchDocument::with_work_order(record, work_order),
                source: WorkOrderSource::Previous,
            }),
            Ok(None) => Ok(Correlation {
                document: SearchDocument::bare(record),
                source: WorkOrderSource::Missing,
            }),
            Err(e) => {
                log::error!("Error fetching WO from stored ci {}: {}", ci_id, e);
                Ok(Correlation {
                    document: SearchDocument::bare(record),
                    source: WorkOrderSource::Missing,
                })
            }
        }
    }

    /// One search attempt; an undecodable hit counts as a failed attempt.
    async fn lookup(&self, query: &WorkOrderQuery) -> Result<Option<WorkOrderRecord>> {
        let hits = self.store.search_work_orders(query).await?;
        match hits.into_iter().next() {
            Some(source) => Ok(Some(serde_json::from_value(source)?)),
            None => Ok(None),
        }
    }

    /// Work order stored on the CI's current document, used verbatim.
    async fn previous_work_order(&self, record: &CiRecord) -> Result<Option<WorkOrderRecord>> {
        let stored = self
            .store
            .get(&self.document_kind, &record.document_id())
            .await?;

        match stored.as_ref().and_then(|doc| doc.get(WORK_ORDER_FIELD)) {
            Some(Value::Null) | None => Ok(None),
            Some(work_order) => Ok(Some(serde_json::from_value(work_order.clone())?)),
        }
    }
}

/// Strip noisy relations and repair `expires_on` on a freshly found work order.
pub fn prepare_work_order(work_order: &mut WorkOrderRecord) {
    work_order.strip_noisy_payload();
    for ci in work_order.attribute_sets_mut() {
        normalize_field(&mut ci.ci_attributes, EXPIRES_ON);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::error::AppError;
    use crate::pipeline::test_support::{ScriptedStore, Search};

    fn work_order(ci_id: i64) -> Value {
        json!({
            "dpmtRecordState": "complete",
            "searchTags": {"responseDequeTS": "2019-11-05T21:10:00.000"},
            "payLoad": {
                "RequiresComputes": [{"ciId": 1}],
                "SecuredBy": [{"ciId": 2}],
                "DependsOn": [{"ciId": 3}],
                "ManagedVia": [{"ciId": 4}]
            },
            "rfcCi": {
                "ciId": ci_id,
                "ciAttributes": {"expires_on": "Nov  5 21:08:38 2019 GMT", "cn": "x"}
            },
            "resultCi": {
                "ciId": ci_id,
                "ciAttributes": {"expires_on": "Jan 22 18:21:47 2020 GMT"}
            }
        })
    }

    fn correlator(store: &Arc<ScriptedStore>) -> Correlator {
        Correlator::new(
            Arc::clone(store) as Arc<dyn IndexStore>,
            "ci",
            &CorrelationConfig::default(),
        )
    }

    fn attached(correlation: &Correlation) -> &WorkOrderRecord {
        correlation.document.work_order().expect("work order attached")
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_on_first_attempt() {
        let store = Arc::new(ScriptedStore::new());
        store.script_searches([Search::Hit(work_order(42))]);

        let start = Instant::now();
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, WorkOrderSource::Fresh { attempt: 1 });
        assert_eq!(store.searches(), 1);
        assert!(start.elapsed() < Duration::from_millis(1));

        let wo = attached(&result);
        assert_eq!(wo.payload.keys().collect::<Vec<_>>(), vec!["ManagedVia"]);
        let rfc = &wo.rfc_ci.as_ref().unwrap().ci_attributes;
        assert_eq!(rfc["expires_on"], "2019-11-05T21:08:38");
        assert_eq!(rfc["cn"], "x");
        let result_ci = &wo.result_ci.as_ref().unwrap().ci_attributes;
        assert_eq!(result_ci["expires_on"], "2020-01-22T18:21:47");
    }

    #[tokio::test(start_paused = true)]
    async fn test_found_after_empty_attempts_waits_between() {
        let store = Arc::new(ScriptedStore::new());
        store.script_searches([Search::Empty, Search::Empty, Search::Hit(work_order(42))]);

        let start = Instant::now();
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, WorkOrderSource::Fresh { attempt: 3 });
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(10_000));
        assert!(elapsed < Duration::from_millis(15_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_do_not_wait() {
        let store = Arc::new(ScriptedStore::new());
        store.script_searches([
            Search::Fail,
            // undecodable payload
            Search::Hit(json!({"payLoad": 5})),
            Search::Hit(work_order(42)),
        ]);

        let start = Instant::now();
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, WorkOrderSource::Fresh { attempt: 3 });
        assert!(start.elapsed() < Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_without_previous_document() {
        let store = Arc::new(ScriptedStore::new());

        let start = Instant::now();
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        let elapsed = start.elapsed();
        assert_eq!(store.searches(), 5);
        assert!(elapsed >= Duration::from_millis(20_000));
        assert!(elapsed < Duration::from_millis(30_000));
        assert_eq!(result.source, WorkOrderSource::Missing);
        assert!(result.document.work_order().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_falls_back_to_stored_work_order_verbatim() {
        let store = Arc::new(ScriptedStore::new());
        let stored_wo = work_order(42);
        store.inner.put_document(
            "ci",
            "42",
            json!({"ciId": 42, "ciClassName": "bom.Compute", "workorder": stored_wo.clone()}),
        );

        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, WorkOrderSource::Previous);
        let wo = attached(&result);
        // not re-normalized, not stripped
        assert_eq!(
            wo.rfc_ci.as_ref().unwrap().ci_attributes["expires_on"],
            "Nov  5 21:08:38 2019 GMT"
        );
        assert!(wo.payload.contains_key("DependsOn"));
        assert_eq!(serde_json::to_value(wo).unwrap(), stored_wo);
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_document_without_work_order() {
        let store = Arc::new(ScriptedStore::new());
        store
            .inner
            .put_document("ci", "42", json!({"ciId": 42, "workorder": null}));

        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, WorkOrderSource::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_errors_are_swallowed() {
        let mut scripted = ScriptedStore::new();
        scripted.fail_get = true;
        let store = Arc::new(scripted);

        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.source, WorkOrderSource::Missing);
        assert_eq!(store.get_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        let store = Arc::new(ScriptedStore::new());
        store
            .inner
            .put_document("ci", "42", json!({"ciId": 42, "workorder": "garbage"}));
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.source, WorkOrderSource::Missing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_correlation() {
        let store = Arc::new(ScriptedStore::new());
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(7_000)).await;
            canceller.cancel();
        });

        let start = Instant::now();
        let result = correlator(&store)
            .correlate(CiRecord::new(42, "bom.Compute"), &token)
            .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(store.searches(), 2);
        assert!(start.elapsed() < Duration::from_millis(10_000));
    }

    #[test]
    fn test_prepare_without_sub_records() {
        let mut wo: WorkOrderRecord =
            serde_json::from_value(json!({"payLoad": {"SecuredBy": []}})).unwrap();
        prepare_work_order(&mut wo);
        assert!(wo.payload.is_empty());
        assert!(wo.rfc_ci.is_none());
    }
}
