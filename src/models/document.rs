// src/models/document.rs

//! The unit persisted to the CI index.

use serde::Serialize;

use crate::error::Result;
use crate::models::{CiRecord, WorkOrderRecord};

/// Document field holding the correlated work order.
pub const WORK_ORDER_FIELD: &str = "workorder";

/// A CI record plus, for deployed instances, its correlated work order.
///
/// Only the correlator can attach a work order. A `workorder` field that
/// arrived with the record itself is dropped, so a document built for a
/// non-deployed CI never carries one.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchDocument {
    #[serde(flatten)]
    record: CiRecord,

    #[serde(rename = "workorder", skip_serializing_if = "Option::is_none")]
    work_order: Option<WorkOrderRecord>,
}

impl SearchDocument {
    /// A document carrying only the record itself.
    pub fn bare(record: CiRecord) -> Self {
        Self::build(record, None)
    }

    pub(crate) fn with_work_order(record: CiRecord, work_order: WorkOrderRecord) -> Self {
        Self::build(record, Some(work_order))
    }

    fn build(mut record: CiRecord, work_order: Option<WorkOrderRecord>) -> Self {
        if record.extra.remove(WORK_ORDER_FIELD).is_some() {
            log::debug!("ci {}: dropped inbound {} field", record.ci_id, WORK_ORDER_FIELD);
        }
        Self { record, work_order }
    }

    pub fn record(&self) -> &CiRecord {
        &self.record
    }

    pub fn work_order(&self) -> Option<&WorkOrderRecord> {
        self.work_order.as_ref()
    }

    /// Document id in the index.
    pub fn id(&self) -> String {
        self.record.document_id()
    }

    /// Serialize to the JSON body sent to the index.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
