// src/models/work_order.rs

//! Work order records correlated onto deployed-instance CIs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload keys dropped before a work order is attached to a document.
pub const NOISY_PAYLOAD_KEYS: [&str; 3] = ["RequiresComputes", "SecuredBy", "DependsOn"];

/// The most recent completed execution referencing a CI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkOrderRecord {
    /// Related CIs by relation name
    #[serde(rename = "payLoad", default)]
    pub payload: Map<String, Value>,

    #[serde(rename = "rfcCi", default, skip_serializing_if = "Option::is_none")]
    pub rfc_ci: Option<WorkOrderCi>,

    #[serde(rename = "resultCi", default, skip_serializing_if = "Option::is_none")]
    pub result_ci: Option<WorkOrderCi>,

    /// Deployment record fields, search tags, etc.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkOrderRecord {
    /// Remove the relation lists that bloat the indexed document.
    pub fn strip_noisy_payload(&mut self) {
        for key in NOISY_PAYLOAD_KEYS {
            self.payload.remove(key);
        }
    }

    /// Both attribute sub-records, skipping the absent ones.
    pub fn attribute_sets_mut(&mut self) -> impl Iterator<Item = &mut WorkOrderCi> {
        self.rfc_ci.iter_mut().chain(self.result_ci.iter_mut())
    }
}

/// An attribute sub-record of a work order (`rfcCi` or `resultCi`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct WorkOrderCi {
    #[serde(rename = "ciAttributes", default)]
    pub ci_attributes: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_noisy_payload_is_case_sensitive() {
        let mut wo: WorkOrderRecord = serde_json::from_value(json!({
            "payLoad": {
                "RequiresComputes": [],
                "SecuredBy": [],
                "DependsOn": [],
                "dependsOn": [],
                "ManagedVia": []
            }
        }))
        .unwrap();

        wo.strip_noisy_payload();

        let keys: Vec<_> = wo.payload.keys().cloned().collect();
        assert_eq!(keys, vec!["ManagedVia".to_string(), "dependsOn".to_string()]);
    }

    #[test]
    fn test_unknown_fields_preserved() {
        let source = json!({
            "dpmtRecordState": "complete",
            "rfcCi": {"ciId": 7, "ciAttributes": {"expires_on": "x"}},
            "searchTags": {"responseDequeTS": "2019-11-05T21:08:38.000"}
        });
        let wo: WorkOrderRecord = serde_json::from_value(source.clone()).unwrap();
        assert!(wo.result_ci.is_none());

        let back = serde_json::to_value(&wo).unwrap();
        assert_eq!(back["dpmtRecordState"], "complete");
        assert_eq!(back["rfcCi"]["ciId"], 7);
        assert_eq!(back["searchTags"], source["searchTags"]);
    }
}
