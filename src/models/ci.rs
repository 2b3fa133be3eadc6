// src/models/ci.rs

//! Configuration item records as they arrive on the bus.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Class-name prefix of deployed-instance CIs.
pub const DEPLOYED_INSTANCE_PREFIX: &str = "bom";

/// A simplified configuration item, the unit the index is keyed on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CiRecord {
    /// CI identifier, also the search document id
    pub ci_id: i64,

    /// Dot-namespaced class name (e.g., "bom.Compute")
    pub ci_class_name: String,

    #[serde(default)]
    pub ci_name: String,

    #[serde(default)]
    pub ns_path: String,

    /// Free-text comment attached by the last change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    /// Attribute values by name
    #[serde(default)]
    pub ci_attributes: BTreeMap<String, String>,

    /// Class-specific fields, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CiRecord {
    /// Create a record with only the identifying fields set.
    pub fn new(ci_id: i64, ci_class_name: impl Into<String>) -> Self {
        Self {
            ci_id,
            ci_class_name: ci_class_name.into(),
            ci_name: String::new(),
            ns_path: String::new(),
            comments: None,
            ci_attributes: BTreeMap::new(),
            extra: Map::new(),
        }
    }

    /// Whether this CI represents an actually deployed instance.
    pub fn is_deployed_instance(&self) -> bool {
        self.ci_class_name.starts_with(DEPLOYED_INSTANCE_PREFIX)
    }

    /// The comment text, or an empty string when absent.
    pub fn comment(&self) -> &str {
        self.comments.as_deref().unwrap_or("")
    }

    /// Document id used for this record in the index.
    pub fn document_id(&self) -> String {
        self.ci_id.to_string()
    }
}

/// A generic CI as produced by the CMS, before simplification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CmsCi {
    pub ci_id: i64,

    pub ci_class_name: String,

    #[serde(default)]
    pub ci_name: String,

    #[serde(default)]
    pub ns_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,

    /// Attributes keyed by attribute name
    #[serde(default)]
    pub attributes: BTreeMap<String, CmsCiAttribute>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single CMS attribute carrying both designed and desired values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CmsCiAttribute {
    #[serde(default)]
    pub attribute_name: String,

    /// Designed ("df") value
    #[serde(default)]
    pub df_value: Option<String>,

    /// Desired ("dj") value
    #[serde(default)]
    pub dj_value: Option<String>,
}
