// src/services/transform.rs

//! Default generic-CI simplification.

use crate::error::{AppError, Result};
use crate::models::{CiRecord, CmsCi};
use crate::services::CiTransformer;

/// Which attribute value a simplified record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeValue {
    /// Designed value (`dfValue`)
    #[default]
    Designed,
    /// Desired value (`djValue`)
    Desired,
}

/// Flattens CMS attributes to a single value per name.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransformer {
    value: AttributeValue,
}

impl DefaultTransformer {
    pub fn new(value: AttributeValue) -> Self {
        Self { value }
    }
}

impl CiTransformer for DefaultTransformer {
    fn simplify(&self, ci: CmsCi) -> Result<CiRecord> {
        if ci.ci_class_name.trim().is_empty() {
            return Err(AppError::validation(format!(
                "ci {} has no class name",
                ci.ci_id
            )));
        }

        let ci_attributes = ci
            .attributes
            .into_iter()
            .filter_map(|(name, attr)| {
                let value = match self.value {
                    AttributeValue::Designed => attr.df_value,
                    AttributeValue::Desired => attr.dj_value,
                };
                value.map(|v| (name, v))
            })
            .collect();

        Ok(CiRecord {
            ci_id: ci.ci_id,
            ci_class_name: ci.ci_class_name,
            ci_name: ci.ci_name,
            ns_path: ci.ns_path,
            comments: ci.comments,
            ci_attributes,
            extra: ci.extra,
        })
    }
}
