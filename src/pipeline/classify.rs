// src/pipeline/classify.rs

//! Class-name based routing of CI records.

use crate::models::CiRecord;

/// Deployment manifest class whose successful plan generations are measured.
pub const ENVIRONMENT_CLASS: &str = "manifest.Environment";

/// Comment prefix written when plan generation succeeds.
pub const PLAN_SUCCESS_PREFIX: &str = "SUCCESS: Generation time taken: ";

/// Classes handled by the policy processor.
pub const POLICY_CLASSES: [&str; 2] = ["account.Policy", "mgmt.manifest.Policy"];

/// Side-effect processor a record is routed to. At most one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    DeploymentPlan,
    Policy,
}

/// Routing decision for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub side_effect: Option<SideEffect>,
    /// Whether the document gets a correlated work order
    pub correlate: bool,
}

/// Decide side effects and correlation for a record.
pub fn classify(record: &CiRecord) -> Classification {
    let class = record.ci_class_name.as_str();

    let plan_succeeded =
        class == ENVIRONMENT_CLASS && record.comment().starts_with(PLAN_SUCCESS_PREFIX);

    let side_effect = if plan_succeeded {
        Some(SideEffect::DeploymentPlan)
    } else if POLICY_CLASSES.contains(&class) {
        Some(SideEffect::Policy)
    } else {
        None
    };

    Classification {
        side_effect,
        correlate: record.is_deployed_instance(),
    }
}
