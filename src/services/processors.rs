// src/services/processors.rs

use async_trait::async_trait;

use crate::error::Result;
use crate::models::CiRecord;
use crate::services::CiProcessor;

/// Processor that only records the hand-off in the log.
///
/// Used by the CLI where the real plan/policy consumers are not wired in.
#[derive(Debug, Clone)]
pub struct LoggingProcessor {
    name: String,
}

impl LoggingProcessor {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl CiProcessor for LoggingProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, record: &CiRecord) -> Result<()> {
        log::info!(
            "{}: ci {} ({}) {}",
            self.name,
            record.ci_id,
            record.ci_class_name,
            record.ns_path
        );
        Ok(())
    }
}
