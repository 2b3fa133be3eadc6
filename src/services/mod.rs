//! External collaborators of the indexing pipeline.
//!
//! The pipeline only depends on these traits:
//! - [`CiTransformer`]: turns a generic CMS CI into a simplified record
//! - [`CiProcessor`]: side-effect consumer of classified records
//!   (deployment-plan metrics, policies)
//!
//! Default implementations are provided for the CLI.

mod processors;
mod transform;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{CiRecord, CmsCi};

pub use processors::LoggingProcessor;
pub use transform::{AttributeValue, DefaultTransformer};

/// Simplifies generic CMS CIs into records.
pub trait CiTransformer: Send + Sync {
    fn simplify(&self, ci: CmsCi) -> Result<CiRecord>;
}

/// Consumes a classified record. The pipeline ignores anything it produces.
#[async_trait]
pub trait CiProcessor: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    async fn process(&self, record: &CiRecord) -> Result<()>;
}
