// src/pipeline/write.rs

//! Primary document write with a single immediate retry.

use std::sync::Arc;

use crate::error::Result;
use crate::storage::IndexStore;

/// Writes documents to the CI index.
pub struct IndexWriter {
    store: Arc<dyn IndexStore>,
}

impl IndexWriter {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    /// Write a document, retrying once with the identical body.
    ///
    /// Returns the number of attempts used. A second failure is returned to
    /// the caller as is.
    pub async fn write(&self, kind: &str, id: &str, body: &str) -> Result<u32> {
        match self.store.index(kind, id, body).await {
            Ok(()) => Ok(1),
            Err(e) => {
                log::error!("Error indexing {}/{} on first attempt: {}", kind, id, e);
                self.store.index(kind, id, body).await?;
                log::info!("Indexed {}/{} on retry", kind, id);
                Ok(2)
            }
        }
    }
}
