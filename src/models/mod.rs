// src/models/mod.rs

//! Domain models for the indexer.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod ci;
mod config;
mod document;
mod event;
mod work_order;

// Re-export all public types
pub use ci::{CiRecord, CmsCi, CmsCiAttribute, DEPLOYED_INSTANCE_PREFIX};
pub use config::{
    Config, ConsumerConfig, CorrelationConfig, IndexConfig, LoggingConfig, StoreBackend,
    StoreConfig,
};
pub use document::{SearchDocument, WORK_ORDER_FIELD};
pub use event::{CiEvent, InboundMessage, NEW_CI_TAG};
pub use work_order::{NOISY_PAYLOAD_KEYS, WorkOrderCi, WorkOrderRecord};
