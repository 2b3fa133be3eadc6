//! CI event processing pipeline.
//!
//! - `dispatch`: per-event entry point (parse, classify, correlate, write)
//! - `correlate`: bounded work order lookup with stored-document fallback
//! - `replay`: concurrent batch consumer over captured messages

mod backoff;
pub mod classify;
pub mod correlate;
pub mod dispatch;
pub mod replay;
#[cfg(test)]
mod test_support;
mod write;

pub use backoff::Backoff;
pub use classify::{Classification, SideEffect, classify};
pub use correlate::{Correlation, Correlator, WorkOrderSource, prepare_work_order};
pub use dispatch::{DispatchContext, Dispatcher, ProcessOutcome};
pub use replay::{ReplayOutcome, load_messages, parse_messages, run_replay};
pub use write::IndexWriter;
