// src/pipeline/dispatch.rs

//! Per-event processing: parse, classify, correlate, write.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::{CiEvent, CiRecord, Config, InboundMessage, IndexConfig, SearchDocument};
use crate::pipeline::classify::{SideEffect, classify};
use crate::pipeline::{Correlator, IndexWriter, WorkOrderSource};
use crate::services::{CiProcessor, CiTransformer};
use crate::storage::IndexStore;

/// Collaborators the dispatcher hands work to.
#[derive(Clone)]
pub struct DispatchContext {
    pub store: Arc<dyn IndexStore>,
    pub transformer: Arc<dyn CiTransformer>,
    /// Receives successful `manifest.Environment` plan generations
    pub plan_processor: Arc<dyn CiProcessor>,
    /// Receives policy CIs
    pub policy_processor: Arc<dyn CiProcessor>,
}

/// What happened to a single event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub ci_id: i64,
    pub class_name: String,
    pub side_effect: Option<SideEffect>,
    /// `None` when the record is not a deployed instance
    pub work_order: Option<WorkOrderSource>,
    /// Primary write attempts used (1 or 2)
    pub write_attempts: u32,
}

/// Routes CI events to processors and keeps the CI index in sync.
pub struct Dispatcher {
    context: DispatchContext,
    index: IndexConfig,
    correlator: Correlator,
    writer: IndexWriter,
}

impl Dispatcher {
    pub fn new(context: DispatchContext, config: &Config) -> Self {
        let correlator = Correlator::new(
            Arc::clone(&context.store),
            config.index.document_kind.clone(),
            &config.correlation,
        );
        let writer = IndexWriter::new(Arc::clone(&context.store));

        Self {
            context,
            index: config.index.clone(),
            correlator,
            writer,
        }
    }

    /// Process one event end to end.
    ///
    /// Fails only when the payload cannot be turned into a record or the
    /// primary write fails twice. Enrichment problems degrade the document
    /// instead. `cancel` aborts a pending correlation wait, after which the
    /// unenriched document is still written.
    pub async fn process_message(
        &self,
        message: &InboundMessage,
        cancel: &CancellationToken,
    ) -> Result<ProcessOutcome> {
        let record = self.parse(message)?;
        log::debug!(
            "msg {}: ci {} ({})",
            message.id,
            record.ci_id,
            record.ci_class_name
        );

        self.index_event(&message.id, &record).await;

        let classification = classify(&record);
        if let Some(effect) = classification.side_effect {
            self.run_side_effect(effect, &record).await;
        }

        let (body, work_order) = self
            .build_body(&message.id, &record, classification.correlate, cancel)
            .await?;

        let write_attempts = self
            .writer
            .write(&self.index.document_kind, &record.document_id(), &body)
            .await?;

        Ok(ProcessOutcome {
            ci_id: record.ci_id,
            class_name: record.ci_class_name,
            side_effect: classification.side_effect,
            work_order,
            write_attempts,
        })
    }

    fn parse(&self, message: &InboundMessage) -> Result<CiRecord> {
        match CiEvent::parse(&message.msg_type, &message.payload)? {
            CiEvent::New(record) => Ok(record),
            CiEvent::Generic(ci) => self.context.transformer.simplify(ci),
        }
    }

    /// Best-effort write of the bare record to the event channel.
    async fn index_event(&self, msg_id: &str, record: &CiRecord) {
        let result = match serde_json::to_string(record) {
            Ok(body) => {
                self.context
                    .store
                    .index_event(&self.index.event_channel, &body)
                    .await
            }
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            log::warn!(
                "msg {}: event projection for ci {} not indexed: {}",
                msg_id,
                record.ci_id,
                e
            );
        }
    }

    async fn run_side_effect(&self, effect: SideEffect, record: &CiRecord) {
        let processor = match effect {
            SideEffect::DeploymentPlan => &self.context.plan_processor,
            SideEffect::Policy => &self.context.policy_processor,
        };
        if let Err(e) = processor.process(record).await {
            log::error!(
                "{} failed for ci {}: {}",
                processor.name(),
                record.ci_id,
                e
            );
        }
    }

    /// Serialized document body, correlated when `correlate` is set.
    async fn build_body(
        &self,
        msg_id: &str,
        record: &CiRecord,
        correlate: bool,
        cancel: &CancellationToken,
    ) -> Result<(String, Option<WorkOrderSource>)> {
        if correlate {
            match self.correlated_body(record.clone(), cancel).await {
                Ok((body, source)) => return Ok((body, Some(source))),
                Err(e) => log::warn!(
                    "msg {}: correlation for ci {} failed, indexing without work order: {}",
                    msg_id,
                    record.ci_id,
                    e
                ),
            }
        }

        let body = SearchDocument::bare(record.clone()).to_json()?;
        Ok((body, correlate.then_some(WorkOrderSource::Missing)))
    }

    async fn correlated_body(
        &self,
        record: CiRecord,
        cancel: &CancellationToken,
    ) -> Result<(String, WorkOrderSource)> {
        let correlation = self.correlator.correlate(record, cancel).await?;
        Ok((correlation.document.to_json()?, correlation.source))
    }
}
