// src/pipeline/replay.rs

//! Batch consumer: feeds captured bus messages through the dispatcher.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::models::InboundMessage;
use crate::pipeline::{Dispatcher, WorkOrderSource};

/// Summary of a replay run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub total: usize,
    /// Lines that could not be read as a message envelope
    pub invalid: usize,
    pub written: usize,
    pub failed: usize,
    /// Deployed instances with a freshly looked up work order
    pub fresh: usize,
    /// Deployed instances that reused the stored work order
    pub previous: usize,
    /// Deployed instances written without a work order
    pub missing: usize,
}

/// Messages parsed from a replay file, plus the number of unreadable lines.
pub async fn load_messages(path: &Path) -> Result<(Vec<InboundMessage>, usize)> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_messages(&content))
}

/// Parse JSON-lines envelopes, skipping blank lines.
pub fn parse_messages(content: &str) -> (Vec<InboundMessage>, usize) {
    let mut messages = Vec::new();
    let mut invalid = 0;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match InboundMessage::from_envelope_line(line) {
            Ok(message) => messages.push(message),
            Err(e) => {
                invalid += 1;
                log::warn!("Skipping line {}: {}", index + 1, e);
            }
        }
    }

    (messages, invalid)
}

/// Process messages with at most `max_concurrent` in flight.
///
/// Per-message failures are logged and counted; the run itself never fails.
pub async fn run_replay(
    dispatcher: &Dispatcher,
    messages: Vec<InboundMessage>,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> ReplayOutcome {
    let mut outcome = ReplayOutcome {
        total: messages.len(),
        ..ReplayOutcome::default()
    };

    let mut results = stream::iter(messages)
        .map(|message| async move {
            let result = dispatcher.process_message(&message, cancel).await;
            (message, result)
        })
        .buffer_unordered(max_concurrent.max(1));

    while let Some((message, result)) = results.next().await {
        match result {
            Ok(processed) => {
                outcome.written += 1;
                match processed.work_order {
                    Some(WorkOrderSource::Fresh { .. }) => outcome.fresh += 1,
                    Some(WorkOrderSource::Previous) => outcome.previous += 1,
                    Some(WorkOrderSource::Missing) => outcome.missing += 1,
                    None => {}
                }
            }
            Err(e) => {
                outcome.failed += 1;
                log::error!("msg {} ({}) failed: {}", message.id, message.msg_type, e);
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::models::Config;
    use crate::pipeline::DispatchContext;
    use crate::services::{DefaultTransformer, LoggingProcessor};
    use crate::storage::{IndexStore, MemoryStore};

    fn dispatcher(store: &Arc<MemoryStore>) -> Dispatcher {
        let context = DispatchContext {
            store: Arc::clone(store) as Arc<dyn IndexStore>,
            transformer: Arc::new(DefaultTransformer::default()),
            plan_processor: Arc::new(LoggingProcessor::new("plan")),
            policy_processor: Arc::new(LoggingProcessor::new("policy")),
        };
        Dispatcher::new(context, &Config::default())
    }

    #[test]
    fn test_parse_messages_counts_invalid_lines() {
        let content = [
            r#"{"msgId": "a", "type": "cm_ci_new", "payload": {"ciId": 1, "ciClassName": "x"}}"#,
            "",
            "not json",
            r#"{"type": "cm_ci", "payload": "{\"ciId\": 2}"}"#,
        ]
        .join("\n");

        let (messages, invalid) = parse_messages(&content);

        assert_eq!(invalid, 1);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "a");
        assert_eq!(messages[1].payload, r#"{"ciId": 2}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_counts_outcomes() {
        let store = Arc::new(MemoryStore::new());
        store.put_work_order(json!({
            "dpmtRecordState": "complete",
            "searchTags": {"responseDequeTS": "2020-01-01T00:00:00.000"},
            "rfcCi": {"ciId": 2}
        }));

        let message = |id: i64, class: &str| {
            let payload = json!({"ciId": id, "ciClassName": class});
            InboundMessage::new(id.to_string(), "cm_ci_new", payload.to_string())
        };
        let messages = vec![
            message(1, "manifest.Compute"),
            message(2, "bom.Compute"),
            message(3, "bom.Compute"),
            InboundMessage::new("4", "cm_ci_new", "{"),
        ];

        let cancel = CancellationToken::new();
        let outcome = run_replay(&dispatcher(&store), messages, 2, &cancel).await;

        assert_eq!(
            outcome,
            ReplayOutcome {
                total: 4,
                invalid: 0,
                written: 3,
                failed: 1,
                fresh: 1,
                previous: 0,
                missing: 1,
            }
        );
        assert!(store.document("ci", "2").unwrap().get("workorder").is_some());
        assert!(store.document("ci", "3").unwrap().get("workorder").is_none());
    }
}
