// src/models/event.rs

//! Inbound CI change events.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::{CiRecord, CmsCi};

/// Type tag of events whose payload already is a simplified record.
pub const NEW_CI_TAG: &str = "cm_ci_new";

/// A CI event decoded according to its type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum CiEvent {
    /// Already-simplified record (`cm_ci_new`)
    New(CiRecord),
    /// Generic CMS CI that still needs simplification
    Generic(CmsCi),
}

impl CiEvent {
    /// Decode a payload using the shape selected by `msg_type`.
    pub fn parse(msg_type: &str, payload: &str) -> Result<Self> {
        let event = if msg_type == NEW_CI_TAG {
            serde_json::from_str(payload).map(CiEvent::New)
        } else {
            serde_json::from_str(payload).map(CiEvent::Generic)
        };
        event.map_err(|e| AppError::parse(msg_type, e))
    }
}

/// A message as handed over by the bus subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Opaque bus message id, used for logging only
    pub id: String,
    pub msg_type: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(
        id: impl Into<String>,
        msg_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            msg_type: msg_type.into(),
            payload: payload.into(),
        }
    }

    /// Parse one line of a replay file.
    ///
    /// The payload may be given either as a JSON string or inline as an object.
    pub fn from_envelope_line(line: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(line)?;
        let payload = match envelope.payload {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Self {
            id: envelope.msg_id,
            msg_type: envelope.msg_type,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "msgId", default)]
    msg_id: String,
    #[serde(rename = "type")]
    msg_type: String,
    payload: Value,
}
