//! Agent wire protocol (§6): JSON frames exchanged over the persistent
//! bidirectional socket between this backend and a connected coding agent.
//!
//! Each frame on the wire is `{ id, type, payload }`; `id` is opaque to the
//! agent and only used for correlating acks, so it is modeled as a bare
//! string rather than given meaning here. Unknown frame types deserialize
//! into [`AgentFrame::Unknown`] rather than failing, per "unknown frame
//! types are logged and ignored."

use serde::{Deserialize, Serialize};

use crate::ids::ProcessedMessageId;

/// Frames sent from this backend to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OutboundFrame {
    #[serde(rename_all = "camelCase")]
    StartConversation {
        job_id: String,
        message: String,
        processed_message_id: ProcessedMessageId,
        message_link: String,
    },
    #[serde(rename_all = "camelCase")]
    UserMessage {
        job_id: String,
        message: String,
        processed_message_id: ProcessedMessageId,
        message_link: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireFrame<T> {
    pub id: String,
    #[serde(flatten)]
    pub frame: T,
}

impl OutboundFrame {
    pub fn into_wire(self, id: impl Into<String>) -> WireFrame<OutboundFrame> {
        WireFrame {
            id: id.into(),
            frame: self,
        }
    }
}

/// Frames received from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AgentFrame {
    #[serde(rename_all = "camelCase")]
    Processing { processed_message_id: String },
    #[serde(rename_all = "camelCase")]
    AssistantMessage {
        job_id: String,
        message: String,
        processed_message_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SystemMessage { job_id: String, message: String },
    #[serde(rename_all = "camelCase")]
    JobComplete { job_id: String, reason: String },
    /// Anything not in the known set; logged and ignored by the orchestrator.
    #[serde(other)]
    Unknown,
}

/// Prefix identifying an agent-reported failure (§4.5.5, §4.6.3, §7).
pub const AGENT_ERROR_PREFIX: &str = "ccagent encountered error:";

impl AgentFrame {
    pub fn is_agent_failure_system_message(&self) -> bool {
        matches!(self, AgentFrame::SystemMessage { message, .. } if message.starts_with(AGENT_ERROR_PREFIX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_frame_type_deserializes_without_error() {
        let raw = r#"{"id":"1","type":"somethingElse","payload":{}}"#;
        let frame: AgentFrame = serde_json::from_str(raw).unwrap();
        assert!(matches!(frame, AgentFrame::Unknown));
    }

    #[test]
    fn system_message_detects_agent_failure_prefix() {
        let frame = AgentFrame::SystemMessage {
            job_id: "j_1".into(),
            message: "ccagent encountered error: boom".into(),
        };
        assert!(frame.is_agent_failure_system_message());

        let frame = AgentFrame::SystemMessage {
            job_id: "j_1".into(),
            message: "just an fyi".into(),
        };
        assert!(!frame.is_agent_failure_system_message());
    }

    #[test]
    fn outbound_frame_round_trips_through_wire_envelope() {
        let outbound = OutboundFrame::StartConversation {
            job_id: "j_1".into(),
            message: "do X".into(),
            processed_message_id: ProcessedMessageId::new(),
            message_link: "https://example.com/p/1".into(),
        };
        let wire = outbound.into_wire("frame-1");
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("\"type\":\"startConversation\""));
    }
}
