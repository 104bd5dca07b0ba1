use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    DvUpdate,
    LsDatabase,
    PvUpdate,
}

/// Wire envelope exchanged between adjacent nodes. The payload is an
/// immutable snapshot owned by the receiver once delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub protocol: String,
    pub kind: MessageKind,
    pub src_node_id: NodeId,
    pub seq: u64,
    #[serde(default)]
    pub payload: BTreeMap<String, Value>,
    pub ts: f64,
}

pub fn encode_message(message: &ProtocolMessage) -> Result<Vec<u8>> {
    serde_json::to_vec(message).context("failed to encode protocol message")
}

pub fn decode_message(data: &[u8]) -> Result<ProtocolMessage> {
    serde_json::from_slice(data).context("failed to decode protocol message")
}
