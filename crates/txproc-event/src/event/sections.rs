//! Typed views of the four event sections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kinds::{Command, EventType};

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Routing header. Always present and always parsed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Kind of event.
    #[serde(default)]
    pub event_type: EventType,
    /// Opaque correlation identifier echoed in replies.
    #[serde(default)]
    pub reference: String,
    /// Routing token; `"0"` asks for a reply on the stream socket.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub return_fd: String,
    /// Queue the event is addressed to.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dest_queue: String,
}

/// Tracing and lifetime metadata.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extended {
    /// Free-form trace log carried along with the event.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace: String,
    /// Timestamp of the last trace entry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace_timestamp: String,
    /// Absolute expiry time in seconds since the epoch.
    #[serde(default, skip_serializing_if = "is_default")]
    pub expiry_time: u64,
    /// Lifetime in seconds.
    #[serde(default, skip_serializing_if = "is_default")]
    pub lifetime: i64,
    /// Number of delivery attempts so far.
    #[serde(default, skip_serializing_if = "is_default")]
    pub retries: i64,
    /// Process id of the worker that handled the event.
    #[serde(default, rename = "wpid", skip_serializing_if = "is_default")]
    pub worker_pid: i64,
}

/// Broker-level parameters: commands, outcomes, and diagnostics.
///
/// `success` is written as the integer `0` or `1` under `bSuccess` and is
/// always present; every other field is omitted when it holds its default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysParams {
    /// Requests parsing of legacy text responses.
    #[serde(default, rename = "bStandardResponse", skip_serializing_if = "is_default")]
    pub standard_response: bool,
    /// Control command for command events.
    #[serde(default, skip_serializing_if = "Command::is_none")]
    pub command: Command,
    /// Target URL for URL events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    /// Script to run for script events.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub script_name: String,
    /// Outcome text, for example `"failed"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    /// Whether the request succeeded.
    #[serde(default, rename = "bSuccess", with = "success_flag")]
    pub success: bool,
    /// Set by the broker when the submitter should wait for a reply.
    #[serde(default, rename = "bExpectReply", skip_serializing_if = "is_default")]
    pub expect_reply: bool,
    /// Human-readable failure description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error_string: String,
    /// Machine-readable failure category.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_cause: String,
    /// Opaque broker parameter.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub system_param: String,
    /// Processing time reported by the worker.
    #[serde(default, skip_serializing_if = "is_default")]
    pub elapsed_time: u64,
    /// Marks events generated by broker recovery.
    #[serde(
        default,
        rename = "bGeneratedRecoveryEvent",
        skip_serializing_if = "is_default"
    )]
    pub generated_recovery: bool,
}

mod success_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Int(i64),
        Bool(bool),
    }

    #[expect(
        clippy::trivially_copy_pass_by_ref,
        reason = "serde passes serialised fields by reference"
    )]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(match Flag::deserialize(deserializer)? {
            Flag::Int(value) => value != 0,
            Flag::Bool(value) => value,
        })
    }
}

/// Execution parameters: named, positional, or none.
///
/// The two populated forms are mutually exclusive. On the wire a positional
/// list is a JSON array and a named map is a JSON object of strings; an empty
/// value occupies zero bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum ExecParams {
    /// No parameters.
    #[default]
    Empty,
    /// Ordered script arguments.
    Positional(Vec<String>),
    /// Name to value mapping.
    Named(BTreeMap<String, String>),
}

impl ExecParams {
    /// Returns true when no parameter is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Positional(values) => values.is_empty(),
            Self::Named(values) => values.is_empty(),
        }
    }

    /// Parses the wire form, choosing the positional form when the payload
    /// starts with `[`.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not a JSON array or object of
    /// strings.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        match bytes.first() {
            None => Ok(Self::Empty),
            Some(b'[') => serde_json::from_slice(bytes).map(Self::Positional),
            Some(_) => serde_json::from_slice(bytes).map(Self::Named),
        }
    }

    /// Renders the wire form. Empty parameters render as zero bytes.
    ///
    /// # Errors
    ///
    /// Returns an error when JSON serialisation fails.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            _ if self.is_empty() => Ok(Vec::new()),
            Self::Positional(values) => serde_json::to_vec(values),
            Self::Named(values) => serde_json::to_vec(values),
            Self::Empty => Ok(Vec::new()),
        }
    }
}
