//! Messages exchanged with the driver.
//!
//! The driver owns framing; these are the decoded payloads it hands over.
//! Unknown fields are ignored so container-specific extras pass through.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Entry point used when the init message does not name one.
pub const DEFAULT_ENTRY_POINT: &str = "main";

/// One-time initialization: user source plus optional entry point name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<String>,
}

impl InitMessage {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            main: None,
        }
    }

    pub fn with_main(mut self, main: impl Into<String>) -> Self {
        self.main = Some(main.into());
        self
    }
}

/// Per-call request: input payload plus ambient activation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunMessage {
    /// Absent means no payload; an explicit `null` is kept as `Value::Null`
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl RunMessage {
    pub fn with_value(value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Context fields in the order they are layered onto the environment.
    pub fn context_fields(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("api_key", self.api_key.as_deref()),
            ("namespace", self.namespace.as_deref()),
            ("action_name", self.action_name.as_deref()),
            ("activation_id", self.activation_id.as_deref()),
            ("deadline", self.deadline.as_deref()),
        ]
    }
}

fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Decoded result of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutput {
    /// JSON object printed on the artifact's last stdout line
    pub result: serde_json::Map<String, Value>,
    /// Stdout lines preceding the result line
    pub logs: Vec<String>,
    pub stderr: String,
    pub exit_code: Option<i32>,
}
