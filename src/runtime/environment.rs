//! Invocation environment construction.
//!
//! The artifact has no parameter list; it reads its input from
//! [`INPUT_ENV_VAR`]. Activation context is exposed under `__OW_*` names.
//! Every invocation gets a fresh map cloned from the base, which itself is
//! never modified.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{RunnerError, RunnerResult};
use crate::message::RunMessage;

/// Variable carrying the canonically encoded input payload.
pub const INPUT_ENV_VAR: &str = "WHISK_INPUT";

/// Prefix for activation context variables.
pub const CONTEXT_ENV_PREFIX: &str = "__OW_";

pub type InvocationEnvironment = BTreeMap<String, String>;

/// Ambient variables shared by all invocations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseEnvironment {
    vars: BTreeMap<String, String>,
}

impl BaseEnvironment {
    pub fn new(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }

    /// Snapshot of the current process environment.
    pub fn from_process() -> Self {
        Self::new(std::env::vars().collect())
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }

    /// Derive the environment for one invocation.
    pub fn build_environment(&self, request: &RunMessage) -> RunnerResult<InvocationEnvironment> {
        let encoded = encode_payload(request.value.as_ref())?;

        let mut env = self.vars.clone();
        for (field, value) in request.context_fields() {
            if let Some(value) = value {
                env.insert(context_var_name(field), value.to_string());
            }
        }
        env.insert(INPUT_ENV_VAR.to_string(), encoded);
        Ok(env)
    }
}

/// `activation_id` -> `__OW_ACTIVATION_ID`
pub fn context_var_name(field: &str) -> String {
    format!("{}{}", CONTEXT_ENV_PREFIX, field.to_ascii_uppercase())
}

/// Single-line JSON with sorted object keys. Absent payloads encode as `{}`.
pub fn encode_payload(payload: Option<&Value>) -> RunnerResult<String> {
    match payload {
        None => Ok("{}".to_string()),
        Some(value @ Value::Object(_)) => Ok(serde_json::to_string(value)?),
        Some(_) => Err(RunnerError::InvalidPayload),
    }
}
