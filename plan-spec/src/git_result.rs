//! Result of one `git_action` task (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitResultEvent {
    pub id: String,
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl GitResultEvent {
    pub fn ok(id: impl Into<String>, index: usize, command: &str, output: String) -> Self {
        Self {
            id: id.into(),
            index,
            command: Some(command.to_string()),
            output: Some(output),
            error: None,
            action: None,
        }
    }

    /// A security-rejected command (spec §4.7/§8 scenario 7): no subprocess
    /// is ever invoked for these.
    pub fn security_error(id: impl Into<String>, index: usize, command: &str, reason: &str) -> Self {
        Self {
            id: id.into(),
            index,
            command: Some(command.to_string()),
            output: None,
            error: Some(format!("Security Error: {reason}")),
            action: None,
        }
    }
}
