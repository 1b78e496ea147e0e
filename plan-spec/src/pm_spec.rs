//! Output of the product-manager planning stage (spec §4.4), optional.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSpec {
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub typography: String,
    #[serde(default)]
    pub key_interactions: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSpec {
    #[serde(default)]
    pub this_turn: Vec<String>,
    #[serde(default)]
    pub next_turn: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmSpec {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chat_message: String,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub design: DesignSpec,
    #[serde(default)]
    pub scope: ScopeSpec,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl PmSpec {
    /// Spec §4.4: "If the spec is effectively empty (requirements and
    /// scope.this_turn both empty), the request is treated as
    /// conversational-only".
    pub fn is_effectively_empty(&self) -> bool {
        self.requirements.is_empty() && self.scope.this_turn.is_empty()
    }
}
