use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ── Top-level DTO ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraphDto {
    pub id: String,
    #[serde(default)]
    pub meta: Option<FlowMeta>,
    /// Module whose first instruction seeds first-contact state.
    pub entry_module: String,
    /// Returned when neither the expected instruction nor any intent
    /// matches.
    pub fallback_instruction: String,
    pub modules: Vec<ModuleDto>,
    #[serde(default)]
    pub intents: Vec<IntentDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowMeta {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

// ── Module / Instruction ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDto {
    pub id: String,
    /// Successor module; omitted for a terminal module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub instructions: Vec<InstructionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstructionDto {
    pub id: String,
    #[serde(rename = "match")]
    pub rule: MatchRuleDto,
}

/// Config-declared matcher variants. Programmatic matchers are bound
/// in code at build time, not declared here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchRuleDto {
    Any,
    Exact {
        value: String,
        #[serde(default)]
        case_sensitive: bool,
    },
    Keyword {
        any_of: Vec<String>,
    },
    Regex {
        pattern: String,
    },
}

// ── Intent ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDto {
    pub id: String,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    /// Instruction the intent resolves to. Omitted only when a custom
    /// action is bound in code at build time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub respond: Option<String>,
}

// ── Helpers ──

impl FlowGraphDto {
    /// Deterministic JSON: clone, sort modules and intents by id
    /// (instruction order inside a module is semantic and preserved),
    /// serialize to pretty JSON.
    pub fn deterministic_json(&self) -> String {
        let mut dto = self.clone();
        dto.modules.sort_by(|a, b| a.id.cmp(&b.id));
        dto.intents.sort_by(|a, b| a.id.cmp(&b.id));
        serde_json::to_string_pretty(&dto).unwrap_or_default()
    }

    /// SHA-256 over the deterministic JSON — identifies a loaded flow
    /// for whole-structure atomic reload.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.deterministic_json().as_bytes());
        hasher.finalize().into()
    }
}
