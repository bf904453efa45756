use super::dto::{FlowGraphDto, MatchRuleDto};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub rule: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Validate a FlowGraphDto before registry construction. Returns all
/// errors found, not just the first.
pub fn validate_dto(dto: &FlowGraphDto) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // V1: module ids must be unique
    let mut module_ids: HashSet<&str> = HashSet::new();
    for module in &dto.modules {
        if !module_ids.insert(&module.id) {
            errors.push(ValidationError {
                rule: "V1".to_string(),
                message: format!("duplicate module id: {}", module.id),
            });
        }
    }

    // V2: every module has at least one instruction
    for module in &dto.modules {
        if module.instructions.is_empty() {
            errors.push(ValidationError {
                rule: "V2".to_string(),
                message: format!("module {} has no instructions", module.id),
            });
        }
    }

    // V3: instruction ids must be unique across the whole flow (every
    // instruction belongs to exactly one module)
    let mut instruction_owner: HashMap<&str, &str> = HashMap::new();
    for module in &dto.modules {
        for instruction in &module.instructions {
            if let Some(owner) = instruction_owner.insert(&instruction.id, &module.id) {
                errors.push(ValidationError {
                    rule: "V3".to_string(),
                    message: format!(
                        "instruction {} appears in both {} and {}",
                        instruction.id, owner, module.id
                    ),
                });
            }
        }
    }

    // V4: `next` references a known module
    for module in &dto.modules {
        if let Some(next) = &module.next {
            if !dto.modules.iter().any(|m| &m.id == next) {
                errors.push(ValidationError {
                    rule: "V4".to_string(),
                    message: format!("module {}: next '{}' not found", module.id, next),
                });
            }
        }
    }

    // V5: entry module exists
    if !dto.modules.iter().any(|m| m.id == dto.entry_module) {
        errors.push(ValidationError {
            rule: "V5".to_string(),
            message: format!("entry module '{}' not found", dto.entry_module),
        });
    }

    // V6: fallback instruction exists
    if !instruction_owner.contains_key(dto.fallback_instruction.as_str()) {
        errors.push(ValidationError {
            rule: "V6".to_string(),
            message: format!(
                "fallback instruction '{}' not found",
                dto.fallback_instruction
            ),
        });
    }

    // V7: regex patterns compile
    for module in &dto.modules {
        for instruction in &module.instructions {
            if let MatchRuleDto::Regex { pattern } = &instruction.rule {
                if let Err(e) = regex::Regex::new(pattern) {
                    errors.push(ValidationError {
                        rule: "V7".to_string(),
                        message: format!("instruction {}: invalid regex: {e}", instruction.id),
                    });
                }
            }
        }
    }

    // V8: intent ids must be unique
    let mut intent_ids: HashSet<&str> = HashSet::new();
    for intent in &dto.intents {
        if !intent_ids.insert(&intent.id) {
            errors.push(ValidationError {
                rule: "V8".to_string(),
                message: format!("duplicate intent id: {}", intent.id),
            });
        }
    }

    // V9: an intent needs at least one phrase or keyword to ever match
    for intent in &dto.intents {
        if intent.phrases.is_empty() && intent.keywords.is_empty() {
            errors.push(ValidationError {
                rule: "V9".to_string(),
                message: format!("intent {} has neither phrases nor keywords", intent.id),
            });
        }
    }

    // V10: a `respond` target references a known instruction
    for intent in &dto.intents {
        if let Some(respond) = &intent.respond {
            if !instruction_owner.contains_key(respond.as_str()) {
                errors.push(ValidationError {
                    rule: "V10".to_string(),
                    message: format!("intent {}: respond '{}' not found", intent.id, respond),
                });
            }
        }
    }

    errors
}
