//! DTO → runtime registries.
//!
//! YAML declares the graph and the matcher rules; behaviors that are
//! code (fulfilment actions, completion hooks, custom matchers, intent
//! actions) are bound here by id, then the validated whole becomes the
//! immutable registries the engine runs against.

use super::dto::{FlowGraphDto, MatchRuleDto};
use super::validate::validate_dto;
use crate::engine::DialogueEngine;
use crate::intent::{Intent, IntentAction, IntentRouter, KeywordIntentRouter, StaticIntentAction};
use crate::matcher::{MatchRule, MessageMatcher};
use crate::registry::{InstructionRegistry, ModuleRegistry};
use crate::store::StateStore;
use crate::types::{CompletionHook, Cursor, Fulfilment, Instruction, Module};
use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Code-side bindings for behaviors YAML cannot express.
#[derive(Default)]
pub struct FlowBehaviors {
    fulfilments: HashMap<String, Arc<dyn Fulfilment>>,
    hooks: HashMap<String, Arc<dyn CompletionHook>>,
    intent_actions: HashMap<String, Arc<dyn IntentAction>>,
    matchers: HashMap<String, Arc<dyn MessageMatcher>>,
}

impl FlowBehaviors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the fulfilment side effect for an instruction. Unbound
    /// instructions get a no-op fulfilment.
    #[must_use]
    pub fn with_fulfilment(
        mut self,
        instruction_id: impl Into<String>,
        fulfilment: Arc<dyn Fulfilment>,
    ) -> Self {
        self.fulfilments.insert(instruction_id.into(), fulfilment);
        self
    }

    #[must_use]
    pub fn with_completion_hook(
        mut self,
        module_id: impl Into<String>,
        hook: Arc<dyn CompletionHook>,
    ) -> Self {
        self.hooks.insert(module_id.into(), hook);
        self
    }

    /// Bind a custom intent action; overrides the intent's `respond`
    /// target if both are present.
    #[must_use]
    pub fn with_intent_action(
        mut self,
        intent_id: impl Into<String>,
        action: Arc<dyn IntentAction>,
    ) -> Self {
        self.intent_actions.insert(intent_id.into(), action);
        self
    }

    /// Bind a programmatic matcher; overrides the instruction's
    /// declared rule.
    #[must_use]
    pub fn with_matcher(
        mut self,
        instruction_id: impl Into<String>,
        matcher: Arc<dyn MessageMatcher>,
    ) -> Self {
        self.matchers.insert(instruction_id.into(), matcher);
        self
    }
}

/// The runtime artifact: everything the engine needs, immutable.
pub struct BuiltFlow {
    pub instructions: Arc<InstructionRegistry>,
    pub modules: Arc<ModuleRegistry>,
    pub intents: Vec<Arc<Intent>>,
    pub entry: Cursor,
    pub fallback_instruction_id: String,
    /// SHA-256 of the flow's deterministic JSON.
    pub fingerprint: [u8; 32],
}

impl std::fmt::Debug for BuiltFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltFlow")
            .field("instructions", &self.instructions.len())
            .field("intents", &self.intents.len())
            .field("entry", &self.entry)
            .field("fallback_instruction_id", &self.fallback_instruction_id)
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl BuiltFlow {
    /// Wire the flow to a store, with the keyword router over the
    /// flow's intents.
    pub fn engine(&self, store: Arc<dyn StateStore>) -> DialogueEngine {
        let router: Arc<dyn IntentRouter> =
            Arc::new(KeywordIntentRouter::new(self.intents.clone()));
        DialogueEngine::new(
            self.instructions.clone(),
            self.modules.clone(),
            router,
            store,
            self.entry.clone(),
            self.fallback_instruction_id.clone(),
        )
    }
}

/// Validate the DTO and construct the registries, consuming the
/// behavior bindings. All validation errors are reported together;
/// bindings that name unknown ids are rejected as well (typo guard).
pub fn build_flow(dto: &FlowGraphDto, behaviors: FlowBehaviors) -> Result<BuiltFlow> {
    let errors = validate_dto(dto);
    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        bail!("invalid flow '{}': {joined}", dto.id);
    }

    let FlowBehaviors {
        mut fulfilments,
        mut hooks,
        mut intent_actions,
        mut matchers,
    } = behaviors;

    let mut instructions = Vec::new();
    let mut modules = Vec::new();

    for module_dto in &dto.modules {
        let mut module = Module::new(
            module_dto.id.clone(),
            module_dto
                .instructions
                .iter()
                .map(|i| i.id.clone())
                .collect(),
        );
        if let Some(next) = &module_dto.next {
            module = module.with_next(next.clone());
        }
        if let Some(hook) = hooks.remove(&module_dto.id) {
            module = module.with_on_complete(hook);
        }
        modules.push(module);

        for instruction_dto in &module_dto.instructions {
            let rule = match matchers.remove(&instruction_dto.id) {
                Some(custom) => MatchRule::Custom(custom),
                None => compile_rule(&instruction_dto.rule)?,
            };
            let mut instruction =
                Instruction::new(instruction_dto.id.clone(), module_dto.id.clone(), rule);
            if let Some(fulfilment) = fulfilments.remove(&instruction_dto.id) {
                instruction = instruction.with_fulfilment(fulfilment);
            }
            instructions.push(instruction);
        }
    }

    let mut intents = Vec::new();
    for intent_dto in &dto.intents {
        let action: Arc<dyn IntentAction> = match intent_actions.remove(&intent_dto.id) {
            Some(action) => action,
            None => match &intent_dto.respond {
                Some(target) => Arc::new(StaticIntentAction(target.clone())),
                None => bail!(
                    "intent '{}' has no respond target and no bound action",
                    intent_dto.id
                ),
            },
        };
        intents.push(Arc::new(Intent {
            intent_id: intent_dto.id.clone(),
            phrases: intent_dto.phrases.clone(),
            keywords: intent_dto.keywords.clone(),
            priority: intent_dto.priority,
            action,
        }));
    }

    // Leftover bindings name ids the flow does not declare.
    if let Some(id) = fulfilments.keys().next() {
        bail!("fulfilment bound to unknown instruction '{id}'");
    }
    if let Some(id) = hooks.keys().next() {
        bail!("completion hook bound to unknown module '{id}'");
    }
    if let Some(id) = intent_actions.keys().next() {
        bail!("action bound to unknown intent '{id}'");
    }
    if let Some(id) = matchers.keys().next() {
        bail!("matcher bound to unknown instruction '{id}'");
    }

    // V2 + V5 guarantee the entry module and its first instruction.
    let entry_module = dto
        .modules
        .iter()
        .find(|m| m.id == dto.entry_module)
        .ok_or_else(|| anyhow::anyhow!("entry module '{}' not found", dto.entry_module))?;
    let entry_instruction = entry_module
        .instructions
        .first()
        .ok_or_else(|| anyhow::anyhow!("entry module '{}' is empty", entry_module.id))?;
    let entry = Cursor::new(entry_module.id.clone(), entry_instruction.id.clone());

    Ok(BuiltFlow {
        instructions: Arc::new(InstructionRegistry::new(instructions)),
        modules: Arc::new(ModuleRegistry::new(modules)),
        intents,
        entry,
        fallback_instruction_id: dto.fallback_instruction.clone(),
        fingerprint: dto.fingerprint(),
    })
}

fn compile_rule(dto: &MatchRuleDto) -> Result<MatchRule> {
    Ok(match dto {
        MatchRuleDto::Any => MatchRule::Any,
        MatchRuleDto::Exact {
            value,
            case_sensitive,
        } => MatchRule::Exact {
            value: value.clone(),
            case_sensitive: *case_sensitive,
        },
        MatchRuleDto::Keyword { any_of } => MatchRule::Keyword {
            any_of: any_of.clone(),
        },
        MatchRuleDto::Regex { pattern } => MatchRule::regex(pattern)?,
    })
}
