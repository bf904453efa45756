use crate::matcher::MatchRule;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ─── Scalar aliases ───────────────────────────────────────────

/// Opaque user identifier — just a key, no behavior.
pub type UserId = String;

/// Module identifier.
pub type ModuleId = String;

/// Instruction identifier.
pub type InstructionId = String;

// ─── Cursor ───────────────────────────────────────────────────

/// A position in the dialogue graph: which module, which instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub module_id: ModuleId,
    pub instruction_id: InstructionId,
}

impl Cursor {
    pub fn new(module_id: impl Into<ModuleId>, instruction_id: impl Into<InstructionId>) -> Self {
        Self {
            module_id: module_id.into(),
            instruction_id: instruction_id.into(),
        }
    }
}

// ─── Dialogue state ───────────────────────────────────────────

/// The persisted per-user cursor. `PartialEq` because the conditional
/// write compares against the state read at turn start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueState {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub instruction_id: InstructionId,
}

impl DialogueState {
    pub fn at(user_id: impl Into<UserId>, cursor: &Cursor) -> Self {
        Self {
            user_id: user_id.into(),
            module_id: cursor.module_id.clone(),
            instruction_id: cursor.instruction_id.clone(),
        }
    }

    pub fn cursor(&self) -> Cursor {
        Cursor {
            module_id: self.module_id.clone(),
            instruction_id: self.instruction_id.clone(),
        }
    }
}

// ─── Behavior capabilities ────────────────────────────────────

/// Side effect invoked when the expected instruction accepts a message
/// (capture the user's answer, write it somewhere downstream).
#[async_trait]
pub trait Fulfilment: Send + Sync {
    async fn fulfil(&self, user_id: &str, message: &str) -> Result<()>;
}

/// Fulfilment that does nothing. The default for instructions whose
/// answers nothing downstream consumes.
pub struct NoopFulfilment;

#[async_trait]
impl Fulfilment for NoopFulfilment {
    async fn fulfil(&self, _user_id: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Adapter for plain closures, handy when binding answer-capture
/// callbacks without a dedicated type.
pub struct FnFulfilment<F>(pub F);

#[async_trait]
impl<F> Fulfilment for FnFulfilment<F>
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    async fn fulfil(&self, user_id: &str, message: &str) -> Result<()> {
        (self.0)(user_id, message)
    }
}

/// Side effect fired when a user exits a module. The engine guarantees
/// at most one invocation per committed module transition.
#[async_trait]
pub trait CompletionHook: Send + Sync {
    async fn on_complete(&self, user_id: &str) -> Result<()>;
}

// ─── Descriptors ──────────────────────────────────────────────

/// A single expected exchange within a module: the matcher deciding
/// whether an incoming message is the awaited answer, and the
/// fulfilment side effect to run when it is.
pub struct Instruction {
    pub instruction_id: InstructionId,
    /// Back-reference by id, resolved through the registry at call time.
    pub module_id: ModuleId,
    pub matcher: MatchRule,
    pub fulfilment: Arc<dyn Fulfilment>,
}

impl Instruction {
    pub fn new(
        instruction_id: impl Into<InstructionId>,
        module_id: impl Into<ModuleId>,
        matcher: MatchRule,
    ) -> Self {
        Self {
            instruction_id: instruction_id.into(),
            module_id: module_id.into(),
            matcher,
            fulfilment: Arc::new(NoopFulfilment),
        }
    }

    #[must_use]
    pub fn with_fulfilment(mut self, fulfilment: Arc<dyn Fulfilment>) -> Self {
        self.fulfilment = fulfilment;
        self
    }
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruction")
            .field("instruction_id", &self.instruction_id)
            .field("module_id", &self.module_id)
            .field("matcher", &self.matcher)
            .finish_non_exhaustive()
    }
}

/// An ordered group of instructions representing one phase of the
/// scripted dialogue. `next_module: None` marks a terminal module: the
/// successor function then returns the module's own id and no
/// completion hook fires on wrap-around.
pub struct Module {
    pub module_id: ModuleId,
    /// Non-empty; the sequence order is the only valid advancement path.
    pub instruction_ids: Vec<InstructionId>,
    pub next_module: Option<ModuleId>,
    pub on_complete: Option<Arc<dyn CompletionHook>>,
}

impl Module {
    pub fn new(module_id: impl Into<ModuleId>, instruction_ids: Vec<InstructionId>) -> Self {
        Self {
            module_id: module_id.into(),
            instruction_ids,
            next_module: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn with_next(mut self, next: impl Into<ModuleId>) -> Self {
        self.next_module = Some(next.into());
        self
    }

    #[must_use]
    pub fn with_on_complete(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.on_complete = Some(hook);
        self
    }

    pub fn contains(&self, instruction_id: &str) -> bool {
        self.instruction_ids.iter().any(|i| i == instruction_id)
    }

    /// The instruction immediately following `instruction_id` in this
    /// module's order, or `None` if it is the last (or not a member).
    pub fn successor(&self, instruction_id: &str) -> Option<&InstructionId> {
        let pos = self.instruction_ids.iter().position(|i| i == instruction_id)?;
        self.instruction_ids.get(pos + 1)
    }

    pub fn first_instruction_id(&self) -> Option<&InstructionId> {
        self.instruction_ids.first()
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("module_id", &self.module_id)
            .field("instruction_ids", &self.instruction_ids)
            .field("next_module", &self.next_module)
            .field("has_on_complete", &self.on_complete.is_some())
            .finish()
    }
}
