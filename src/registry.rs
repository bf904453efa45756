//! Read-mostly id → descriptor lookups, loaded once at process start and
//! immutable afterwards. All cross-references in the dialogue graph are
//! resolved through these registries at call time; a reload swaps the
//! whole structure atomically (build a new registry, swap the `Arc`),
//! never edits in place.

use crate::types::{Instruction, InstructionId, Module, ModuleId};
use std::collections::HashMap;
use std::sync::Arc;

// ── Instruction registry ──

pub struct InstructionRegistry {
    by_id: HashMap<InstructionId, Arc<Instruction>>,
}

impl InstructionRegistry {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        let by_id = instructions
            .into_iter()
            .map(|i| (i.instruction_id.clone(), Arc::new(i)))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, instruction_id: &str) -> Option<Arc<Instruction>> {
        self.by_id.get(instruction_id).cloned()
    }

    pub fn contains(&self, instruction_id: &str) -> bool {
        self.by_id.contains_key(instruction_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

// ── Module registry ──

pub struct ModuleRegistry {
    by_id: HashMap<ModuleId, Arc<Module>>,
}

impl ModuleRegistry {
    pub fn new(modules: Vec<Module>) -> Self {
        let by_id = modules
            .into_iter()
            .map(|m| (m.module_id.clone(), Arc::new(m)))
            .collect();
        Self { by_id }
    }

    pub fn get(&self, module_id: &str) -> Option<Arc<Module>> {
        self.by_id.get(module_id).cloned()
    }

    /// The instruction immediately following `instruction_id` within
    /// `module_id`, or `None` if it is the last one (or unknown).
    pub fn successor_instruction(
        &self,
        module_id: &str,
        instruction_id: &str,
    ) -> Option<InstructionId> {
        self.by_id
            .get(module_id)
            .and_then(|m| m.successor(instruction_id))
            .cloned()
    }

    /// Successor module. Terminal modules (no configured successor)
    /// yield their own id, so the successor function stays total and
    /// the engine's hook-on-change rule naturally suppresses the
    /// completion hook. `None` only for an unknown module id.
    pub fn next_module_id(&self, module_id: &str) -> Option<ModuleId> {
        let module = self.by_id.get(module_id)?;
        Some(
            module
                .next_module
                .clone()
                .unwrap_or_else(|| module.module_id.clone()),
        )
    }

    pub fn first_instruction_id(&self, module_id: &str) -> Option<InstructionId> {
        self.by_id
            .get(module_id)
            .and_then(|m| m.first_instruction_id())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
