use crate::types::{InstructionId, ModuleId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Turn events — the durable audit trail for every user's dialogue.
/// Appended through the state store after a turn's outcome is decided;
/// sequence numbers are assigned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    /// First contact: the cursor was seeded to the entry position.
    StateInitialized {
        turn_id: Uuid,
        module_id: ModuleId,
        instruction_id: InstructionId,
    },
    /// The expected instruction matched and the cursor advanced.
    Advanced {
        turn_id: Uuid,
        from_module: ModuleId,
        from_instruction: InstructionId,
        to_module: ModuleId,
        to_instruction: InstructionId,
    },
    /// The user exited a module; its completion hook ran once.
    ModuleCompleted {
        turn_id: Uuid,
        module_id: ModuleId,
        next_module_id: ModuleId,
    },
    /// Non-match routed to an intent; the cursor was left untouched.
    IntentRouted {
        turn_id: Uuid,
        intent_id: String,
        instruction_id: InstructionId,
    },
    /// Non-match with no intent: the process-wide fallback was returned.
    FallbackReturned {
        turn_id: Uuid,
        instruction_id: InstructionId,
    },
}
