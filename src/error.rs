use thiserror::Error;

/// Failure taxonomy for a single turn. The engine performs no silent
/// recovery: every variant carries the failing step and the ids involved
/// so the caller can log and alert.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The persisted cursor references an instruction or module the
    /// registries do not know, or an instruction outside its module's
    /// sequence. Indicates a corrupted or stale cursor; never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// The conditional state write lost the optimistic race on every
    /// bounded retry. The caller may resubmit; the turn will re-read.
    #[error("state write conflict for user '{user_id}' after {attempts} attempt(s)")]
    Conflict { user_id: String, attempts: u32 },

    /// A downstream matcher, fulfilment action, completion hook, intent
    /// lookup, or store access failed. The turn aborts without partial
    /// state mutation.
    #[error("collaborator failure at {step}: {source}")]
    Collaborator {
        step: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Malformed input, rejected before any read.
    #[error("invalid input: {0}")]
    Validation(String),
}

impl EngineError {
    pub(crate) fn collaborator(step: &'static str, source: anyhow::Error) -> Self {
        Self::Collaborator { step, source }
    }
}
