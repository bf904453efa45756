use crate::events::TurnEvent;
use crate::types::DialogueState;
use anyhow::Result;
use async_trait::async_trait;

/// Persistence contract for the per-user cursor and the turn audit log.
/// The engine operates exclusively through this trait, enabling
/// pluggable backends (memory for tests and POC, SQL for production).
///
/// The store is the only resource requiring per-key mutual exclusion,
/// enforced via the compare-and-swap contract rather than locks: a
/// losing turn retries from a fresh read instead of clobbering the
/// winner's update.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current cursor for the user, or `None` before first contact.
    async fn load(&self, user_id: &str) -> Result<Option<DialogueState>>;

    /// Conditional write: applies `next` only if the stored state still
    /// equals `expected`. `expected: None` means insert-if-absent, which
    /// makes first-contact initialization race-safe. Returns `false` on
    /// a stale read; the caller re-reads and retries.
    async fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&DialogueState>,
        next: &DialogueState,
    ) -> Result<bool>;

    // ── Event log (append-only) ──

    /// Append an event and return its sequence number.
    async fn append_event(&self, user_id: &str, event: &TurnEvent) -> Result<u64>;

    async fn read_events(&self, user_id: &str, from_seq: u64) -> Result<Vec<(u64, TurnEvent)>>;
}
