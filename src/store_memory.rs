use crate::events::TurnEvent;
use crate::store::StateStore;
use crate::types::DialogueState;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory StateStore for testing and POC.
///
/// The compare-and-swap runs under one write lock, so two concurrent
/// turns for the same user can never both observe the same prior state
/// and both commit.
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, DialogueState>>,
    events: RwLock<HashMap<String, Vec<(u64, TurnEvent)>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, user_id: &str) -> Result<Option<DialogueState>> {
        let states = self.states.read().map_err(|e| anyhow!("lock: {e}"))?;
        Ok(states.get(user_id).cloned())
    }

    async fn compare_and_swap(
        &self,
        user_id: &str,
        expected: Option<&DialogueState>,
        next: &DialogueState,
    ) -> Result<bool> {
        let mut states = self.states.write().map_err(|e| anyhow!("lock: {e}"))?;
        let current = states.get(user_id);
        let matches_expected = match (current, expected) {
            (None, None) => true,
            (Some(cur), Some(exp)) => cur == exp,
            _ => false,
        };
        if matches_expected {
            states.insert(user_id.to_string(), next.clone());
        }
        Ok(matches_expected)
    }

    async fn append_event(&self, user_id: &str, event: &TurnEvent) -> Result<u64> {
        let mut events = self.events.write().map_err(|e| anyhow!("lock: {e}"))?;
        let log = events.entry(user_id.to_string()).or_default();
        let seq = log.len() as u64 + 1;
        log.push((seq, event.clone()));
        Ok(seq)
    }

    async fn read_events(&self, user_id: &str, from_seq: u64) -> Result<Vec<(u64, TurnEvent)>> {
        let events = self.events.read().map_err(|e| anyhow!("lock: {e}"))?;
        Ok(events
            .get(user_id)
            .map(|log| {
                log.iter()
                    .filter(|(seq, _)| *seq >= from_seq)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
