//! Intent routing — the fallback path for free-form input.
//!
//! Consulted only when the expected instruction does not match. The
//! router is deterministic: identical input always yields the same
//! intent, and candidate ordering is total (score, then priority, then
//! id), so tests are reproducible.

use crate::types::InstructionId;
use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// Effect run when an intent wins the fallback: resolves which
/// instruction to present. May touch external systems; the engine
/// treats it as opaque and performs no state write of its own on this
/// path.
#[async_trait]
pub trait IntentAction: Send + Sync {
    async fn fulfil(&self, user_id: &str) -> Result<InstructionId>;
}

/// Action that always resolves to a fixed instruction — the common
/// config-declared case ("help" → "help_response").
pub struct StaticIntentAction(pub InstructionId);

#[async_trait]
impl IntentAction for StaticIntentAction {
    async fn fulfil(&self, _user_id: &str) -> Result<InstructionId> {
        Ok(self.0.clone())
    }
}

/// A free-form-text classifier entry: phrases match whole (normalized)
/// messages, keywords match anywhere in them.
pub struct Intent {
    pub intent_id: String,
    pub phrases: Vec<String>,
    pub keywords: Vec<String>,
    /// Higher wins among equal scores.
    pub priority: i32,
    pub action: Arc<dyn IntentAction>,
}

impl std::fmt::Debug for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intent")
            .field("intent_id", &self.intent_id)
            .field("phrases", &self.phrases)
            .field("keywords", &self.keywords)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Best-match lookup over the loaded intents. Implementations must be
/// deterministic for identical input and total in their tie-break.
#[async_trait]
pub trait IntentRouter: Send + Sync {
    async fn best_match(&self, message: &str) -> Result<Option<Arc<Intent>>>;
}

/// Keyword/phrase router.
///
/// Pipeline per lookup:
/// 1. normalize — trim, lowercase, strip punctuation
/// 2. exact phrase match → immediate winner
/// 3. keyword hit count scoring, ordered by (score, priority, id)
pub struct KeywordIntentRouter {
    intents: Vec<Arc<Intent>>,
    sanitize: Regex,
}

impl KeywordIntentRouter {
    pub fn new(intents: Vec<Arc<Intent>>) -> Self {
        let mut intents = intents;
        // Pre-sort by (priority desc, id asc) so phrase hits and score
        // ties resolve without a second pass.
        intents.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.intent_id.cmp(&b.intent_id))
        });
        Self {
            intents,
            sanitize: Regex::new(r"[^a-z0-9\s]").expect("static pattern"),
        }
    }

    fn normalize(&self, text: &str) -> String {
        let lowered = text.trim().to_lowercase();
        self.sanitize.replace_all(&lowered, "").trim().to_string()
    }

    fn keyword_score(&self, normalized: &str, intent: &Intent) -> usize {
        intent
            .keywords
            .iter()
            .filter(|k| {
                let k = self.normalize(k);
                !k.is_empty() && normalized.contains(&k)
            })
            .count()
    }
}

#[async_trait]
impl IntentRouter for KeywordIntentRouter {
    async fn best_match(&self, message: &str) -> Result<Option<Arc<Intent>>> {
        let normalized = self.normalize(message);
        if normalized.is_empty() {
            return Ok(None);
        }

        // Exact phrase match first.
        for intent in &self.intents {
            if intent
                .phrases
                .iter()
                .any(|p| self.normalize(p) == normalized)
            {
                debug!(intent_id = %intent.intent_id, "phrase match");
                return Ok(Some(intent.clone()));
            }
        }

        // Keyword scoring; manual scan so the pre-sorted order, not
        // max_by_key's last-wins tie-break, decides equal scores.
        let mut best: Option<(usize, &Arc<Intent>)> = None;
        for intent in &self.intents {
            let score = self.keyword_score(&normalized, intent);
            if score == 0 {
                continue;
            }
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, intent)),
            }
        }

        if let Some((score, intent)) = best {
            debug!(intent_id = %intent.intent_id, score, "keyword match");
            return Ok(Some(intent.clone()));
        }

        debug!(message = %normalized, "no intent matched");
        Ok(None)
    }
}
