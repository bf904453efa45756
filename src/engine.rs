//! The turn-processing core.
//!
//! One call per incoming message: match against the expected
//! instruction, advance the cursor, fire the module-completion hook at
//! boundaries, or fall back to intent routing on non-match. The cursor
//! write is conditional on the state read at turn start; a losing turn
//! retries from a fresh read up to a bound.

use crate::error::EngineError;
use crate::events::TurnEvent;
use crate::intent::IntentRouter;
use crate::registry::{InstructionRegistry, ModuleRegistry};
use crate::store::StateStore;
use crate::types::{Cursor, DialogueState, InstructionId};
use std::sync::Arc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

const DEFAULT_WRITE_RETRIES: u32 = 3;

pub struct DialogueEngine {
    instructions: Arc<InstructionRegistry>,
    modules: Arc<ModuleRegistry>,
    router: Arc<dyn IntentRouter>,
    store: Arc<dyn StateStore>,
    /// Where first-contact users start.
    entry: Cursor,
    /// Returned when neither the expected instruction nor any intent
    /// matches.
    fallback_instruction_id: InstructionId,
    write_retries: u32,
}

impl DialogueEngine {
    pub fn new(
        instructions: Arc<InstructionRegistry>,
        modules: Arc<ModuleRegistry>,
        router: Arc<dyn IntentRouter>,
        store: Arc<dyn StateStore>,
        entry: Cursor,
        fallback_instruction_id: impl Into<InstructionId>,
    ) -> Self {
        Self {
            instructions,
            modules,
            router,
            store,
            entry,
            fallback_instruction_id: fallback_instruction_id.into(),
            write_retries: DEFAULT_WRITE_RETRIES,
        }
    }

    /// Override the bounded optimistic-write retry count.
    #[must_use]
    pub fn with_write_retries(mut self, retries: u32) -> Self {
        self.write_retries = retries;
        self
    }

    /// Process one user message and return the id of the next
    /// instruction to present.
    ///
    /// Matching is exclusive: only the current instruction's matcher is
    /// consulted. On non-match the intent router decides, and the
    /// engine mutates no state on that path.
    #[instrument(skip(self, message), fields(user_id = %user_id))]
    pub async fn process_turn(
        &self,
        message: &str,
        user_id: &str,
    ) -> Result<InstructionId, EngineError> {
        if user_id.trim().is_empty() {
            return Err(EngineError::Validation("empty user id".into()));
        }

        let turn_id = Uuid::now_v7();
        let mut attempts = 0u32;

        loop {
            attempts += 1;

            // 1. Read the cursor; first contact derives the entry state
            //    without persisting it yet.
            let prior = self
                .store
                .load(user_id)
                .await
                .map_err(|e| EngineError::collaborator("state load", e))?;
            let first_contact = prior.is_none();
            let state = prior.unwrap_or_else(|| DialogueState::at(user_id, &self.entry));

            // 2. Resolve the expected instruction; a dangling or
            //    out-of-module cursor is corruption, fatal for the turn.
            let instr = self.instructions.get(&state.instruction_id).ok_or_else(|| {
                EngineError::NotFound(format!(
                    "instruction '{}' (cursor of user '{user_id}')",
                    state.instruction_id
                ))
            })?;
            let module = self.modules.get(&state.module_id).ok_or_else(|| {
                EngineError::NotFound(format!(
                    "module '{}' (cursor of user '{user_id}')",
                    state.module_id
                ))
            })?;
            if instr.module_id != state.module_id || !module.contains(&state.instruction_id) {
                return Err(EngineError::NotFound(format!(
                    "instruction '{}' not in module '{}' (cursor of user '{user_id}')",
                    state.instruction_id, state.module_id
                )));
            }

            // 3. Match. Whitespace-only input never matches.
            let matched = if message.trim().is_empty() {
                false
            } else {
                instr
                    .matcher
                    .matches(message)
                    .map_err(|e| EngineError::collaborator("matcher", e))?
            };

            if !matched {
                // 4. Non-match: intent fallback, no cursor mutation.
                return self.route_intent(message, user_id, turn_id).await;
            }

            // 3a. Fulfilment side effect, before any persistence.
            instr
                .fulfilment
                .fulfil(user_id, message)
                .await
                .map_err(|e| EngineError::collaborator("fulfilment", e))?;

            // 3b–3d. Advance within the module, or cross the boundary.
            let mut completed_module = None;
            let next = match self
                .modules
                .successor_instruction(&state.module_id, &state.instruction_id)
            {
                Some(next_instruction) => Cursor::new(state.module_id.clone(), next_instruction),
                None => {
                    let next_module_id =
                        self.modules.next_module_id(&state.module_id).ok_or_else(|| {
                            EngineError::NotFound(format!(
                                "module '{}' (successor lookup)",
                                state.module_id
                            ))
                        })?;
                    if next_module_id != state.module_id {
                        // Hook fires exactly once per transition,
                        // before the state write.
                        if let Some(hook) = module.on_complete.as_ref() {
                            hook.on_complete(user_id)
                                .await
                                .map_err(|e| EngineError::collaborator("completion hook", e))?;
                        }
                        completed_module = Some(state.module_id.clone());
                    }
                    let first = self
                        .modules
                        .first_instruction_id(&next_module_id)
                        .ok_or_else(|| {
                            EngineError::NotFound(format!(
                                "module '{next_module_id}' has no first instruction"
                            ))
                        })?;
                    Cursor::new(next_module_id, first)
                }
            };

            // 3e. Conditional write keyed on the state read in step 1.
            let next_state = DialogueState::at(user_id, &next);
            let expected = if first_contact { None } else { Some(&state) };
            let applied = self
                .store
                .compare_and_swap(user_id, expected, &next_state)
                .await
                .map_err(|e| EngineError::collaborator("state write", e))?;

            if !applied {
                if attempts > self.write_retries {
                    warn!(user_id, attempts, "state write conflict, retries exhausted");
                    return Err(EngineError::Conflict {
                        user_id: user_id.to_string(),
                        attempts,
                    });
                }
                debug!(user_id, attempts, "state write lost the race, retrying");
                continue;
            }

            // Audit trail, post-commit.
            self.log_transition(user_id, turn_id, first_contact, &state, &next, completed_module)
                .await?;

            debug!(
                user_id,
                from = %state.instruction_id,
                to = %next.instruction_id,
                "advanced"
            );
            return Ok(next.instruction_id);
        }
    }

    async fn route_intent(
        &self,
        message: &str,
        user_id: &str,
        turn_id: Uuid,
    ) -> Result<InstructionId, EngineError> {
        let intent = self
            .router
            .best_match(message)
            .await
            .map_err(|e| EngineError::collaborator("intent lookup", e))?;

        match intent {
            Some(intent) => {
                let instruction_id = intent
                    .action
                    .fulfil(user_id)
                    .await
                    .map_err(|e| EngineError::collaborator("intent fulfilment", e))?;
                self.append(
                    user_id,
                    &TurnEvent::IntentRouted {
                        turn_id,
                        intent_id: intent.intent_id.clone(),
                        instruction_id: instruction_id.clone(),
                    },
                )
                .await?;
                debug!(user_id, intent_id = %intent.intent_id, "intent fallback");
                Ok(instruction_id)
            }
            None => {
                self.append(
                    user_id,
                    &TurnEvent::FallbackReturned {
                        turn_id,
                        instruction_id: self.fallback_instruction_id.clone(),
                    },
                )
                .await?;
                debug!(user_id, "no intent, default fallback");
                Ok(self.fallback_instruction_id.clone())
            }
        }
    }

    async fn log_transition(
        &self,
        user_id: &str,
        turn_id: Uuid,
        first_contact: bool,
        from: &DialogueState,
        to: &Cursor,
        completed_module: Option<String>,
    ) -> Result<(), EngineError> {
        if first_contact {
            self.append(
                user_id,
                &TurnEvent::StateInitialized {
                    turn_id,
                    module_id: from.module_id.clone(),
                    instruction_id: from.instruction_id.clone(),
                },
            )
            .await?;
        }
        if let Some(module_id) = completed_module {
            self.append(
                user_id,
                &TurnEvent::ModuleCompleted {
                    turn_id,
                    module_id,
                    next_module_id: to.module_id.clone(),
                },
            )
            .await?;
        }
        self.append(
            user_id,
            &TurnEvent::Advanced {
                turn_id,
                from_module: from.module_id.clone(),
                from_instruction: from.instruction_id.clone(),
                to_module: to.module_id.clone(),
                to_instruction: to.instruction_id.clone(),
            },
        )
        .await
    }

    async fn append(&self, user_id: &str, event: &TurnEvent) -> Result<(), EngineError> {
        self.store
            .append_event(user_id, event)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::collaborator("event append", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Intent, KeywordIntentRouter, StaticIntentAction};
    use crate::matcher::MatchRule;
    use crate::store_memory::MemoryStateStore;
    use crate::types::{CompletionHook, Fulfilment, Instruction, Module};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    // ── Counting test doubles ──

    #[derive(Default)]
    struct Counting(AtomicU32);

    impl Counting {
        fn count(&self) -> u32 {
            self.0.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fulfilment for Counting {
        async fn fulfil(&self, _user_id: &str, _message: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl CompletionHook for Counting {
        async fn on_complete(&self, _user_id: &str) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingFulfilment;

    #[async_trait]
    impl Fulfilment for FailingFulfilment {
        async fn fulfil(&self, _user_id: &str, _message: &str) -> Result<()> {
            Err(anyhow!("downstream write failed"))
        }
    }

    struct FailingHook;

    #[async_trait]
    impl CompletionHook for FailingHook {
        async fn on_complete(&self, _user_id: &str) -> Result<()> {
            Err(anyhow!("hook exploded"))
        }
    }

    // ── Conflict-injecting store wrapper ──

    /// Rejects the first `reject` conditional updates (inserts pass
    /// through, so fixtures can seed), delegating everything else to an
    /// inner MemoryStateStore.
    struct ContentiousStore {
        inner: MemoryStateStore,
        reject: AtomicU32,
    }

    impl ContentiousStore {
        fn rejecting(n: u32) -> Self {
            Self {
                inner: MemoryStateStore::new(),
                reject: AtomicU32::new(n),
            }
        }
    }

    #[async_trait]
    impl StateStore for ContentiousStore {
        async fn load(&self, user_id: &str) -> Result<Option<DialogueState>> {
            self.inner.load(user_id).await
        }

        async fn compare_and_swap(
            &self,
            user_id: &str,
            expected: Option<&DialogueState>,
            next: &DialogueState,
        ) -> Result<bool> {
            if expected.is_some()
                && self
                    .reject
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Ok(false);
            }
            self.inner.compare_and_swap(user_id, expected, next).await
        }

        async fn append_event(&self, user_id: &str, event: &TurnEvent) -> Result<u64> {
            self.inner.append_event(user_id, event).await
        }

        async fn read_events(&self, user_id: &str, from_seq: u64) -> Result<Vec<(u64, TurnEvent)>> {
            self.inner.read_events(user_id, from_seq).await
        }
    }

    // ── Fixture: onboarding=[ask_name, ask_email] → survey=[q1] ──

    struct Fixture {
        engine: DialogueEngine,
        store: Arc<dyn StateStore>,
        fulfil_name: Arc<Counting>,
        fulfil_email: Arc<Counting>,
        onboarding_done: Arc<Counting>,
    }

    fn fixture_with_store(store: Arc<dyn StateStore>) -> Fixture {
        let fulfil_name = Arc::new(Counting::default());
        let fulfil_email = Arc::new(Counting::default());
        let onboarding_done = Arc::new(Counting::default());

        let instructions = Arc::new(InstructionRegistry::new(vec![
            Instruction::new("ask_name", "onboarding", MatchRule::Any)
                .with_fulfilment(fulfil_name.clone()),
            Instruction::new(
                "ask_email",
                "onboarding",
                MatchRule::regex(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap(),
            )
            .with_fulfilment(fulfil_email.clone()),
            Instruction::new("q1", "survey", MatchRule::Any),
        ]));
        let modules = Arc::new(ModuleRegistry::new(vec![
            Module::new("onboarding", vec!["ask_name".into(), "ask_email".into()])
                .with_next("survey")
                .with_on_complete(onboarding_done.clone()),
            Module::new("survey", vec!["q1".into()]),
        ]));
        let router = Arc::new(KeywordIntentRouter::new(vec![Arc::new(Intent {
            intent_id: "help_intent".into(),
            phrases: vec!["what is this bot".into()],
            keywords: vec!["help".into()],
            priority: 0,
            action: Arc::new(StaticIntentAction("help_response".into())),
        })]));

        let engine = DialogueEngine::new(
            instructions,
            modules,
            router,
            store.clone(),
            Cursor::new("onboarding", "ask_name"),
            "fallback_unrecognized",
        );

        Fixture {
            engine,
            store,
            fulfil_name,
            fulfil_email,
            onboarding_done,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_store(Arc::new(MemoryStateStore::new()))
    }

    async fn seed(store: &dyn StateStore, user: &str, module: &str, instruction: &str) {
        let state = DialogueState {
            user_id: user.to_string(),
            module_id: module.to_string(),
            instruction_id: instruction.to_string(),
        };
        assert!(store.compare_and_swap(user, None, &state).await.unwrap());
    }

    async fn cursor_of(store: &dyn StateStore, user: &str) -> Option<(String, String)> {
        store
            .load(user)
            .await
            .unwrap()
            .map(|s| (s.module_id, s.instruction_id))
    }

    // ── Scenario 1: advancement within a module ──

    #[tokio::test]
    async fn matching_message_advances_within_module() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_name").await;

        let next = fx.engine.process_turn("Alice", "u1").await.unwrap();
        assert_eq!(next, "ask_email");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_email".into()))
        );
        assert_eq!(fx.fulfil_name.count(), 1);
        assert_eq!(fx.onboarding_done.count(), 0, "no boundary crossed");
    }

    // ── Scenario 2: module boundary with exactly-once hook ──

    #[tokio::test]
    async fn last_instruction_crosses_module_boundary_and_fires_hook_once() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_email").await;

        let next = fx
            .engine
            .process_turn("alice@example.com", "u1")
            .await
            .unwrap();
        assert_eq!(next, "q1");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("survey".into(), "q1".into()))
        );
        assert_eq!(fx.fulfil_email.count(), 1);
        assert_eq!(fx.onboarding_done.count(), 1);

        let events = fx.store.read_events("u1", 1).await.unwrap();
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, TurnEvent::ModuleCompleted { .. })));
    }

    #[tokio::test]
    async fn terminal_module_wraps_without_hook() {
        let terminal_done = Arc::new(Counting::default());
        let instructions = Arc::new(InstructionRegistry::new(vec![Instruction::new(
            "q1",
            "survey",
            MatchRule::Any,
        )]));
        let modules = Arc::new(ModuleRegistry::new(vec![Module::new(
            "survey",
            vec!["q1".into()],
        )
        .with_on_complete(terminal_done.clone())]));
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let engine = DialogueEngine::new(
            instructions,
            modules,
            Arc::new(KeywordIntentRouter::new(vec![])),
            store.clone(),
            Cursor::new("survey", "q1"),
            "fallback_unrecognized",
        );
        seed(store.as_ref(), "u1", "survey", "q1").await;

        // q1 is the last instruction of a terminal module: the cursor
        // wraps to the module's first instruction, hook suppressed.
        let next = engine.process_turn("done", "u1").await.unwrap();
        assert_eq!(next, "q1");
        assert_eq!(
            cursor_of(store.as_ref(), "u1").await,
            Some(("survey".into(), "q1".into()))
        );
        assert_eq!(terminal_done.count(), 0);
    }

    // ── Scenario 3: intent fallback ──

    #[tokio::test]
    async fn non_match_with_intent_routes_and_leaves_state_alone() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_email").await;

        let next = fx.engine.process_turn("what is this bot", "u1").await.unwrap();
        assert_eq!(next, "help_response");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_email".into())),
            "intent fallback must not move the cursor"
        );
        assert_eq!(fx.fulfil_email.count(), 0);
    }

    // ── Scenario 4: default fallback ──

    #[tokio::test]
    async fn non_match_without_intent_returns_default_fallback() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_email").await;

        let next = fx.engine.process_turn("gibberish input", "u1").await.unwrap();
        assert_eq!(next, "fallback_unrecognized");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_email".into()))
        );

        let events = fx.store.read_events("u1", 1).await.unwrap();
        assert!(events
            .iter()
            .any(|(_, e)| matches!(e, TurnEvent::FallbackReturned { .. })));
    }

    // ── First contact ──

    #[tokio::test]
    async fn first_contact_initializes_entry_state_on_match() {
        let fx = fixture();

        let next = fx.engine.process_turn("Alice", "brand_new").await.unwrap();
        assert_eq!(next, "ask_email");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "brand_new").await,
            Some(("onboarding".into(), "ask_email".into()))
        );

        let events = fx.store.read_events("brand_new", 1).await.unwrap();
        assert!(matches!(events[0].1, TurnEvent::StateInitialized { .. }));
    }

    #[tokio::test]
    async fn first_contact_non_match_persists_nothing() {
        let fx = fixture();

        // ask_name matches anything non-empty, so force the non-match
        // path with whitespace.
        let next = fx.engine.process_turn("   ", "brand_new").await.unwrap();
        assert_eq!(next, "fallback_unrecognized");
        assert!(fx.store.load("brand_new").await.unwrap().is_none());
    }

    // ── Input validation ──

    #[tokio::test]
    async fn empty_user_id_is_rejected_before_any_read() {
        let fx = fixture();
        let err = fx.engine.process_turn("hello", "  ").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn whitespace_message_is_a_non_match_even_for_match_any() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_name").await;

        let next = fx.engine.process_turn(" \t ", "u1").await.unwrap();
        assert_eq!(next, "fallback_unrecognized");
        assert_eq!(fx.fulfil_name.count(), 0);
    }

    // ── Corrupted cursor ──

    #[tokio::test]
    async fn dangling_instruction_id_is_fatal() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "vanished").await;

        let err = fx.engine.process_turn("Alice", "u1").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn instruction_outside_cursor_module_is_fatal() {
        let fx = fixture();
        // q1 exists, but belongs to survey, not onboarding.
        seed(fx.store.as_ref(), "u1", "onboarding", "q1").await;

        let err = fx.engine.process_turn("Alice", "u1").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    // ── Collaborator failures abort without persistence ──

    #[tokio::test]
    async fn failing_fulfilment_aborts_turn_without_state_write() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let instructions = Arc::new(InstructionRegistry::new(vec![Instruction::new(
            "ask_name",
            "onboarding",
            MatchRule::Any,
        )
        .with_fulfilment(Arc::new(FailingFulfilment))]));
        let modules = Arc::new(ModuleRegistry::new(vec![Module::new(
            "onboarding",
            vec!["ask_name".into()],
        )]));
        let engine = DialogueEngine::new(
            instructions,
            modules,
            Arc::new(KeywordIntentRouter::new(vec![])),
            store.clone(),
            Cursor::new("onboarding", "ask_name"),
            "fallback_unrecognized",
        );
        seed(store.as_ref(), "u1", "onboarding", "ask_name").await;

        let err = engine.process_turn("Alice", "u1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Collaborator {
                step: "fulfilment",
                ..
            }
        ));
        assert_eq!(
            cursor_of(store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_name".into())),
            "aborted turn must not persist"
        );
    }

    #[tokio::test]
    async fn failing_completion_hook_aborts_before_persistence() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let instructions = Arc::new(InstructionRegistry::new(vec![
            Instruction::new("ask_name", "onboarding", MatchRule::Any),
            Instruction::new("q1", "survey", MatchRule::Any),
        ]));
        let modules = Arc::new(ModuleRegistry::new(vec![
            Module::new("onboarding", vec!["ask_name".into()])
                .with_next("survey")
                .with_on_complete(Arc::new(FailingHook)),
            Module::new("survey", vec!["q1".into()]),
        ]));
        let engine = DialogueEngine::new(
            instructions,
            modules,
            Arc::new(KeywordIntentRouter::new(vec![])),
            store.clone(),
            Cursor::new("onboarding", "ask_name"),
            "fallback_unrecognized",
        );
        seed(store.as_ref(), "u1", "onboarding", "ask_name").await;

        let err = engine.process_turn("Alice", "u1").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Collaborator {
                step: "completion hook",
                ..
            }
        ));
        assert_eq!(
            cursor_of(store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_name".into()))
        );
    }

    // ── Optimistic write conflicts ──

    #[tokio::test]
    async fn lost_race_retries_from_fresh_read_and_commits_once() {
        let fx = fixture_with_store(Arc::new(ContentiousStore::rejecting(2)));
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_name").await;

        let next = fx.engine.process_turn("Alice", "u1").await.unwrap();
        assert_eq!(next, "ask_email");
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_email".into()))
        );
        // The whole turn re-runs per retry, fulfilment included:
        // two rejected attempts + the committed one.
        assert_eq!(fx.fulfil_name.count(), 3);

        let advanced = fx
            .store
            .read_events("u1", 1)
            .await
            .unwrap()
            .into_iter()
            .filter(|(_, e)| matches!(e, TurnEvent::Advanced { .. }))
            .count();
        assert_eq!(advanced, 1, "exactly one committed transition");
    }

    #[tokio::test]
    async fn conflict_surfaces_after_bounded_retries() {
        let fx = fixture_with_store(Arc::new(ContentiousStore::rejecting(u32::MAX)));
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_name").await;

        let err = fx.engine.process_turn("Alice", "u1").await.unwrap_err();
        match err {
            EngineError::Conflict { user_id, attempts } => {
                assert_eq!(user_id, "u1");
                assert_eq!(attempts, DEFAULT_WRITE_RETRIES + 1);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_name".into()))
        );
    }

    #[tokio::test]
    async fn concurrent_same_user_turns_serialize_to_one_transition_each() {
        let fx = fixture();
        seed(fx.store.as_ref(), "u1", "onboarding", "ask_name").await;

        // Duplicate delivery of the same answer: both turns run; the
        // loser re-reads the winner's cursor. "Alice" matches ask_name
        // (Any) but not ask_email (regex), so the second committed turn
        // ends in the fallback path, never a double-advance.
        let (a, b) = tokio::join!(
            fx.engine.process_turn("Alice", "u1"),
            fx.engine.process_turn("Alice", "u1"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(
            (a == "ask_email" && b == "fallback_unrecognized")
                || (b == "ask_email" && a == "fallback_unrecognized"),
            "got ({a}, {b})"
        );
        assert_eq!(
            cursor_of(fx.store.as_ref(), "u1").await,
            Some(("onboarding".into(), "ask_email".into()))
        );
    }
}
