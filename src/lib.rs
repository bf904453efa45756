//! Dialogue-Lite — a scripted-dialogue flow engine.
//!
//! Conversations are ordered sequences of instructions ("ask_name",
//! "ask_email", …) grouped into modules, with transitions between
//! modules and an intent fallback when free-form input does not match
//! the expected instruction. One call per incoming message decides the
//! user's next position and returns the next instruction to present.
//!
//! # Architecture
//!
//! ```text
//! Incoming message + user id
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────┐
//! │  DialogueEngine::process_turn                │
//! │  read cursor → match → fulfil → advance      │
//! └──────────────────────────────────────────────┘
//!       │ match                     │ non-match
//!       ▼                           ▼
//! ┌───────────────────┐   ┌─────────────────────┐
//! │  ModuleRegistry   │   │  IntentRouter       │
//! │  successor lookup │   │  phrase/keyword     │
//! │  completion hook  │   │  scoring, fallback  │
//! └───────────────────┘   └─────────────────────┘
//!       │
//!       ▼
//! ┌──────────────────────────────────────────────┐
//! │  StateStore — compare-and-swap cursor write  │
//! │  (losing turn retries from a fresh read)     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Registries are immutable after load and shared freely across
//! concurrent turns; the store's conditional write is the only
//! per-user serialization point.

pub mod authoring;
pub mod engine;
pub mod error;
pub mod events;
pub mod intent;
pub mod matcher;
pub mod registry;
pub mod store;
pub mod store_memory;
pub mod types;

pub use authoring::{build_flow, parse_flow_yaml, BuiltFlow, FlowBehaviors};
pub use engine::DialogueEngine;
pub use error::EngineError;
pub use events::TurnEvent;
pub use intent::{Intent, IntentAction, IntentRouter, KeywordIntentRouter, StaticIntentAction};
pub use matcher::{MatchRule, MessageMatcher};
pub use registry::{InstructionRegistry, ModuleRegistry};
pub use store::StateStore;
pub use store_memory::MemoryStateStore;
pub use types::{
    CompletionHook, Cursor, DialogueState, FnFulfilment, Fulfilment, Instruction, InstructionId,
    Module, ModuleId, NoopFulfilment, UserId,
};
