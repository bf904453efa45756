//! Flow authoring: YAML → DTO → validation → registries.
//!
//! The graph (modules, instruction order, matcher rules, intents,
//! entry point, fallback) is declared in YAML; behaviors that are code
//! are bound by id at build time. Loaded flows are immutable — a
//! reload builds a fresh `BuiltFlow` and swaps it whole.

pub mod build;
pub mod dto;
pub mod validate;
pub mod yaml;

pub use build::{build_flow, BuiltFlow, FlowBehaviors};
pub use dto::{FlowGraphDto, FlowMeta, InstructionDto, IntentDto, MatchRuleDto, ModuleDto};
pub use validate::{validate_dto, ValidationError};
pub use yaml::parse_flow_yaml;
