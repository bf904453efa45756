//! Message matching for instructions.
//!
//! Matching is a capability with concrete variants supplied by
//! configuration, not an inheritance hierarchy: most dialogues get by
//! with the built-in rules, and programmatic matchers plug in through
//! the `Custom` variant.

use anyhow::Result;
use regex::Regex;
use std::sync::Arc;

/// A matcher whose evaluation may fail (e.g. consults an external
/// classifier). Built-in rules never fail; custom ones may, and the
/// engine surfaces that as a collaborator failure.
pub trait MessageMatcher: Send + Sync {
    fn is_match(&self, message: &str) -> Result<bool>;
}

/// How an instruction decides whether an incoming message is the
/// answer it is waiting for.
#[derive(Clone)]
pub enum MatchRule {
    /// Accept anything. Whitespace-only input never reaches a matcher;
    /// the engine treats it as a non-match up front.
    Any,
    /// Accept a message whose trimmed text equals `value`.
    Exact { value: String, case_sensitive: bool },
    /// Accept a message containing any of the given keywords
    /// (case-insensitive substring).
    Keyword { any_of: Vec<String> },
    /// Accept a message the compiled pattern matches.
    Regex(Regex),
    /// Programmatic matcher bound in code.
    Custom(Arc<dyn MessageMatcher>),
}

impl MatchRule {
    /// Compile a regex rule, failing on an invalid pattern.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact {
            value: value.into(),
            case_sensitive: false,
        }
    }

    pub fn keywords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Keyword {
            any_of: words.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, message: &str) -> Result<bool> {
        match self {
            MatchRule::Any => Ok(true),
            MatchRule::Exact {
                value,
                case_sensitive,
            } => {
                let message = message.trim();
                Ok(if *case_sensitive {
                    message == value
                } else {
                    message.eq_ignore_ascii_case(value)
                })
            }
            MatchRule::Keyword { any_of } => {
                let lowered = message.to_lowercase();
                Ok(any_of.iter().any(|k| lowered.contains(&k.to_lowercase())))
            }
            MatchRule::Regex(re) => Ok(re.is_match(message)),
            MatchRule::Custom(m) => m.is_match(message),
        }
    }
}

impl std::fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchRule::Any => write!(f, "Any"),
            MatchRule::Exact {
                value,
                case_sensitive,
            } => write!(f, "Exact({value:?}, case_sensitive={case_sensitive})"),
            MatchRule::Keyword { any_of } => write!(f, "Keyword({any_of:?})"),
            MatchRule::Regex(re) => write!(f, "Regex({:?})", re.as_str()),
            MatchRule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}
