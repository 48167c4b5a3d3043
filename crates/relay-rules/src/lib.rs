//! # relay-rules
//!
//! Reference phrase catalog, fuzzy matcher, and the conversation rule engine
//! that turns inbound envelopes into at most one `conversationResponse`.

pub mod catalog;
pub mod engine;
pub mod matcher;

pub use catalog::{CatalogEntry, ReferenceCatalog};
pub use engine::{RuleConfig, RuleEngine};
pub use matcher::{best_match, match_question, similarity, PhraseMatch, DEFAULT_THRESHOLD};
