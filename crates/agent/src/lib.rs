//! Conversation agent built on the parley engine.
//!
//! This crate supplies everything a host needs around the engine core:
//! - NLU oracles: the hosted LUIS endpoint (`oracle::HttpNluOracle`) and an
//!   offline keyword classifier (`oracle::KeywordOracle`)
//! - The bookstore demo: typed actions, reply handlers and a seeded in-memory
//!   backend
//! - `runtime::ConversationRuntime`, the multi-turn loop that asks for missing
//!   fields and follows the user when an answer starts a different request
//!
//! # Turn flow
//!
//! 1. **Classify** the utterance with the configured oracle
//! 2. **Resolve** the winning intent to an action and bind its entities
//! 3. **Clarify** any field the action still needs, one question per turn
//! 4. **Dispatch** the fulfilled action to the handler for its intent

pub mod actions;
pub mod bookstore;
pub mod handlers;
pub mod oracle;
pub mod runtime;
