//! Terminal chat client for several LLM providers with optional web search
//! grounding through a relay endpoint.
//!
//! - `orchestrator` routes a prompt to the active provider and turns its
//!   stream into ordered events
//! - `search` rewrites the request into a query and grounds the prompt in
//!   relay search results
//! - `session` owns the conversation state and the single-flight send
//! - `settings` and `persistence` keep credentials and past conversations

pub mod app;
pub mod cli;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod persistence;
pub mod prompts;
pub mod search;
pub mod session;
pub mod settings;

#[cfg(test)]
mod tests;

pub use error::ChatError;
pub use orchestrator::{GenerationEvent, GenerationOrchestrator, GenerationStream};
pub use session::{ChatObserver, ChatSession, SendOutcome};
