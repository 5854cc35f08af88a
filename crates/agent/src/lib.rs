//! The chatrelay request pipeline.
//!
//! For every chat message:
//!
//! 1. **Receive** the message and session id (from HTTP or the CLI)
//! 2. **Recall** the session's recent turns
//! 3. **Retrieve** knowledge fragments that share keywords with the message
//! 4. **Assemble** persona + knowledge + history + message into a prompt
//! 5. **Complete** via the configured provider
//! 6. **Remember** the exchange, truncated to the session window
//!
//! Nothing is committed to the session unless step 5 succeeds.

pub mod chat;
pub mod context;

#[cfg(test)]
mod test_helpers;

pub use chat::{ChatInput, ChatOutcome, ChatService, DEFAULT_MATCH_LIMIT};
pub use context::{DEFAULT_KNOWLEDGE_HEADER, PromptAssembler};
