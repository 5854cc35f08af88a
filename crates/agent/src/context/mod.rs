//! Outbound prompt construction.
//!
//! The prompt is always `[system] + history + [user]`, where the system
//! message is the persona with matched knowledge interpolated.

pub mod assembler;

pub use assembler::{DEFAULT_KNOWLEDGE_HEADER, PromptAssembler};
