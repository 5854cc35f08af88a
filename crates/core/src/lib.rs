//! # chatrelay core
//!
//! Domain types, traits, and error definitions for the chatrelay LLM relay.
//! This crate has **no framework dependencies**: it defines the model that
//! the storage, provider, pipeline and HTTP crates implement against.
//!
//! ## Design Philosophy
//!
//! The two replaceable seams are traits here:
//! - [`Provider`] — the completion gateway to a remote LLM
//! - [`Retriever`] — the relevance matcher over the knowledge corpus
//!
//! Implementations live in their respective crates, and tests swap in
//! scripted stand-ins without touching the network.

pub mod error;
pub mod knowledge;
pub mod message;
pub mod persona;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, KnowledgeError, ProviderError, ValidationError};
pub use knowledge::{Fragment, Retriever};
pub use message::{Message, Role, SessionId, Turn, TurnRole};
pub use persona::{KNOWLEDGE_PLACEHOLDER, Persona, PersonaSource};
pub use provider::{CompletionRequest, CompletionResponse, ModelConfig, Provider, Usage};
