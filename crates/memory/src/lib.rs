//! In-process state for chatrelay.
//!
//! - [`SessionStore`]: bounded per-session turn windows
//! - [`KnowledgeStore`]: the static corpus, loaded once at startup
//! - [`KeywordMatcher`]: naive keyword relevance over that corpus

pub mod knowledge;
pub mod matcher;
pub mod session;

pub use knowledge::{KnowledgeStore, slice_text};
pub use matcher::KeywordMatcher;
pub use session::{SessionGuard, SessionStore};
