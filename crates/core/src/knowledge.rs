//! Knowledge fragments and the retrieval seam.

use serde::{Deserialize, Serialize};

/// An indivisible unit of the static knowledge corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The text content of this fragment.
    #[serde(alias = "content")]
    pub text: String,

    /// Human-readable source label (file name, record title, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Fragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Selects the fragments relevant to a query.
///
/// Implementations must return at most `limit` fragments, drawn from
/// `fragments`, most relevant first.
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    fn match_fragments(&self, query: &str, fragments: &[Fragment], limit: usize) -> Vec<Fragment>;
}
