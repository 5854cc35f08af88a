//! Static knowledge corpus.
//!
//! Two source formats are understood:
//!
//! - `*.json`: an array of strings or `{ "text": ..., "source": ... }`
//!   objects, one fragment per element
//! - anything else: raw UTF-8 text cut into fixed-size character slices
//!
//! Loading never takes the service down. A bad source is logged and the
//! store comes up empty.

use chatrelay_core::error::KnowledgeError;
use chatrelay_core::knowledge::Fragment;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default slice length for plain-text corpora, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// The loaded corpus. Immutable after construction.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    fragments: Arc<[Fragment]>,
    source: Option<PathBuf>,
}

/// One element of a JSON corpus.
#[derive(Deserialize)]
#[serde(untagged)]
enum Record {
    Text(String),
    Fragment(Fragment),
}

impl KnowledgeStore {
    /// An empty corpus.
    pub fn empty() -> Self {
        Self {
            fragments: Arc::from(Vec::new()),
            source: None,
        }
    }

    pub fn from_fragments(fragments: Vec<Fragment>) -> Self {
        Self {
            fragments: Arc::from(fragments),
            source: None,
        }
    }

    /// Load the corpus configured at startup.
    ///
    /// Failures are logged at `warn` and produce an empty store.
    pub fn load(path: Option<&Path>, chunk_size: usize) -> Self {
        let Some(path) = path else {
            info!("No knowledge source configured, running without a corpus");
            return Self::empty();
        };

        match Self::try_load(path, chunk_size) {
            Ok(store) => {
                info!(
                    file = %path.display(),
                    fragments = store.len(),
                    "Knowledge corpus loaded"
                );
                store
            }
            Err(e) => {
                warn!(error = %e, "Knowledge corpus unavailable, continuing with empty corpus");
                Self::empty()
            }
        }
    }

    /// Load a corpus, reporting why it could not be read.
    pub fn try_load(path: &Path, chunk_size: usize) -> Result<Self, KnowledgeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KnowledgeError::NotFound(path.to_path_buf())
            } else {
                KnowledgeError::Read {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            }
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let fragments = if is_json {
            parse_records(&content).map_err(|reason| KnowledgeError::Malformed {
                path: path.to_path_buf(),
                reason,
            })?
        } else {
            let label = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "corpus".into());
            slice_text(&content, chunk_size)
                .into_iter()
                .enumerate()
                .map(|(i, text)| Fragment::new(text).with_source(format!("{label}#{i}")))
                .collect()
        };

        debug!(file = %path.display(), json = is_json, fragments = fragments.len(), "Parsed knowledge source");

        Ok(Self {
            fragments: Arc::from(fragments),
            source: Some(path.to_path_buf()),
        })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// The file the corpus was read from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::empty()
    }
}

fn parse_records(content: &str) -> Result<Vec<Fragment>, String> {
    let records: Vec<Record> = serde_json::from_str(content).map_err(|e| e.to_string())?;

    Ok(records
        .into_iter()
        .map(|r| match r {
            Record::Text(text) => Fragment::new(text),
            Record::Fragment(f) => f,
        })
        .filter(|f| !f.text.trim().is_empty())
        .collect())
}

/// Cut `text` into consecutive slices of `chunk_size` characters.
///
/// Counts Unicode scalar values, not bytes. No overlap and no attempt to
/// respect word or sentence boundaries. The last slice may be shorter.
/// A `chunk_size` of 0 is treated as 1.
pub fn slice_text(text: &str, chunk_size: usize) -> Vec<String> {
    let size = chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}
