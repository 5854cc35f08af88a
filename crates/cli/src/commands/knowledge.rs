//! `chatrelay knowledge` — Show what the matcher picks for a query.

use chatrelay_config::AppConfig;
use chatrelay_core::knowledge::Retriever;
use chatrelay_memory::matcher::{score, tokenize};
use chatrelay_memory::{KeywordMatcher, KnowledgeStore};

const PREVIEW_CHARS: usize = 120;

pub fn run(
    config: AppConfig,
    query: &str,
    limit: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = config.knowledge.path.as_deref() else {
        println!("No knowledge source configured (set knowledge.path or CHATRELAY_KNOWLEDGE).");
        return Ok(());
    };

    let store = KnowledgeStore::try_load(path, config.knowledge.chunk_size)?;
    let tokens = tokenize(query);
    let limit = limit.unwrap_or(config.knowledge.match_limit);

    println!("Corpus: {} ({} fragments)", path.display(), store.len());
    println!("Tokens: {}", tokens.join(", "));
    println!();

    let matches = KeywordMatcher::new().match_fragments(query, store.fragments(), limit);
    if matches.is_empty() {
        println!("No fragment shares a keyword with the query.");
        return Ok(());
    }

    for (i, fragment) in matches.iter().enumerate() {
        let label = fragment.source.as_deref().unwrap_or("-");
        println!(
            "  {}. [score {}] [{}] {}",
            i + 1,
            score(&tokens, fragment),
            label,
            preview(&fragment.text)
        );
    }

    Ok(())
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_flattens_and_truncates() {
        assert_eq!(preview("a\n  b"), "a b");
        let long = "я".repeat(200);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 1);
        assert!(p.ends_with('…'));
    }
}
