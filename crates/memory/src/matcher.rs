//! Keyword relevance matcher.
//!
//! Deliberately naive: a fragment scores one point for every distinct query
//! token that appears anywhere inside its lowercased text. Substring, not
//! whole-word, so "штор" matches "шторы".

use chatrelay_core::knowledge::{Fragment, Retriever};

#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordMatcher;

impl KeywordMatcher {
    pub fn new() -> Self {
        Self
    }
}

/// Split a query into distinct lowercase tokens.
///
/// Any character that is neither alphanumeric nor `_` separates tokens.
/// Order of first occurrence is preserved.
pub fn tokenize(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for raw in query.split(|c: char| !(c.is_alphanumeric() || c == '_')) {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_lowercase();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// Number of `tokens` contained in the fragment text.
pub fn score(tokens: &[String], fragment: &Fragment) -> usize {
    let haystack = fragment.text.to_lowercase();
    tokens.iter().filter(|t| haystack.contains(t.as_str())).count()
}

impl Retriever for KeywordMatcher {
    fn name(&self) -> &str {
        "keyword"
    }

    fn match_fragments(&self, query: &str, fragments: &[Fragment], limit: usize) -> Vec<Fragment> {
        if limit == 0 {
            return Vec::new();
        }
        let tokens = tokenize(query);
        if tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, &Fragment)> = fragments
            .iter()
            .map(|f| (score(&tokens, f), f))
            .filter(|(s, _)| *s > 0)
            .collect();

        // sort_by is stable: ties keep corpus order
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        scored
            .into_iter()
            .take(limit)
            .map(|(_, f)| f.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(texts: &[&str]) -> Vec<Fragment> {
        texts.iter().map(|t| Fragment::new(*t)).collect()
    }

    #[test]
    fn tokenize_splits_lowercases_and_dedupes() {
        assert_eq!(
            tokenize("Сколько стоят ШТОРЫ? шторы, цена!"),
            vec!["сколько", "стоят", "шторы", "цена"]
        );
    }

    #[test]
    fn tokenize_keeps_digits() {
        assert_eq!(tokenize("size 200x250cm"), vec!["size", "200x250cm"]);
    }

    #[test]
    fn tokenize_keeps_underscores() {
        assert_eq!(tokenize("promo_code BLACK_friday!"), vec!["promo_code", "black_friday"]);
    }

    #[test]
    fn tokenize_empty_query() {
        assert!(tokenize("  ?!  ").is_empty());
    }

    #[test]
    fn score_counts_substring_hits() {
        let tokens = tokenize("штор цена");
        let frag = Fragment::new("Цена на шторы блэкаут");
        assert_eq!(score(&tokens, &frag), 2);
    }

    #[test]
    fn best_match_first() {
        let fragments = corpus(&[
            "Delivery is free within the city.",
            "Blackout curtains, price from 2000.",
            "Curtain installation service.",
        ]);
        let result = KeywordMatcher.match_fragments("curtain price", &fragments, 3);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].text, "Blackout curtains, price from 2000.");
        assert_eq!(result[1].text, "Curtain installation service.");
    }

    #[test]
    fn ties_keep_corpus_order() {
        let fragments = corpus(&["alpha one", "beta one", "gamma one"]);
        let result = KeywordMatcher.match_fragments("one", &fragments, 2);
        assert_eq!(result[0].text, "alpha one");
        assert_eq!(result[1].text, "beta one");
    }

    #[test]
    fn zero_scores_are_never_returned() {
        let fragments = corpus(&["alpha", "beta"]);
        assert!(KeywordMatcher.match_fragments("zeta", &fragments, 3).is_empty());
        assert!(KeywordMatcher.match_fragments("", &fragments, 3).is_empty());
    }

    #[test]
    fn limit_is_respected() {
        let fragments = corpus(&["a x", "b x", "c x", "d x"]);
        assert_eq!(KeywordMatcher.match_fragments("x", &fragments, 3).len(), 3);
        assert!(KeywordMatcher.match_fragments("x", &fragments, 0).is_empty());
    }

    #[test]
    fn empty_corpus_yields_nothing() {
        assert!(KeywordMatcher.match_fragments("anything", &[], 3).is_empty());
    }
}
