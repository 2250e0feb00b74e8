// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label query evaluation
//!
//! A query is a whitespace separated list of terms folded left to right into
//! a single boolean, starting from `true`:
//!
//! - `&&` is a no-op (terms are ANDed already)
//! - `|| x` ORs in "haystack contains `x`" and consumes `x`
//! - `!x` ANDs in "haystack does not contain `x`"
//! - any other term ANDs in a case-insensitive match, whole-word when strict
//!
//! There is no operator precedence: `a || b && c` is folded in token order.

use regex::RegexBuilder;

/// Evaluate `query` against `haystack`. An empty query matches everything.
pub fn evaluate(haystack: &str, query: &str, strict: bool) -> bool {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let mut result = true;

    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        match token {
            "&&" => {}
            "||" => {
                // Operand is the very next token, which is then skipped
                if let Some(operand) = tokens.get(i + 1) {
                    result = result || haystack.contains(operand);
                }
                i += 1;
            }
            _ => {
                if let Some(negated) = token.strip_prefix('!') {
                    result = result && !haystack.contains(negated);
                } else {
                    result = result && term_matches(haystack, token, strict);
                }
            }
        }
        i += 1;
    }

    result
}

/// Case-insensitive term match; whole-word when `strict`
fn term_matches(haystack: &str, term: &str, strict: bool) -> bool {
    if strict {
        RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
            .case_insensitive(true)
            .build()
            .map(|re| re.is_match(haystack))
            .unwrap_or(false)
    } else {
        haystack.to_lowercase().contains(&term.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: &str = "app:nginx team:payments tier:frontend";

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(evaluate("", "", false));
        assert!(evaluate(LABELS, "", false));
        assert!(evaluate(LABELS, "", true));
        assert!(evaluate(LABELS, "   ", true));
    }

    #[test]
    fn test_substring_is_case_insensitive() {
        assert!(evaluate(LABELS, "nginx", false));
        assert!(evaluate(LABELS, "NGINX", false));
        assert!(evaluate(LABELS, "ngi", false));
        assert!(!evaluate(LABELS, "redis", false));
    }

    #[test]
    fn test_implicit_and() {
        assert!(evaluate(LABELS, "nginx payments", false));
        assert!(!evaluate(LABELS, "nginx redis", false));
        assert!(evaluate(LABELS, "nginx && payments", false));
        assert!(!evaluate(LABELS, "redis && nginx", false));
    }

    #[test]
    fn test_negation() {
        assert!(evaluate(LABELS, "!redis", false));
        assert!(!evaluate(LABELS, "!nginx", false));
        assert!(evaluate(LABELS, "nginx !backend", false));
        // Negated operand is matched case-sensitively
        assert!(evaluate(LABELS, "!NGINX", false));
    }

    #[test]
    fn test_or_reads_next_token() {
        assert!(evaluate("a b", "a || c", false));
        assert!(evaluate("a b", "x || b", false));
        assert!(!evaluate("a b", "x || y", false));
    }

    #[test]
    fn test_or_consumes_operand() {
        // "c" is the OR operand, not an AND term: a || c -> true
        assert!(evaluate("a", "a || c", false));
        // If "c" were re-read as a term the result would be false
        assert!(evaluate("a", "x || a", false));
    }

    #[test]
    fn test_left_fold_without_precedence() {
        // ((true && x) || a) && c  ->  (false || true) && false
        assert!(!evaluate("a b", "x || a c", false));
        // ((true && a) || x) && !b  ->  true && false
        assert!(!evaluate("a b", "a || x !b", false));
        // a || b && c folds as ((a || b) && c)
        assert!(!evaluate("a b", "a || b && c", false));
        assert!(evaluate("a b c", "a || b && c", false));
    }

    #[test]
    fn test_trailing_or_is_ignored() {
        assert!(evaluate(LABELS, "nginx ||", false));
        assert!(!evaluate(LABELS, "redis ||", false));
    }

    #[test]
    fn test_strict_whole_word() {
        assert!(evaluate(LABELS, "nginx", true));
        assert!(evaluate(LABELS, "app:nginx", true));
        assert!(evaluate(LABELS, "FRONTEND", true));
        assert!(!evaluate(LABELS, "ngin", true));
        assert!(!evaluate(LABELS, "front", true));
    }

    #[test]
    fn test_strict_escapes_regex_characters() {
        assert!(evaluate("version:1.2", "1.2", true));
        assert!(!evaluate("version:1x2", "1.2", true));
        assert!(!evaluate(LABELS, "(nginx", true));
    }
}
