//! Tokenisation, Jaccard similarity, and fuzzy (Levenshtein) bonus scoring.

use std::collections::HashSet;

use crate::config::TokenConfig;

const STRIP_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '{', '}', '+', '-', '='];

/// Splits `text` on whitespace and applies the configured normalisation:
/// lower-casing, then edge punctuation stripping, then dropping anything
/// that normalises to empty.
pub fn tokenize(text: &str, config: &TokenConfig) -> Vec<String> {
    text.split(|c: char| c == ' ' || c == '\t' || c == '\n' || c == '\r')
        .filter(|s| !s.is_empty())
        .map(|tok| {
            let tok = if config.normalize_tokens && config.ignore_case {
                tok.to_lowercase()
            } else {
                tok.to_string()
            };
            if config.normalize_tokens && config.remove_punctuation {
                tok.trim_matches(STRIP_CHARS).to_string()
            } else {
                tok
            }
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Jaccard index over the deduplicated token sets, plus an optional fuzzy
/// bonus, clamped to 1.0.
pub fn similarity(tokens_a: &[String], tokens_b: &[String], config: &TokenConfig) -> f64 {
    let set_a: HashSet<&str> = tokens_a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = tokens_b.iter().map(String::as_str).collect();

    let base = jaccard(&set_a, &set_b);

    if !config.enable_fuzzy_matching || set_a.is_empty() || set_b.is_empty() {
        return base;
    }

    let fuzzy_matches = set_a
        .iter()
        .filter(|a| {
            !set_b.contains(*a)
                && set_b
                    .iter()
                    .any(|b| levenshtein(a, b) <= config.max_token_distance)
        })
        .count();

    let bonus = 0.1 * (fuzzy_matches as f64 / set_a.len().min(set_b.len()) as f64);
    (base + bonus).min(1.0)
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

/// Standard insert/delete/substitute cost-1 edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (la, lb) = (a.len(), b.len());

    if la == 0 {
        return lb;
    }
    if lb == 0 {
        return la;
    }

    let mut prev: Vec<usize> = (0..=lb).collect();
    let mut curr = vec![0usize; lb + 1];

    for i in 1..=la {
        curr[0] = i;
        for j in 1..=lb {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[lb]
}
