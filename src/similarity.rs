//! Levenshtein-similarity matcher behind the `aider` tool's fuzzy edits.

use strsim::levenshtein;

/// Normalized similarity in `[0.0, 1.0]`: `1 - levenshtein(a, b) / max(len(a), len(b))`.
/// Two empty strings are defined as identical (similarity 1.0).
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let distance = levenshtein(a, b);
    1.0 - (distance as f64 / max_len as f64)
}

/// Find the best-matching window of `needle`'s length anywhere in
/// `haystack`, scanning over Unicode scalar boundaries. Returns
/// `(start_char_idx, end_char_idx, score)` for the highest-scoring window, or
/// `None` if `haystack` is shorter than `needle`.
pub fn best_match(haystack: &str, needle: &str) -> Option<(usize, usize, f64)> {
    let chars: Vec<char> = haystack.chars().collect();
    let needle_len = needle.chars().count();
    if needle_len == 0 || chars.len() < needle_len {
        return None;
    }

    let mut best: Option<(usize, usize, f64)> = None;
    for start in 0..=(chars.len() - needle_len) {
        let window: String = chars[start..start + needle_len].iter().collect();
        let score = similarity(&window, needle);
        if best.map(|(_, _, best_score)| score > best_score).unwrap_or(true) {
            best = Some((start, start + needle_len, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_score_one() {
        assert_eq!(similarity("abc", "abc"), 1.0);
    }

    #[test]
    fn completely_different_scores_low() {
        assert!(similarity("abc", "xyz") < 0.5);
    }

    #[test]
    fn best_match_finds_exact_window() {
        let (start, end, score) = best_match("the quick brown fox", "quick").unwrap();
        assert_eq!(&"the quick brown fox"[start..end], "quick");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn best_match_tolerates_minor_typo() {
        let (_, _, score) = best_match("function foo(){ retrun 1 }", "return 1").unwrap();
        assert!(score >= 0.8);
    }

    #[test]
    fn empty_haystack_or_needle_returns_none() {
        assert!(best_match("", "x").is_none());
        assert!(best_match("abc", "").is_none());
    }
}
