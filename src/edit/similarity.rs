//! Similarity scoring between text fragments.
//!
//! Used by the match locator to score candidate spans against the search
//! fragment. All scores are normalized to `0.0..=1.0`.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use similar::{Algorithm, TextDiff};

/// Comparison strategy for [`similarity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMethod {
    /// Matching-block ratio over the raw strings.
    #[default]
    Ratio,
    /// Ratio over lower-cased, alphabetically sorted tokens.
    TokenSort,
    /// Shared tokens over the larger token set.
    TokenSet,
}

/// Compute the similarity of `a` and `b` with the given method.
///
/// Two empty strings score 1.0; exactly one empty string scores 0.0.
pub fn similarity(a: &str, b: &str, method: SimilarityMethod) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    match method {
        SimilarityMethod::Ratio => ratio(a, b),
        SimilarityMethod::TokenSort => ratio(&sorted_tokens(a), &sorted_tokens(b)),
        SimilarityMethod::TokenSet => token_set(a, b),
    }
}

/// Sequence-alignment ratio: `2 * matched / (len(a) + len(b))`, counted in
/// chars.
///
/// Uses Myers so the matched length is a longest common subsequence, which
/// keeps the score symmetric in its arguments. Scores can run slightly above
/// a Ratcliff/Obershelp matching-block ratio for the same pair.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b);
    f64::from(diff.ratio())
}

/// Best ratio `a` and `b` could reach given their lengths alone.
///
/// Callers compare this to a threshold before paying for the alignment.
pub fn ratio_upper_bound(a: &str, b: &str) -> f64 {
    let m = a.chars().count();
    let n = b.chars().count();
    if m + n == 0 {
        return 1.0;
    }
    (2 * m.min(n)) as f64 / (m + n) as f64
}

/// Lower-case, whitespace-tokenize, sort, and rejoin with single spaces.
pub(crate) fn sorted_tokens(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut tokens: Vec<&str> = lowered.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn token_set(a: &str, b: &str) -> f64 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    let ta: HashSet<&str> = a.split_whitespace().collect();
    let tb: HashSet<&str> = b.split_whitespace().collect();

    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }

    let shared = ta.intersection(&tb).count();
    shared as f64 / ta.len().max(tb.len()) as f64
}
