//! Cascade of match strategies that locate a search fragment in a document.
//!
//! Each [`Strategy`] inspects the untouched document and yields
//! [`MatchCandidate`]s whose offsets point back into it. Stages run in the
//! order of [`Strategy::ALL`]:
//!
//! 1. `exact`: literal substring; short-circuits the cascade
//! 2. `normalized`: whitespace collapsed per line, fixed score 0.95
//! 3. `multiline`: sliding window of trimmed lines scored by ratio
//! 4. `single_line`: best single line, relaxed floor
//! 5. `token`: token-sorted ratio over the whole document
//!
//! Candidates are returned best first; ties keep discovery order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::edit::similarity::{self, SimilarityMethod};

/// Fixed score for a whitespace-normalized match.
const NORMALIZED_SIMILARITY: f64 = 0.95;

/// Lowest score a single-line match may have, whatever the threshold.
const SINGLE_LINE_FLOOR: f64 = 0.6;

/// How far below the threshold a single-line match may score.
const SINGLE_LINE_RELAXATION: f64 = 0.2;

/// Number of leading tokens used to anchor a token-based match.
const TOKEN_ANCHOR_WORDS: usize = 3;

/// One stage of the match cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Exact,
    Normalized,
    Multiline,
    SingleLine,
    Token,
}

impl Strategy {
    /// Every stage, in cascade order.
    pub const ALL: [Self; 5] = [
        Self::Exact,
        Self::Normalized,
        Self::Multiline,
        Self::SingleLine,
        Self::Token,
    ];

    /// Stages that never move the match away from the fragment's literal text.
    pub const STRICT: [Self; 2] = [Self::Exact, Self::Normalized];

    /// Every stage except `exact`, used when an exact probe already failed.
    pub const FUZZY: [Self; 4] = [
        Self::Normalized,
        Self::Multiline,
        Self::SingleLine,
        Self::Token,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Multiline => "multiline",
            Self::SingleLine => "single_line",
            Self::Token => "token",
        }
    }

    fn run(self, search: &str, document: &str, threshold: f64) -> Vec<MatchCandidate> {
        match self {
            Self::Exact => exact(search, document).into_iter().collect(),
            Self::Normalized => normalized(search, document).into_iter().collect(),
            Self::Multiline => multiline(search, document, threshold),
            Self::SingleLine => single_line(search, document, threshold).into_iter().collect(),
            Self::Token => token(search, document, threshold).into_iter().collect(),
        }
    }
}

/// How a candidate relates to the search fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Normalized,
    FuzzyMultiline,
    FuzzySingleLine,
    TokenBased,
}

/// A located, scored span of the searched document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchCandidate {
    /// The document's own text for `start..end`.
    pub text: String,
    pub similarity: f64,
    /// Byte offset of the span start.
    pub start: usize,
    /// Byte offset one past the span end.
    pub end: usize,
    pub kind: MatchKind,
    pub strategy: Strategy,
}

impl MatchCandidate {
    fn from_span(
        document: &str,
        start: usize,
        end: usize,
        similarity: f64,
        kind: MatchKind,
        strategy: Strategy,
    ) -> Self {
        Self {
            text: document[start..end].to_owned(),
            similarity,
            start,
            end,
            kind,
            strategy,
        }
    }
}

/// Locate `search` in `document` with the enabled stages.
///
/// An exact hit returns immediately as the only candidate. Otherwise every
/// enabled stage contributes and the result is sorted by descending
/// similarity. An empty result means no match.
pub fn locate(
    search: &str,
    document: &str,
    threshold: f64,
    enabled: &[Strategy],
) -> Vec<MatchCandidate> {
    let mut candidates = Vec::new();

    for strategy in Strategy::ALL {
        if !enabled.contains(&strategy) {
            continue;
        }

        let found = strategy.run(search, document, threshold);
        debug!(
            strategy = strategy.name(),
            count = found.len(),
            "match stage finished"
        );

        if strategy == Strategy::Exact && !found.is_empty() {
            return found;
        }
        candidates.extend(found);
    }

    // Stable sort: equal scores stay in discovery order.
    candidates.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    candidates
}

/// Collapse runs of whitespace to one space on every line, trimming each
/// line and keeping the line breaks.
pub fn normalize_whitespace(text: &str) -> String {
    text.split('\n')
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Stage: exact
// ---------------------------------------------------------------------------

fn exact(search: &str, document: &str) -> Option<MatchCandidate> {
    let start = document.find(search)?;
    Some(MatchCandidate::from_span(
        document,
        start,
        start + search.len(),
        1.0,
        MatchKind::Exact,
        Strategy::Exact,
    ))
}

// ---------------------------------------------------------------------------
// Stage: normalized
// ---------------------------------------------------------------------------

fn normalized(search: &str, document: &str) -> Option<MatchCandidate> {
    let normalized_search = normalize_whitespace(search);
    if !normalize_whitespace(document).contains(&normalized_search) {
        return None;
    }

    let (start, end) = find_case_insensitive(document, search.trim())
        .or_else(|| find_whitespace_flexible(document, search))?;

    Some(MatchCandidate::from_span(
        document,
        start,
        end,
        NORMALIZED_SIMILARITY,
        MatchKind::Normalized,
        Strategy::Normalized,
    ))
}

/// ASCII case-insensitive substring search; byte offsets stay valid for
/// `haystack`.
fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    let start = haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())?;
    Some((start, start + needle.len()))
}

/// Match the fragment's words separated by arbitrary whitespace.
fn find_whitespace_flexible(haystack: &str, search: &str) -> Option<(usize, usize)> {
    let words: Vec<&str> = search.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }
    let pattern = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join(r"\s+");
    let re = regex::Regex::new(&pattern).ok()?;
    re.find(haystack).map(|m| (m.start(), m.end()))
}

// ---------------------------------------------------------------------------
// Stage: multiline
// ---------------------------------------------------------------------------

fn multiline(search: &str, document: &str, threshold: f64) -> Vec<MatchCandidate> {
    if !search.contains('\n') {
        return Vec::new();
    }

    let search_lines: Vec<&str> = search
        .trim()
        .split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if search_lines.is_empty() {
        return Vec::new();
    }

    let joined_search = search_lines.join("\n");
    let lines: Vec<&str> = document.split('\n').collect();
    let offsets = line_offsets(&lines);
    let window = search_lines.len();
    let mut results = Vec::new();

    if lines.len() < window {
        return results;
    }

    for i in 0..=lines.len() - window {
        let segment = lines[i..i + window]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n");

        if similarity::ratio_upper_bound(&joined_search, &segment) < threshold {
            continue;
        }
        let score = similarity::similarity(&joined_search, &segment, SimilarityMethod::Ratio);
        if score < threshold {
            continue;
        }

        let start = offsets[i];
        let last = i + window - 1;
        let end = offsets[last] + lines[last].len();
        results.push(MatchCandidate::from_span(
            document,
            start,
            end,
            score,
            MatchKind::FuzzyMultiline,
            Strategy::Multiline,
        ));
    }

    results
}

// ---------------------------------------------------------------------------
// Stage: single_line
// ---------------------------------------------------------------------------

fn single_line(search: &str, document: &str, threshold: f64) -> Option<MatchCandidate> {
    if search.contains('\n') {
        return None;
    }

    let target = search.trim();
    let floor = SINGLE_LINE_FLOOR.max(threshold - SINGLE_LINE_RELAXATION);
    let lines: Vec<&str> = document.split('\n').collect();
    let offsets = line_offsets(&lines);
    let mut best: Option<(usize, f64)> = None;

    for (idx, line) in lines.iter().enumerate() {
        let line = line.trim();
        if similarity::ratio_upper_bound(target, line) < floor {
            continue;
        }
        let score = similarity::similarity(target, line, SimilarityMethod::Ratio);
        if score >= floor && best.is_none_or(|(_, s)| score > s) {
            best = Some((idx, score));
        }
    }

    let (idx, score) = best?;
    let start = offsets[idx];
    Some(MatchCandidate::from_span(
        document,
        start,
        start + lines[idx].len(),
        score,
        MatchKind::FuzzySingleLine,
        Strategy::SingleLine,
    ))
}

// ---------------------------------------------------------------------------
// Stage: token
// ---------------------------------------------------------------------------

fn token(search: &str, document: &str, threshold: f64) -> Option<MatchCandidate> {
    let sorted_search = similarity::sorted_tokens(search);
    let sorted_document = similarity::sorted_tokens(document);
    if sorted_search.is_empty()
        || sorted_document.is_empty()
        || similarity::ratio_upper_bound(&sorted_search, &sorted_document) < threshold
    {
        return None;
    }
    let score = similarity::ratio(&sorted_search, &sorted_document);
    if score < threshold {
        return None;
    }

    let trimmed = search.trim();
    let start = find_case_insensitive(document, trimmed)
        .map(|(start, _)| start)
        .or_else(|| {
            let anchor = trimmed
                .split_whitespace()
                .take(TOKEN_ANCHOR_WORDS)
                .collect::<Vec<_>>()
                .join(" ");
            find_case_insensitive(document, &anchor).map(|(start, _)| start)
        })?;

    let end = floor_char_boundary(document, (start + trimmed.len()).min(document.len()));
    Some(MatchCandidate::from_span(
        document,
        start,
        end,
        score,
        MatchKind::TokenBased,
        Strategy::Token,
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Byte offset of each line's first char, for lines split on `\n`.
fn line_offsets(lines: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(lines.len());
    let mut pos = 0;
    for line in lines {
        offsets.push(pos);
        pos += line.len() + 1;
    }
    offsets
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
