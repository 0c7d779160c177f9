//! Normalized candidate distance: edit distance over rendered paths, with a
//! score-gap fallback.
//!
//! The metric is distance-like: `0.0` means identical, `1.0` maximally
//! dissimilar. [`similarity`] is its complement and is what the selector's
//! threshold ladder compares against.

#![allow(clippy::cast_precision_loss)]

use super::candidate::{Candidate, PathStep};

/// Separator between rendered path steps.
pub const PATH_DELIMITER: char = ',';

/// Render a path as `"{hex}_{line}"` tokens joined by [`PATH_DELIMITER`].
#[must_use]
pub fn render_path(path: &[PathStep]) -> String {
    let mut out = String::with_capacity(path.len() * 5);
    for (i, step) in path.iter().enumerate() {
        if i > 0 {
            out.push(PATH_DELIMITER);
        }
        out.push_str(&step.hex.to_string());
        out.push('_');
        out.push_str(&step.line.to_string());
    }
    out
}

/// Levenshtein edit distance with a two-row rolling buffer sized to the
/// shorter input.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    if a == b {
        return 0;
    }
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let cost = usize::from(sc != lc);
            curr[j + 1] = (curr[j] + 1).min(prev[j + 1] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}

/// Edit distance normalized by the longer input length (minimum 1).
#[must_use]
pub fn normalized_levenshtein(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count()).max(1);
    levenshtein(a, b) as f64 / max_len as f64
}

/// Distance in `[0, 1]` between two candidates.
///
/// Path edit distance when both carry a path, otherwise the relative score
/// gap `|s1 - s2| / max(s1, s2, 1)`.
#[must_use]
pub fn distance(a: &Candidate, b: &Candidate) -> f64 {
    if let (Some(pa), Some(pb)) = (&a.path, &b.path) {
        return normalized_levenshtein(&render_path(pa), &render_path(pb));
    }
    score_gap(a.total_score, b.total_score)
}

/// [`distance`] over pre-rendered paths, for callers comparing the same
/// candidates many times.
pub(crate) fn rendered_distance(
    a_path: Option<&str>,
    a_score: f64,
    b_path: Option<&str>,
    b_score: f64,
) -> f64 {
    match (a_path, b_path) {
        (Some(pa), Some(pb)) => normalized_levenshtein(pa, pb),
        _ => score_gap(a_score, b_score),
    }
}

fn score_gap(s1: f64, s2: f64) -> f64 {
    let scale = s1.max(s2).max(1.0);
    ((s1 - s2).abs() / scale).clamp(0.0, 1.0)
}

/// Complement of [`distance`]: `1.0` for identical candidates.
///
/// The selector compares this against the threshold ladder. Callers wanting
/// the distance-like value (`0.0` for identical) should use [`distance`].
#[must_use]
pub fn similarity(a: &Candidate, b: &Candidate) -> f64 {
    1.0 - distance(a, b)
}

/// Mean pairwise distance of a selection; `0.0` when fewer than two items.
#[must_use]
pub fn diversity_score(selected: &[Candidate]) -> f64 {
    if selected.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0;
    let mut pairs = 0_usize;
    for (i, a) in selected.iter().enumerate() {
        for b in &selected[i + 1..] {
            total += distance(a, b);
            pairs += 1;
        }
    }
    total / pairs as f64
}
