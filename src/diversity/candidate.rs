//! Scenario candidates fed to the diversity selector.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;
use crate::rng::lcg::DeterministicRandom;

/// One step of a symbolic scenario path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    /// Hexagram number (1..=64 in generated pools).
    pub hex: u32,
    /// Changing line (1..=6 in generated pools).
    pub line: u32,
}

impl PathStep {
    /// Step at `hex`, changing `line`.
    #[must_use]
    pub const fn new(hex: u32, line: u32) -> Self {
        Self { hex, line }
    }
}

/// A scored scenario competing for a slot in a diverse selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Stable identifier, unique within a pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Positional index, the sort key of last resort when `id` is absent.
    #[serde(default)]
    pub index: usize,
    /// Ranking score; higher sorts first.
    #[serde(default)]
    pub total_score: f64,
    /// Symbolic path; candidates without one are compared by score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<PathStep>>,
    /// Free-form numeric annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, f64>,
}

impl Candidate {
    /// Candidate with an id, score, and path.
    #[must_use]
    pub fn new(id: impl Into<String>, index: usize, total_score: f64, path: Vec<PathStep>) -> Self {
        Self {
            id: Some(id.into()),
            index,
            total_score,
            path: Some(path),
            metadata: BTreeMap::new(),
        }
    }

    /// Identity used for deterministic ordering: `id`, or the index rendered as text.
    #[must_use]
    pub fn sort_key(&self) -> Cow<'_, str> {
        self.id
            .as_deref()
            .map_or_else(|| Cow::Owned(self.index.to_string()), Cow::Borrowed)
    }

    /// Synthesize a random candidate pool from the generator.
    ///
    /// Scores are uniform in `[0, 100)`, paths have 3..=8 steps with
    /// hexagrams in 1..=64 and lines in 1..=6.
    pub fn synthesize_pool(rng: &mut DeterministicRandom, count: usize) -> Result<Vec<Self>> {
        let mut pool = Vec::with_capacity(count);
        for index in 0..count {
            let total_score = rng.next_float(0.0, 100.0)?;
            let path = random_path(rng)?;
            let mut metadata = BTreeMap::new();
            metadata.insert("risk".to_string(), rng.next_float(0.0, 100.0)?);
            metadata.insert("potential".to_string(), rng.next_float(0.0, 100.0)?);
            pool.push(Self {
                id: Some(format!("scenario_{index}")),
                index,
                total_score,
                path: Some(path),
                metadata,
            });
        }
        Ok(pool)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn random_path(rng: &mut DeterministicRandom) -> Result<Vec<PathStep>> {
    let len = rng.next_int(3, 8)?;
    let mut path = Vec::with_capacity(len as usize);
    for _ in 0..len {
        let hex = rng.next_int(1, 64)? as u32;
        let line = rng.next_int(1, 6)? as u32;
        path.push(PathStep { hex, line });
    }
    Ok(path)
}
