//! Pluggable name similarity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Similarity between two normalized names, in `[0, 1]`.
///
/// Implementations must be deterministic.
pub trait NameSimilarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;

    fn name(&self) -> &'static str;
}

/// Jaro-Winkler over the names with their tokens sorted.
///
/// Word order does not matter, but an extra token always costs something,
/// so a short name is never absorbed by a longer one that merely contains it.
/// The shared-prefix boost applies at every Jaro level, so "vanguard" and
/// "vaneck" land in the curation band instead of looking unrelated.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSortJaroWinkler;

impl NameSimilarity for TokenSortJaroWinkler {
    fn score(&self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        prefix_weighted_jaro(&sorted_tokens(a), &sorted_tokens(b))
    }

    fn name(&self) -> &'static str {
        "token_sort_jaro_winkler"
    }
}

/// Token-set ratio with Jaro-Winkler as the base comparison.
///
/// Scores the shared tokens against each side's full token set and keeps the
/// best, so a name that is a token subset of another scores 1.0. Looser than
/// [`TokenSortJaroWinkler`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSetRatio;

impl NameSimilarity for TokenSetRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let left: BTreeSet<&str> = a.split_whitespace().collect();
        let right: BTreeSet<&str> = b.split_whitespace().collect();
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let shared = left.intersection(&right).copied().collect::<Vec<_>>().join(" ");
        let only_left = left.difference(&right).copied().collect::<Vec<_>>().join(" ");
        let only_right = right.difference(&left).copied().collect::<Vec<_>>().join(" ");

        let combined_left = join_nonempty(&shared, &only_left);
        let combined_right = join_nonempty(&shared, &only_right);

        let mut best = prefix_weighted_jaro(&combined_left, &combined_right);
        if !shared.is_empty() {
            best = best
                .max(prefix_weighted_jaro(&shared, &combined_left))
                .max(prefix_weighted_jaro(&shared, &combined_right));
        }
        best
    }

    fn name(&self) -> &'static str {
        "token_set_ratio"
    }
}

/// Which similarity function the resolver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityKind {
    #[default]
    TokenSort,
    TokenSet,
}

impl SimilarityKind {
    pub fn build(self) -> Box<dyn NameSimilarity> {
        match self {
            SimilarityKind::TokenSort => Box::new(TokenSortJaroWinkler),
            SimilarityKind::TokenSet => Box::new(TokenSetRatio),
        }
    }
}

/// Longest common prefix counted by the Winkler boost.
const MAX_PREFIX: usize = 4;

/// Weight of each shared prefix character.
const PREFIX_SCALE: f64 = 0.1;

/// Jaro similarity with the Winkler prefix boost.
///
/// `strsim::jaro_winkler` only boosts pairs whose Jaro score is above 0.7.
/// Here the boost is unconditional, which can lift a pair at most to
/// `0.7 + 0.4 * 0.3 = 0.82`, still below any sensible merge threshold.
/// Above 0.7 the two agree exactly.
fn prefix_weighted_jaro(a: &str, b: &str) -> f64 {
    let jaro = strsim::jaro(a, b);
    let prefix = a
        .chars()
        .zip(b.chars())
        .take(MAX_PREFIX)
        .take_while(|(x, y)| x == y)
        .count();
    jaro + PREFIX_SCALE * prefix as f64 * (1.0 - jaro)
}

fn sorted_tokens(name: &str) -> String {
    let mut tokens: Vec<&str> = name.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn join_nonempty(a: &str, b: &str) -> String {
    match (a.is_empty(), b.is_empty()) {
        (true, _) => b.to_string(),
        (_, true) => a.to_string(),
        _ => format!("{} {}", a, b),
    }
}
