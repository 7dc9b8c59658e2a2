//! Score-ordered member set backing the in-process store.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;

use crate::time::{TimeRange, Timestamp};

/// A set of unique members ordered by `(score, member)`.
///
/// # Invariants
///
/// - `scores` and `ordered` always hold the same members.
/// - Each member appears in `ordered` exactly once, with its current score.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    scores: HashMap<String, i64>,
    ordered: BTreeSet<(i64, String)>,
}

impl SortedSet {
    /// Insert or re-score a member.
    ///
    /// Returns `true` if the member was newly added.
    pub fn insert(&mut self, member: &str, score: i64) -> bool {
        let Some(old) = self.scores.insert(member.to_string(), score) else {
            self.ordered.insert((score, member.to_string()));
            return true;
        };
        if old != score {
            self.ordered.remove(&(old, member.to_string()));
            self.ordered.insert((score, member.to_string()));
        }
        false
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove(&mut self, member: &str) -> bool {
        self.scores.remove(member).is_some_and(|score| {
            self.ordered.remove(&(score, member.to_string()));
            true
        })
    }

    /// Current score of a member.
    #[must_use]
    pub fn score(&self, member: &str) -> Option<i64> {
        self.scores.get(member).copied()
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Number of members with a score in `range`.
    #[must_use]
    pub fn count(&self, range: &TimeRange) -> usize {
        self.in_range(range).count()
    }

    /// Members in `range` ordered by score, skipping `offset` and taking at
    /// most `count`.
    #[must_use]
    pub fn range(&self, range: &TimeRange, offset: usize, count: usize) -> Vec<String> {
        self.in_range(range)
            .skip(offset)
            .take(count)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn in_range<'a>(
        &'a self,
        range: &TimeRange,
    ) -> impl Iterator<Item = &'a (i64, String)> + use<'a> {
        // (score, "") sorts before every member with that score.
        let start = range.from.map_or(Bound::Unbounded, |from| {
            Bound::Included((from.as_nanos(), String::new()))
        });
        let max = range.to.map(Timestamp::as_nanos);

        self.ordered
            .range((start, Bound::Unbounded))
            .take_while(move |(score, _)| max.is_none_or(|max| *score <= max))
    }
}
