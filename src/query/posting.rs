//! Posting lists and the set algebra used to combine them.
//!
//! A posting list is a sequence of (offset, score) pairs sorted ascending by
//! offset. The merge operations rely on that order and do not re-check it;
//! lists produced by [`crate::codec::offset_score::decode_offset_scores`]
//! always satisfy it. Merges compact the receiving list in place.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ColstoreError, Result};

/// A single posting: a document offset and its relevance score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetScore {
    /// Document offset. Doubles as the row address in the summary table.
    pub offset: u64,
    /// Relevance score.
    pub score: f32,
}

impl OffsetScore {
    /// Create a new posting.
    pub fn new(offset: u64, score: f32) -> Self {
        OffsetScore { offset, score }
    }
}

/// Score comparison used by [`PostingList::retain_by_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOperator {
    /// Keep postings whose score is strictly below the threshold.
    Less,
    /// Keep postings whose score is strictly above the threshold.
    Greater,
}

impl ScoreOperator {
    /// Whether `score` passes the comparison against `threshold`.
    pub fn matches(self, score: f32, threshold: f32) -> bool {
        match self {
            ScoreOperator::Less => score < threshold,
            ScoreOperator::Greater => score > threshold,
        }
    }

    /// The query-syntax character for this operator.
    pub fn as_char(self) -> char {
        match self {
            ScoreOperator::Less => '<',
            ScoreOperator::Greater => '>',
        }
    }
}

impl TryFrom<char> for ScoreOperator {
    type Error = ColstoreError;

    fn try_from(c: char) -> Result<Self> {
        match c {
            '<' => Ok(ScoreOperator::Less),
            '>' => Ok(ScoreOperator::Greater),
            other => Err(ColstoreError::InvalidOperator(other)),
        }
    }
}

impl fmt::Display for ScoreOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// An owned posting list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostingList {
    entries: Vec<OffsetScore>,
}

impl PostingList {
    /// Create an empty posting list.
    pub fn new() -> Self {
        PostingList::default()
    }

    /// Wrap entries that are already sorted ascending by offset.
    pub fn from_sorted(entries: Vec<OffsetScore>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].offset <= w[1].offset));
        PostingList { entries }
    }

    /// Get the length of the posting list.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The postings as a slice.
    pub fn as_slice(&self) -> &[OffsetScore] {
        &self.entries
    }

    /// Get an iterator over the postings.
    pub fn iter(&self) -> std::slice::Iter<'_, OffsetScore> {
        self.entries.iter()
    }

    /// Offsets in current order.
    pub fn offsets(&self) -> Vec<u64> {
        self.entries.iter().map(|p| p.offset).collect()
    }

    /// Consume the list, returning its postings.
    pub fn into_inner(self) -> Vec<OffsetScore> {
        self.entries
    }

    /// Keep only postings whose offset also appears in `other`.
    ///
    /// Surviving postings keep their own score. Returns the new length.
    pub fn intersect(&mut self, other: &PostingList) -> usize {
        let rhs = other.as_slice();
        let mut write = 0;
        let (mut l, mut r) = (0, 0);

        while l < self.entries.len() && r < rhs.len() {
            let (lo, ro) = (self.entries[l].offset, rhs[r].offset);

            if lo == ro {
                self.entries[write] = self.entries[l];
                write += 1;
                l += 1;
                r += 1;
            } else if lo < ro {
                l += 1;
            } else {
                r += 1;
            }
        }

        self.entries.truncate(write);
        write
    }

    /// Drop postings whose offset appears in `other`.
    ///
    /// Returns the new length.
    pub fn subtract(&mut self, other: &PostingList) -> usize {
        let rhs = other.as_slice();
        let mut write = 0;
        let (mut l, mut r) = (0, 0);

        while l < self.entries.len() && r < rhs.len() {
            let (lo, ro) = (self.entries[l].offset, rhs[r].offset);

            if lo == ro {
                l += 1;
                r += 1;
            } else if lo < ro {
                self.entries[write] = self.entries[l];
                write += 1;
                l += 1;
            } else {
                r += 1;
            }
        }

        while l < self.entries.len() {
            self.entries[write] = self.entries[l];
            write += 1;
            l += 1;
        }

        self.entries.truncate(write);
        write
    }

    /// Keep postings whose score satisfies `operator` against `threshold`.
    ///
    /// Relative order is preserved. Returns the new length.
    pub fn retain_by_score(&mut self, operator: ScoreOperator, threshold: f32) -> usize {
        self.entries
            .retain(|posting| operator.matches(posting.score, threshold));
        self.entries.len()
    }

    /// Negate every score, reversing the ranking direction.
    pub fn negate_scores(&mut self) {
        for posting in &mut self.entries {
            posting.score = -posting.score;
        }
    }

    /// Reorder so that scores are non-increasing.
    ///
    /// Not stable with respect to input order: equal scores are ordered by
    /// ascending offset, which makes the result depend only on the set of
    /// postings.
    pub fn sort_by_score_desc(&mut self) {
        quicksort_desc(&mut self.entries);
    }

    /// Shorten the list to at most `len` postings.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }
}

impl From<Vec<OffsetScore>> for PostingList {
    fn from(mut entries: Vec<OffsetScore>) -> Self {
        entries.sort_by_key(|p| p.offset);
        PostingList { entries }
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a OffsetScore;
    type IntoIter = std::slice::Iter<'a, OffsetScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Quicksort by descending score.
///
/// The pivot is the middle element of the current span. The left partition
/// is sorted recursively and the right one by looping, which bounds the
/// recursion to the left-hand side.
fn quicksort_desc(mut data: &mut [OffsetScore]) {
    while data.len() >= 2 {
        let span = std::mem::take(&mut data);
        let middle = span.len() / 2;
        let pivot_index = partition_desc(span, middle);

        let (left, right) = span.split_at_mut(pivot_index);
        quicksort_desc(left);
        data = &mut right[1..];
    }
}

/// Ranking order: higher score first, lower offset first among equal scores.
fn ranks_before(a: &OffsetScore, b: &OffsetScore) -> bool {
    a.score > b.score || (a.score == b.score && a.offset < b.offset)
}

/// Partition around `data[pivot_index]`, moving higher-ranked postings to
/// the left. Returns the pivot's final index.
fn partition_desc(data: &mut [OffsetScore], pivot_index: usize) -> usize {
    let last = data.len() - 1;
    data.swap(pivot_index, last);
    let pivot = data[last];

    let mut store_index = 0;
    for i in 0..last {
        if ranks_before(&data[i], &pivot) {
            data.swap(store_index, i);
            store_index += 1;
        }
    }

    data.swap(store_index, last);
    store_index
}
