//! Key-range partitioning for chunked steps.
//!
//! A population `[min, max]` is split into disjoint, contiguous, ascending
//! ranges no wider than the chunk size. Ranges are produced lazily so a
//! step over millions of rows never materializes its task list.

use serde::{Deserialize, Serialize};

use super::step::{ChunkPlan, Operation};
use crate::error::{Result, UpgradeError};

/// Inclusive key interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: i64,
    pub end: i64,
}

impl KeyRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Number of keys covered.
    pub fn width(&self) -> u64 {
        (i128::from(self.end) - i128::from(self.start) + 1).max(0) as u64
    }

    pub fn contains(&self, key: i64) -> bool {
        self.start <= key && key <= self.end
    }
}

/// One chunk of a chunked step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkTask {
    pub title: String,
    pub range: KeyRange,
    pub action: Operation,
}

impl ChunkTask {
    pub fn range_start(&self) -> i64 {
        self.range.start
    }

    pub fn range_end(&self) -> i64 {
        self.range.end
    }
}

/// Lazy iterator over the ranges covering `[min, max]`.
#[derive(Debug, Clone)]
pub struct Partition {
    next: Option<i64>,
    max: i64,
    span: i64,
}

impl Iterator for Partition {
    type Item = KeyRange;

    fn next(&mut self) -> Option<KeyRange> {
        let start = self.next?;
        if start > self.max {
            self.next = None;
            return None;
        }

        let end = start.saturating_add(self.span).min(self.max);
        // `end == i64::MAX` leaves nothing above it.
        self.next = end.checked_add(1);
        Some(KeyRange { start, end })
    }
}

/// Split `[min, max]` into ranges of at most `chunk_size` keys.
///
/// `min > max` yields no ranges.
pub fn partition(min: i64, max: i64, chunk_size: u64) -> Result<Partition> {
    if chunk_size == 0 {
        return Err(UpgradeError::Configuration(
            "chunk size must be at least 1".into(),
        ));
    }

    let span = i64::try_from(chunk_size - 1).unwrap_or(i64::MAX);
    Ok(Partition {
        next: Some(min),
        max,
        span,
    })
}

/// Number of ranges `partition` would produce.
pub fn chunk_count(min: i64, max: i64, chunk_size: u64) -> u64 {
    if min > max || chunk_size == 0 {
        return 0;
    }
    let keys = i128::from(max) - i128::from(min) + 1;
    let size = i128::from(chunk_size);
    u64::try_from((keys + size - 1) / size).unwrap_or(u64::MAX)
}

impl ChunkPlan {
    /// Build the chunk tasks for the bounds read at step start.
    pub fn tasks(
        &self,
        min: i64,
        max: i64,
        default_chunk_size: u64,
    ) -> Result<impl Iterator<Item = ChunkTask> + '_> {
        let size = self.chunk_size.unwrap_or(default_chunk_size);
        Ok(partition(min, max, size)?.map(move |range| ChunkTask {
            title: self.title_for(range),
            range,
            action: self.action.clone(),
        }))
    }
}
