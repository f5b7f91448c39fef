//! 🔪 Chunk planning: slicing one enormous object into bite-sized byte ranges.
//!
//! The object is too big to swallow whole (500MB per bite by default, and the
//! object may have a lot of bites). So we ask HEAD how long it is, divide, round up,
//! and walk the ranges front to back. No overlap. No gaps. No drama.
//!
//! 🧠 Knowledge graph:
//! - `ObjectLocation`: bucket + key. Where the thing lives.
//! - `ObjectDescriptor`: location + total length. Queried once per run, immutable after.
//! - `Chunk`: `[start, end)` plus its ordinal. Created, fetched once, dropped.
//! - `ChunkPlan`: iterator producing `ceil(len / chunk_size)` chunks covering `[0, len)`.

use std::fmt;
use std::ops::Range;

use anyhow::{Result, ensure};

/// 🗺️ Where an object lives: a bucket (or container, or directory) and a key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// 📏 An object plus the length HEAD reported for it. Fixed for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub location: ObjectLocation,
    pub len: u64,
}

/// 🍰 One slice of the object: ordinal index and the half-open byte range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// 🚶 Walks an object front to back, one `Chunk` at a time.
///
/// Yields exactly `ceil(object_len / chunk_size)` chunks. An empty object yields none,
/// which sends the driver straight to the flush. The last chunk is clamped to the object
/// length, so it may be shorter than `chunk_size`.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    object_len: u64,
    chunk_size: u64,
    next_index: u64,
}

impl ChunkPlan {
    pub fn new(object_len: u64, chunk_size: u64) -> Result<Self> {
        // 💀 zero-byte chunks would have us loop until the heat death of the universe
        ensure!(
            chunk_size > 0,
            "💀 Chunk size must be positive. A chunk of nothing is still nothing, forever."
        );
        Ok(Self {
            object_len,
            chunk_size,
            next_index: 0,
        })
    }

    /// 🔢 How many chunks the whole plan contains: `ceil(len / size)`.
    pub fn chunk_count(&self) -> u64 {
        self.object_len.div_ceil(self.chunk_size)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let start = self.next_index.checked_mul(self.chunk_size)?;
        if start >= self.object_len {
            return None;
        }
        let end = start.saturating_add(self.chunk_size).min(self.object_len);
        let chunk = Chunk {
            index: self.next_index,
            start,
            end,
        };
        self.next_index += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.chunk_count().saturating_sub(self.next_index);
        let remaining = usize::try_from(remaining).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(len: u64, size: u64) -> Vec<Chunk> {
        ChunkPlan::new(len, size)
            .expect("💀 positive chunk size should always plan")
            .collect()
    }

    #[test]
    fn the_one_where_the_chunks_tile_the_object_without_gaps() {
        // 🧪 a grid of awkward lengths and sizes: primes, exact multiples, one-byte chunks
        for len in [1u64, 2, 7, 99, 100, 101, 1000, 1009] {
            for size in [1u64, 3, 7, 100, 1024] {
                let chunks = plan(len, size);
                assert_eq!(chunks.len() as u64, len.div_ceil(size), "len={len} size={size}");

                let mut cursor = 0;
                for (i, chunk) in chunks.iter().enumerate() {
                    assert_eq!(chunk.index, i as u64);
                    assert_eq!(chunk.start, cursor, "gap or overlap at chunk {i}");
                    assert!(chunk.len() > 0 && chunk.len() <= size);
                    cursor = chunk.end;
                }
                assert_eq!(cursor, len, "plan must end exactly at the object length");
            }
        }
    }

    #[test]
    fn the_one_where_an_exact_multiple_does_not_grow_a_phantom_chunk() {
        let chunks = plan(300, 100);
        assert_eq!(
            chunks,
            vec![
                Chunk { index: 0, start: 0, end: 100 },
                Chunk { index: 1, start: 100, end: 200 },
                Chunk { index: 2, start: 200, end: 300 },
            ]
        );
    }

    #[test]
    fn the_one_where_an_empty_object_has_no_chunks_at_all() {
        assert!(plan(0, 100).is_empty());
        assert_eq!(ChunkPlan::new(0, 100).map(|p| p.chunk_count()).ok(), Some(0));
    }

    #[test]
    fn the_one_where_zero_chunk_size_gets_bounced_at_the_door() {
        assert!(ChunkPlan::new(10, 0).is_err());
    }

    #[test]
    fn the_one_where_size_hint_tracks_what_is_left() {
        let mut the_plan = ChunkPlan::new(250, 100).expect("💀 valid plan");
        assert_eq!(the_plan.size_hint(), (3, Some(3)));
        the_plan.next();
        assert_eq!(the_plan.size_hint(), (2, Some(2)));
    }

    #[test]
    fn the_one_where_locations_display_like_paths() {
        assert_eq!(ObjectLocation::new("newbucket", "t1.txt").to_string(), "newbucket/t1.txt");
    }
}
