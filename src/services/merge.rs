use std::collections::HashSet;

use crate::models::{HasSongId, SongId};

/// Merges two ranked lists by alternating between them
///
/// Round `i` looks at `a[i]` then `b[i]` and keeps each item whose id has not
/// been seen yet. Stops as soon as `want` items are collected or both lists
/// are exhausted. Relative order within each source is preserved.
pub fn interleave_dedup<T: HasSongId + Clone>(a: &[T], b: &[T], want: usize) -> Vec<T> {
    let mut merged = Vec::with_capacity(want.min(a.len() + b.len()));
    let mut seen: HashSet<SongId> = HashSet::new();
    let rounds = a.len().max(b.len());

    for i in 0..rounds {
        for source in [a, b] {
            if merged.len() >= want {
                return merged;
            }
            if let Some(item) = source.get(i) {
                if seen.insert(item.song_id()) {
                    merged.push(item.clone());
                }
            }
        }
    }

    merged.truncate(want);
    merged
}
