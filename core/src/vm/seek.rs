//! Forward-only lookups in ascending key arrays.
//!
//! Within one tick the VM asks for shape-atom indices in increasing order, so each sparse array is
//! scanned at most once per tick by resuming from a saved cursor.

use crate::shape::ShapeAtomIndex;

/// Advance `cursor` to the first key `>= key` and report whether it is an exact match.
#[inline]
pub fn seek(cursor: &mut usize, key: ShapeAtomIndex, keys: &[ShapeAtomIndex]) -> bool {
    while *cursor < keys.len() && keys[*cursor] < key {
        *cursor += 1;
    }
    *cursor < keys.len() && keys[*cursor] == key
}

/// Step past the entry a successful [`seek`] stopped on so it is never read again this tick.
#[inline]
pub fn consume(cursor: &mut usize, key: ShapeAtomIndex, keys: &[ShapeAtomIndex]) {
    debug_assert_eq!(keys.get(*cursor), Some(&key), "consume without a matching seek");
    *cursor += 1;
}

/// [`seek`] followed by [`consume`] on a hit; returns the position of the consumed entry.
#[inline]
pub fn seek_and_consume(cursor: &mut usize, key: ShapeAtomIndex, keys: &[ShapeAtomIndex]) -> Option<usize> {
    if seek(cursor, key, keys) {
        let position = *cursor;
        consume(cursor, key, keys);
        Some(position)
    } else {
        None
    }
}
