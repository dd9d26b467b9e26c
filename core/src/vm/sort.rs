//! Linear-time reorder of entries emitted in post-order into ascending shape-atom order.
//!
//! Deciders close after all of their descendants, and descendants carry larger indices, so the emitted
//! sequence is a concatenation of descending runs. Reading it back-to-front, every entry is preceded only
//! by its ancestors and by later subtrees. A stack holding the current ancestor chain is therefore enough
//! to emit entries from largest to smallest, and its depth never exceeds the tree depth.

use super::entry::AtomKeyed;
use crate::lookaside::LookasideStack;

/// Scratch slot that can park one entry while the reorder holds it back.
///
/// Any entry parks in a slot of its own type; other buffers can be lent to the reorder by implementing
/// this for their element type.
pub trait SortSlot<T>: Copy {
    fn park(&mut self, entry: T);
    fn parked(&self) -> T;
}

impl<T: AtomKeyed> SortSlot<T> for T {
    #[inline]
    fn park(&mut self, entry: T) {
        *self = entry;
    }

    #[inline]
    fn parked(&self) -> T {
        *self
    }
}

/// Sort `entries` ascending in place using `stack` as scratch.
///
/// Returns `false` when `entries` turned out not to be a post-order emission (the stack overflowed or
/// the output came out of order); a general in-place sort is used instead in that case.
pub fn reorder_post_order<T: AtomKeyed, S: SortSlot<T>>(entries: &mut [T], stack: &mut [S]) -> bool {
    let mut held = LookasideStack::new(stack.len());
    let mut write = entries.len();
    let mut in_order = true;

    for read in (0..entries.len()).rev() {
        let current = entries[read];
        let key = current.shape_atom_index();

        while !held.is_empty() && stack[held.top_index()].parked().shape_atom_index() > key {
            let top = held.pop();
            write -= 1;
            entries[write] = stack[top].parked();
            in_order &= write + 1 == entries.len()
                || entries[write].shape_atom_index() < entries[write + 1].shape_atom_index();
        }

        if held.is_full() {
            // The gap [read, write) is exactly large enough for the held entries plus `current`.
            let count = held.count();
            for (slot, held_entry) in entries[read..read + count].iter_mut().zip(stack[..count].iter()) {
                *slot = held_entry.parked();
            }
            entries[read + count] = current;
            entries.sort_unstable_by_key(|entry| entry.shape_atom_index());
            return false;
        }
        let slot = held.push();
        stack[slot].park(current);
    }

    while !held.is_empty() {
        let top = held.pop();
        write -= 1;
        entries[write] = stack[top].parked();
        in_order &=
            write + 1 == entries.len() || entries[write].shape_atom_index() < entries[write + 1].shape_atom_index();
    }
    debug_assert_eq!(write, 0);

    if !in_order {
        entries.sort_unstable_by_key(|entry| entry.shape_atom_index());
    }
    in_order
}
