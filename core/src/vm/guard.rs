use super::entry::DeciderStateEntry;
use super::sort::SortSlot;
use crate::shape::{ShapeAtom, ShapeAtomIndex};
use crate::state::ExecutionState;

/// Kind-specific bookkeeping of an open decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardScratch {
    /// Child to resume at when the sequence yields `Running`.
    Sequence { reached_child: ShapeAtomIndex },
    DynamicPriority,
    /// Result reported once every child has been visited without a failure.
    Concurrent { aggregate: ExecutionState },
}

/// Record of a decider between entering it and leaving it.
///
/// The markers snapshot the decider-state and launch-request counts at entry so a failing concurrent
/// decider can erase whatever its earlier children emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeciderGuard {
    pub shape_atom_index: ShapeAtomIndex,
    pub end_index: ShapeAtomIndex,
    pub decider_state_marker: usize,
    pub launch_request_marker: usize,
    pub scratch: GuardScratch,
}

impl DeciderGuard {
    pub(crate) const EMPTY: Self = Self {
        shape_atom_index: 0,
        end_index: 0,
        decider_state_marker: 0,
        launch_request_marker: 0,
        scratch: GuardScratch::DynamicPriority,
    };

    /// Guard for the decider `atom` at `shape_atom_index`. Returns `None` for actions.
    pub fn open(
        shape_atom_index: ShapeAtomIndex,
        atom: ShapeAtom,
        first_child: ShapeAtomIndex,
        decider_state_marker: usize,
        launch_request_marker: usize,
    ) -> Option<Self> {
        let (end_index, scratch) = match atom {
            ShapeAtom::SequenceDecider { end_index } => (
                end_index,
                GuardScratch::Sequence {
                    reached_child: first_child,
                },
            ),
            ShapeAtom::DynamicPriorityDecider { end_index } => (end_index, GuardScratch::DynamicPriority),
            ShapeAtom::ConcurrentDecider { end_index } => (
                end_index,
                GuardScratch::Concurrent {
                    aggregate: ExecutionState::Success,
                },
            ),
            _ => return None,
        };
        Some(Self {
            shape_atom_index,
            end_index,
            decider_state_marker,
            launch_request_marker,
            scratch,
        })
    }

    #[inline]
    pub fn first_child(&self) -> ShapeAtomIndex {
        self.shape_atom_index + 1
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.end_index > self.first_child()
    }

    /// Decider result once it stops visiting children, given the last child's result.
    pub fn result(&self, child_state: ExecutionState) -> ExecutionState {
        match self.scratch {
            GuardScratch::Concurrent { aggregate } if child_state != ExecutionState::Fail => aggregate,
            _ => child_state,
        }
    }
}

/// Guard storage is idle during cleanup, so decider states park in it as resumable sequence guards.
impl SortSlot<DeciderStateEntry> for DeciderGuard {
    #[inline]
    fn park(&mut self, entry: DeciderStateEntry) {
        *self = Self {
            shape_atom_index: entry.shape_atom_index,
            scratch: GuardScratch::Sequence {
                reached_child: entry.state,
            },
            ..Self::EMPTY
        };
    }

    #[inline]
    fn parked(&self) -> DeciderStateEntry {
        let state = match self.scratch {
            GuardScratch::Sequence { reached_child } => reached_child,
            _ => 0,
        };
        DeciderStateEntry {
            shape_atom_index: self.shape_atom_index,
            state,
        }
    }
}
