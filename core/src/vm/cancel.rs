//! Deferred, batched cancellation of abandoned branches.
//!
//! Guards only widen the pending [`CancellationRange`]; the actual cancel calls and requests are issued
//! when the range is drained, right before the next node is invoked or during cleanup.

use tracing::{trace, warn};

use super::entry::PersistentStateChange;
use super::monitor::{Monitor, MonitorFlags};
use super::request::ActionRequest;
use super::seek::seek;
use super::{Tick, Vm};
use crate::shape::{Shape, ShapeAtom, ShapeAtomIndex};
use crate::state::ExecutionState;

/// Half-open span `[begin, end)` of shape-atom indices whose outstanding actions must be canceled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancellationRange {
    pub begin: ShapeAtomIndex,
    pub end: ShapeAtomIndex,
}

impl CancellationRange {
    pub const EMPTY: CancellationRange = CancellationRange { begin: 0, end: 0 };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin >= self.end
    }

    #[inline]
    pub fn contains(&self, index: ShapeAtomIndex) -> bool {
        self.begin <= index && index < self.end
    }

    /// Grow to cover `[begin, end)` as well. An empty input leaves the range untouched.
    pub fn adapt(&mut self, begin: ShapeAtomIndex, end: ShapeAtomIndex) {
        if begin >= end {
            return;
        }
        if self.is_empty() {
            *self = CancellationRange { begin, end };
        } else {
            self.begin = self.begin.min(begin);
            self.end = self.end.max(end);
        }
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = CancellationRange::EMPTY;
    }
}

impl Vm {
    /// Cancel every outstanding action inside the pending range, then forget the range.
    ///
    /// Two sources are walked together, highest index first: action states emitted earlier this tick
    /// (a suffix of the scratch stack, truncated afterwards) and the actor's previous-tick states that
    /// were not reached (skipped by advancing the actor cursor past them).
    pub(super) fn drain_cancellation_range<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) {
        let range = self.cancellation_range;
        if range.is_empty() {
            return;
        }
        self.cancellation_range.clear();

        let scratch_begin = self
            .action_states
            .as_slice()
            .partition_point(|entry| entry.shape_atom_index < range.begin);
        let mut scratch_top = self.action_states.len();
        debug_assert!(
            self.action_states.as_slice()[scratch_begin..]
                .iter()
                .all(|entry| range.contains(entry.shape_atom_index)),
            "scratch action states past the cancellation range"
        );

        let actor_indices = tick.actor.action_state_shape_atom_indices();
        seek(&mut self.actor_action_state_cursor, range.begin, actor_indices);
        let actor_begin = self.actor_action_state_cursor;
        let actor_end = actor_begin + actor_indices[actor_begin..].partition_point(|&index| index < range.end);
        self.actor_action_state_cursor = actor_end;
        let mut actor_top = actor_end;

        let mut canceled = 0usize;
        while scratch_top > scratch_begin || actor_top > actor_begin {
            let scratch_next = (scratch_top > scratch_begin).then(|| self.action_states.as_slice()[scratch_top - 1]);
            let actor_next = (actor_top > actor_begin).then(|| {
                (
                    tick.actor.action_state_shape_atom_indices()[actor_top - 1],
                    tick.actor.action_states()[actor_top - 1],
                )
            });

            let (index, cancel) = match (scratch_next, actor_next) {
                (Some(entry), Some((actor_index, _))) if entry.shape_atom_index > actor_index => {
                    scratch_top -= 1;
                    (entry.shape_atom_index, cancels_scratch_entry(tick.shape, entry.shape_atom_index, entry.state))
                }
                (Some(entry), None) => {
                    scratch_top -= 1;
                    (entry.shape_atom_index, cancels_scratch_entry(tick.shape, entry.shape_atom_index, entry.state))
                }
                (_, Some((actor_index, state))) => {
                    actor_top -= 1;
                    (actor_index, state.is_active())
                }
                (None, None) => break,
            };
            if cancel {
                self.cancel_action(tick, index);
                canceled += 1;
            }
        }

        self.action_states.truncate(scratch_begin);
        trace!(
            target: "liz::vm::cancel",
            begin = range.begin,
            end = range.end,
            canceled,
            "vm.drain_cancellation_range"
        );
    }

    fn cancel_action<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>, index: ShapeAtomIndex) {
        let Some(atom) = tick.shape.atom(index) else {
            warn!(target: "liz::vm::cancel", index, "cancel requested for an atom outside the shape");
            return;
        };
        self.notify(tick, index, MonitorFlags::CANCEL | MonitorFlags::ENTER);
        match atom {
            ShapeAtom::ImmediateAction { function_index } => {
                if let Some(action) = tick.shape.immediate_action(function_index) {
                    let returned = action(
                        &mut *tick.blackboard,
                        &mut tick.actor.header.random_seed,
                        tick.time,
                        ExecutionState::Cancel,
                    );
                    if returned != ExecutionState::Cancel {
                        warn!(
                            target: "liz::vm::cancel",
                            index,
                            ?returned,
                            "immediate action did not acknowledge cancel"
                        );
                    }
                }
            }
            ShapeAtom::DeferredAction {
                action_id,
                resource_id,
            } => {
                if self.action_requests.is_full() {
                    debug_assert!(false, "action request queue full while canceling atom {index}");
                    warn!(target: "liz::vm::request", index, "action request queue full, cancel dropped");
                } else {
                    self.action_requests.push_cancel(ActionRequest {
                        action_id,
                        resource_id,
                        shape_atom_index: index,
                    });
                    trace!(target: "liz::vm::request", index, action_id, "vm.request.cancel");
                }
            }
            ShapeAtom::PersistentAction { .. } => {
                if self.persistent_state_changes.is_full() {
                    debug_assert!(false, "persistent state change buffer full while canceling atom {index}");
                    warn!(target: "liz::vm::cancel", index, "persistent state change dropped");
                } else {
                    self.persistent_state_changes.push(PersistentStateChange {
                        shape_atom_index: index,
                        state: ExecutionState::Cancel,
                    });
                }
            }
            _ => debug_assert!(false, "decider at {index} carries no action state"),
        }
        self.notify(tick, index, MonitorFlags::CANCEL | MonitorFlags::LEAVE);
    }
}

/// Entries emitted this tick need a cancel unless they are fresh deferred launches: those launch
/// requests were already rolled back, so the action never started.
fn cancels_scratch_entry<B>(shape: &Shape<B>, index: ShapeAtomIndex, state: ExecutionState) -> bool {
    match state {
        ExecutionState::Running => true,
        ExecutionState::Launch => !matches!(shape.atom(index), Some(ShapeAtom::DeferredAction { .. })),
        _ => false,
    }
}
