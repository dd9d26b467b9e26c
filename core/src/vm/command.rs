//! The traversal state machine.
//!
//! `Invoke` visits the atom under the cursor, `Guard` feeds the last result into the innermost open
//! decider and decides whether to descend into the next child or ascend, `Cleanup` drains pending
//! cancellations and puts the emitted state back into ascending atom order.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::entry::{ActionStateEntry, DeciderStateEntry};
use super::guard::{DeciderGuard, GuardScratch};
use super::monitor::{Monitor, MonitorFlags};
use super::request::ActionRequest;
use super::seek::seek_and_consume;
use super::sort::reorder_post_order;
use super::{Tick, Vm};
use crate::actor::{Actor, DeciderState};
use crate::shape::{ShapeAtom, ShapeAtomIndex};
use crate::state::ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VmCommand {
    Invoke,
    Guard,
    Cleanup,
    Done,
    /// The traversal could not continue (cursor outside the shape, guard stack overflow).
    Error,
}

impl VmCommand {
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, VmCommand::Done | VmCommand::Error)
    }
}

impl Vm {
    pub(super) fn dispatch<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) -> VmCommand {
        trace!(
            target: "liz::vm::traverse",
            command = ?self.command,
            index = self.shape_atom_index,
            state = ?self.execution_state,
            "vm.step"
        );
        match self.command {
            VmCommand::Invoke => self.invoke(tick),
            VmCommand::Guard => self.guard(tick),
            VmCommand::Cleanup => self.cleanup(tick),
            terminal @ (VmCommand::Done | VmCommand::Error) => terminal,
        }
    }

    fn invoke<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) -> VmCommand {
        let index = self.shape_atom_index;
        let Some(atom) = tick.shape.atom(index) else {
            warn!(target: "liz::vm::traverse", index, atoms = tick.shape.len(), "invoke past the end of the shape");
            return VmCommand::Error;
        };
        self.notify(tick, index, MonitorFlags::ENTER | MonitorFlags::FROM_TOP);

        let result = match atom {
            ShapeAtom::ImmediateAction { function_index } => self.invoke_immediate_action(tick, index, function_index),
            ShapeAtom::DeferredAction {
                action_id,
                resource_id,
            } => self.invoke_deferred_action(tick.actor, index, action_id, resource_id),
            ShapeAtom::PersistentAction { state_index } => self.invoke_persistent_action(tick, index, state_index),
            ShapeAtom::SequenceDecider { .. }
            | ShapeAtom::DynamicPriorityDecider { .. }
            | ShapeAtom::ConcurrentDecider { .. } => return self.enter_decider(tick, index, atom),
        };

        trace!(target: "liz::vm::traverse", index, ?result, "vm.action");
        self.execution_state = result;
        self.shape_atom_index = index + 1;
        self.notify(tick, index, MonitorFlags::LEAVE | MonitorFlags::FROM_BOTTOM);
        VmCommand::Guard
    }

    fn invoke_immediate_action<B, M>(
        &mut self,
        tick: &mut Tick<'_, B, M>,
        index: ShapeAtomIndex,
        function_index: u16,
    ) -> ExecutionState {
        let requested = match self.consume_actor_action_state(tick.actor, index) {
            Some(state) if state.is_active() => ExecutionState::Running,
            Some(state) => {
                trace!(target: "liz::vm::traverse", index, ?state, "stale immediate action state, relaunching");
                ExecutionState::Launch
            }
            None => ExecutionState::Launch,
        };
        let Some(action) = tick.shape.immediate_action(function_index) else {
            debug_assert!(false, "immediate action at {index} refers to unknown function {function_index}");
            return ExecutionState::Fail;
        };

        let returned = action(&mut *tick.blackboard, &mut tick.actor.header.random_seed, tick.time, requested);
        let result = match returned {
            ExecutionState::Launch => {
                warn!(target: "liz::vm::traverse", index, "immediate action returned Launch, treating as Running");
                ExecutionState::Running
            }
            ExecutionState::Cancel => {
                warn!(target: "liz::vm::traverse", index, "immediate action returned an unrequested Cancel");
                ExecutionState::Fail
            }
            state => state,
        };
        if result == ExecutionState::Running {
            self.push_action_state(index, ExecutionState::Running);
        }
        result
    }

    /// Launch on first visit; afterwards the actor's state (merged in by the deferred system) decides.
    fn invoke_deferred_action(
        &mut self,
        actor: &Actor,
        index: ShapeAtomIndex,
        action_id: u32,
        resource_id: u32,
    ) -> ExecutionState {
        match self.consume_actor_action_state(actor, index) {
            Some(ExecutionState::Launch | ExecutionState::Running) => {
                self.push_action_state(index, ExecutionState::Running);
                ExecutionState::Running
            }
            Some(ExecutionState::Cancel) => {
                warn!(target: "liz::vm::traverse", index, "deferred action reported an unrequested Cancel");
                ExecutionState::Fail
            }
            Some(done) => done,
            None => {
                if self.action_requests.is_full() {
                    debug_assert!(false, "action request queue full while launching atom {index}");
                    warn!(target: "liz::vm::request", index, "action request queue full, launch dropped");
                    return ExecutionState::Fail;
                }
                self.action_requests.push_launch(ActionRequest {
                    action_id,
                    resource_id,
                    shape_atom_index: index,
                });
                trace!(target: "liz::vm::request", index, action_id, "vm.request.launch");
                self.push_action_state(index, ExecutionState::Launch);
                ExecutionState::Launch
            }
        }
    }

    fn invoke_persistent_action<B, M>(
        &mut self,
        tick: &mut Tick<'_, B, M>,
        index: ShapeAtomIndex,
        state_index: u32,
    ) -> ExecutionState {
        self.consume_actor_action_state(tick.actor, index);
        let slot = seek_and_consume(
            &mut self.persistent_state_cursor,
            index,
            tick.shape.persistent_state_shape_atom_indices(),
        );
        debug_assert_eq!(slot, Some(state_index as usize), "persistent slot out of step at {index}");
        let Some(stored) = slot.and_then(|slot| tick.actor.persistent_state(slot)) else {
            return ExecutionState::Fail;
        };
        match stored {
            ExecutionState::Launch | ExecutionState::Running => {
                self.push_action_state(index, stored);
                ExecutionState::Running
            }
            ExecutionState::Cancel => ExecutionState::Fail,
            done => done,
        }
    }

    fn enter_decider<B, M: Monitor<B>>(
        &mut self,
        tick: &mut Tick<'_, B, M>,
        index: ShapeAtomIndex,
        atom: ShapeAtom,
    ) -> VmCommand {
        let Some(mut guard) = DeciderGuard::open(
            index,
            atom,
            index + 1,
            self.decider_states.len(),
            self.action_requests.launch_count(),
        ) else {
            return VmCommand::Error;
        };
        if self.guards.is_full() {
            warn!(
                target: "liz::vm::traverse",
                index,
                capacity = self.guards.capacity(),
                "decider guard stack overflow"
            );
            return VmCommand::Error;
        }
        self.execution_state = ExecutionState::Fail;

        let first_child = guard.first_child();
        if !guard.has_children() {
            debug_assert!(false, "decider at {index} has no children");
            self.guards.push(guard);
            self.shape_atom_index = first_child;
            return VmCommand::Guard;
        }

        let end_index = guard.end_index;
        let mut start = first_child;
        if let GuardScratch::Sequence { reached_child } = &mut guard.scratch
            && let Some(resume) = self.consume_actor_decider_state(tick.actor, index)
        {
            if (first_child..end_index).contains(&resume) {
                *reached_child = resume;
                start = resume;
            } else {
                warn!(target: "liz::vm::traverse", index, resume, "sequence continuation outside its children");
            }
        }

        self.guards.push(guard);
        self.shape_atom_index = start;
        self.notify(tick, index, MonitorFlags::LEAVE | MonitorFlags::FROM_TOP);
        VmCommand::Invoke
    }

    fn guard<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) -> VmCommand {
        let Some(mut guard) = self.guards.top().copied() else {
            return VmCommand::Cleanup;
        };
        let child_state = self.execution_state;
        let cursor = self.shape_atom_index;
        self.notify(tick, guard.shape_atom_index, MonitorFlags::ENTER | MonitorFlags::FROM_BOTTOM);

        match (&mut guard.scratch, child_state) {
            (GuardScratch::Sequence { reached_child }, ExecutionState::Launch | ExecutionState::Running) => {
                let reached_child = *reached_child;
                self.push_decider_state(guard.shape_atom_index, reached_child);
                self.shape_atom_index = guard.end_index;
            }
            (GuardScratch::Sequence { reached_child }, ExecutionState::Success) => *reached_child = cursor,
            (GuardScratch::Sequence { .. }, _) => self.shape_atom_index = guard.end_index,

            (
                GuardScratch::DynamicPriority,
                ExecutionState::Launch | ExecutionState::Running | ExecutionState::Success,
            ) => {
                self.cancellation_range.adapt(cursor, guard.end_index);
                self.shape_atom_index = guard.end_index;
            }
            (GuardScratch::DynamicPriority, _) => {}

            (GuardScratch::Concurrent { aggregate }, ExecutionState::Launch | ExecutionState::Running) => {
                *aggregate = ExecutionState::Running;
            }
            (GuardScratch::Concurrent { .. }, ExecutionState::Success) => {}
            (GuardScratch::Concurrent { .. }, _) => {
                self.decider_states.truncate(guard.decider_state_marker);
                self.action_requests.truncate_launch(guard.launch_request_marker);
                self.cancellation_range
                    .adapt(guard.shape_atom_index, guard.end_index);
                self.shape_atom_index = guard.end_index;
            }
        }

        if self.shape_atom_index >= guard.end_index {
            self.execution_state = guard.result(child_state);
            self.guards.pop();
            trace!(
                target: "liz::vm::traverse",
                index = guard.shape_atom_index,
                result = ?self.execution_state,
                "vm.decider.leave"
            );
            self.notify(tick, guard.shape_atom_index, MonitorFlags::LEAVE | MonitorFlags::FROM_BOTTOM);
            return if self.guards.is_empty() {
                VmCommand::Cleanup
            } else {
                VmCommand::Guard
            };
        }

        if let Some(top) = self.guards.top_mut() {
            *top = guard;
        }
        self.notify(tick, guard.shape_atom_index, MonitorFlags::LEAVE | MonitorFlags::FROM_TOP);
        self.drain_cancellation_range(tick);
        VmCommand::Invoke
    }

    fn cleanup<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) -> VmCommand {
        self.drain_cancellation_range(tick);

        let deciders_linear = reorder_post_order(
            self.decider_states.as_mut_slice(),
            self.guards.lend_idle_storage(),
        );
        let changes_linear = reorder_post_order(
            self.persistent_state_changes.as_mut_slice(),
            &mut self.persistent_change_sort_stack[..],
        );
        if !(deciders_linear && changes_linear) {
            debug!(
                target: "liz::vm::traverse",
                deciders_linear,
                changes_linear,
                "post-order reorder fell back to a general sort"
            );
        }
        debug_assert!(
            self.action_states
                .as_slice()
                .windows(2)
                .all(|pair| pair[0].shape_atom_index < pair[1].shape_atom_index),
            "action states out of order after cleanup"
        );
        VmCommand::Done
    }

    fn consume_actor_action_state(&mut self, actor: &Actor, index: ShapeAtomIndex) -> Option<ExecutionState> {
        seek_and_consume(
            &mut self.actor_action_state_cursor,
            index,
            actor.action_state_shape_atom_indices(),
        )
        .map(|position| actor.action_states()[position])
    }

    fn consume_actor_decider_state(&mut self, actor: &Actor, index: ShapeAtomIndex) -> Option<DeciderState> {
        seek_and_consume(
            &mut self.actor_decider_state_cursor,
            index,
            actor.decider_state_shape_atom_indices(),
        )
        .map(|position| actor.decider_states()[position])
    }

    fn push_action_state(&mut self, index: ShapeAtomIndex, state: ExecutionState) {
        if self.action_states.is_full() {
            debug_assert!(false, "action state buffer full at atom {index}");
            return;
        }
        self.action_states.push(ActionStateEntry {
            shape_atom_index: index,
            state,
        });
    }

    fn push_decider_state(&mut self, index: ShapeAtomIndex, state: DeciderState) {
        if self.decider_states.is_full() {
            debug_assert!(false, "decider state buffer full at atom {index}");
            return;
        }
        self.decider_states.push(DeciderStateEntry {
            shape_atom_index: index,
            state,
        });
    }
}
