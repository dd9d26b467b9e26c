//! Reusable tick interpreter.
//!
//! A [`Vm`] owns only scratch memory, sized once from a [`ShapeSpecification`]. Updating an actor
//! resets the scratch, walks the shape, writes the new state back into the actor and leaves the
//! launch/cancel requests of that tick queued until they are extracted. One VM serves any number of
//! actors one after another; run one VM per thread to tick in parallel.

mod cancel;
mod command;
mod entry;
mod guard;
mod monitor;
mod request;
mod seek;
mod sort;

use std::collections::HashMap;

use anyhow::{Result, bail, ensure};
use tracing::debug;

use crate::actor::{Actor, ActorId};
use crate::config::VmConfig;
use crate::lookaside::LookasideBuffer;
use crate::shape::{Shape, ShapeAtomIndex, ShapeSpecification};
use crate::state::{ExecutionState, Time};

pub use cancel::CancellationRange;
pub use command::VmCommand;
pub use entry::{ActionStateEntry, AtomKeyed, DeciderStateEntry, PersistentStateChange};
pub use guard::{DeciderGuard, GuardScratch};
pub use monitor::{Monitor, MonitorEvent, MonitorFlags, NoMonitor};
pub use request::{ActionRequest, ActionRequestKind, ActorActionRequest};
pub use seek::{consume, seek, seek_and_consume};
pub use sort::{SortSlot, reorder_post_order};

use request::ActionRequestQueue;

/// Resolves an actor's user-data handle to its blackboard.
pub trait BlackboardLookup<B> {
    fn lookup(&mut self, user_data: u64) -> Option<&mut B>;
}

impl<B> BlackboardLookup<B> for HashMap<u64, B> {
    fn lookup(&mut self, user_data: u64) -> Option<&mut B> {
        self.get_mut(&user_data)
    }
}

/// Everything one step needs besides the VM itself.
struct Tick<'a, B, M> {
    actor: &'a mut Actor,
    shape: &'a Shape<B>,
    blackboard: &'a mut B,
    time: Time,
    monitor: &'a mut M,
}

#[derive(Debug, Clone)]
pub struct Vm {
    capacity: ShapeSpecification,
    command: VmCommand,
    execution_state: ExecutionState,
    shape_atom_index: ShapeAtomIndex,
    actor_decider_state_cursor: usize,
    actor_action_state_cursor: usize,
    persistent_state_cursor: usize,
    guards: LookasideBuffer<DeciderGuard>,
    cancellation_range: CancellationRange,
    decider_states: LookasideBuffer<DeciderStateEntry>,
    action_states: LookasideBuffer<ActionStateEntry>,
    persistent_state_changes: LookasideBuffer<PersistentStateChange>,
    action_requests: ActionRequestQueue,
    /// Reorder stack for persistent-state changes. Decider states borrow the idle guard storage instead.
    persistent_change_sort_stack: Box<[PersistentStateChange]>,
}

impl Vm {
    pub fn new(capacity: ShapeSpecification) -> Self {
        let guard_capacity = capacity.decider_guard_capacity as usize;
        let change_capacity = capacity.persistent_state_change_capacity as usize;
        Self {
            capacity,
            command: VmCommand::Done,
            execution_state: ExecutionState::Fail,
            shape_atom_index: 0,
            actor_decider_state_cursor: 0,
            actor_action_state_cursor: 0,
            persistent_state_cursor: 0,
            guards: LookasideBuffer::new(guard_capacity, DeciderGuard::EMPTY),
            cancellation_range: CancellationRange::EMPTY,
            decider_states: LookasideBuffer::new(capacity.decider_state_capacity as usize, DeciderStateEntry::EMPTY),
            action_states: LookasideBuffer::new(capacity.action_state_capacity as usize, ActionStateEntry::EMPTY),
            persistent_state_changes: LookasideBuffer::new(change_capacity, PersistentStateChange::EMPTY),
            action_requests: ActionRequestQueue::new(capacity.action_request_capacity as usize),
            persistent_change_sort_stack: vec![PersistentStateChange::EMPTY; change_capacity].into_boxed_slice(),
        }
    }

    pub fn from_config(config: &VmConfig) -> Self {
        if let Some(label) = &config.label {
            debug!(target: "liz::vm", label = %label, "vm.from_config");
        }
        Self::new(config.capacity)
    }

    /// VM sized for exactly one shape.
    pub fn for_shape<B>(shape: &Shape<B>) -> Self {
        Self::new(*shape.specification())
    }

    #[inline]
    pub fn capacity(&self) -> &ShapeSpecification {
        &self.capacity
    }

    pub fn supports(&self, specification: &ShapeSpecification) -> bool {
        self.capacity.covers(specification)
    }

    /// Drop all scratch state, including requests that were never extracted.
    pub fn reset(&mut self) {
        self.command = VmCommand::Done;
        self.execution_state = ExecutionState::Fail;
        self.shape_atom_index = 0;
        self.actor_decider_state_cursor = 0;
        self.actor_action_state_cursor = 0;
        self.persistent_state_cursor = 0;
        self.guards.clear();
        self.cancellation_range.clear();
        self.decider_states.clear();
        self.action_states.clear();
        self.persistent_state_changes.clear();
        self.action_requests.clear();
    }

    #[inline]
    pub fn command(&self) -> VmCommand {
        self.command
    }

    /// Result of the last visited node; the root's result once the command is `Done`.
    #[inline]
    pub fn execution_state(&self) -> ExecutionState {
        self.execution_state
    }

    /// Cursor into the shape's atom stream.
    #[inline]
    pub fn shape_atom_index(&self) -> ShapeAtomIndex {
        self.shape_atom_index
    }

    #[inline]
    pub fn guard_depth(&self) -> usize {
        self.guards.len()
    }

    pub fn guards(&self) -> &[DeciderGuard] {
        self.guards.as_slice()
    }

    pub fn cancellation_range(&self) -> CancellationRange {
        self.cancellation_range
    }

    pub fn decider_states(&self) -> &[DeciderStateEntry] {
        self.decider_states.as_slice()
    }

    pub fn action_states(&self) -> &[ActionStateEntry] {
        self.action_states.as_slice()
    }

    pub fn persistent_state_changes(&self) -> &[PersistentStateChange] {
        self.persistent_state_changes.as_slice()
    }

    pub fn launch_requests(&self) -> &[ActionRequest] {
        self.action_requests.launches()
    }

    /// Queued cancel requests, most recent first.
    pub fn cancel_requests(&self) -> &[ActionRequest] {
        self.action_requests.cancels()
    }

    /// Start a traversal of `shape` for `actor`, to be driven with [`Vm::step`].
    ///
    /// Requests still queued from a previous actor are discarded; extract them first.
    pub fn prepare_update<B>(&mut self, actor: &Actor, shape: &Shape<B>) -> Result<()> {
        self.check_capacity(actor, shape)?;
        self.reset();
        self.command = VmCommand::Invoke;
        Ok(())
    }

    /// Start canceling everything `actor` has outstanding, to be driven with [`Vm::step`].
    pub fn prepare_cancel<B>(&mut self, actor: &Actor, shape: &Shape<B>) -> Result<()> {
        self.check_capacity(actor, shape)?;
        self.reset();
        self.cancellation_range.adapt(0, shape.len() as ShapeAtomIndex);
        self.execution_state = ExecutionState::Cancel;
        self.command = VmCommand::Cleanup;
        Ok(())
    }

    /// Execute one command and return the next one. Terminal commands are returned unchanged.
    pub fn step<B>(&mut self, actor: &mut Actor, shape: &Shape<B>, blackboard: &mut B, time: Time) -> VmCommand {
        self.step_with_monitor(actor, shape, blackboard, time, &mut NoMonitor)
    }

    pub fn step_with_monitor<B, M: Monitor<B>>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        blackboard: &mut B,
        time: Time,
        monitor: &mut M,
    ) -> VmCommand {
        let mut tick = Tick {
            actor,
            shape,
            blackboard,
            time,
            monitor,
        };
        self.command = self.dispatch(&mut tick);
        self.command
    }

    /// Copy the state produced by a finished traversal into `actor`.
    ///
    /// Decider and action states replace the actor's sparse arrays; persistent-state changes are
    /// written into the matching dense slots. Calling this twice has the same effect as calling it once.
    pub fn extract_actor_state<B>(&self, actor: &mut Actor, shape: &Shape<B>) {
        debug_assert_eq!(self.command, VmCommand::Done, "extracting state of an unfinished traversal");

        let deciders = self.decider_states.as_slice();
        let decider_count = deciders.len().min(actor.decider_state_capacity());
        debug_assert_eq!(decider_count, deciders.len(), "actor decider state buffer too small");
        for (slot, entry) in deciders[..decider_count].iter().enumerate() {
            actor.decider_state_shape_atom_indices[slot] = entry.shape_atom_index;
            actor.decider_states[slot] = entry.state;
        }
        actor.header.decider_state_count = decider_count as u32;

        let actions = self.action_states.as_slice();
        let action_count = actions.len().min(actor.action_state_capacity());
        debug_assert_eq!(action_count, actions.len(), "actor action state buffer too small");
        for (slot, entry) in actions[..action_count].iter().enumerate() {
            actor.action_state_shape_atom_indices[slot] = entry.shape_atom_index;
            actor.action_states[slot] = entry.state;
        }
        actor.header.action_state_count = action_count as u32;

        let mut cursor = 0;
        for change in self.persistent_state_changes.as_slice() {
            if let Some(slot) = seek_and_consume(
                &mut cursor,
                change.shape_atom_index,
                shape.persistent_state_shape_atom_indices(),
            ) && let Some(target) = actor.persistent_states.get_mut(slot)
            {
                *target = change.state;
            } else {
                debug_assert!(false, "persistent change for atom {} has no slot", change.shape_atom_index);
            }
        }
    }

    /// Tick `actor` once and write its new state back. Returns the root's result.
    pub fn update_actor<B>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        blackboard: &mut B,
        time: Time,
    ) -> Result<ExecutionState> {
        self.update_actor_with_monitor(actor, shape, blackboard, time, &mut NoMonitor)
    }

    pub fn update_actor_with_monitor<B, M: Monitor<B>>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        blackboard: &mut B,
        time: Time,
        monitor: &mut M,
    ) -> Result<ExecutionState> {
        self.prepare_update(actor, shape)?;
        self.run(&mut Tick {
            actor: &mut *actor,
            shape,
            blackboard,
            time,
            monitor,
        });
        self.finish(actor, shape)
    }

    /// Like [`Vm::update_actor`], resolving the blackboard from the actor's user-data handle.
    pub fn update_actor_with_lookup<B, L: BlackboardLookup<B>>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        lookup: &mut L,
        time: Time,
    ) -> Result<ExecutionState> {
        let Some(blackboard) = lookup.lookup(actor.user_data()) else {
            bail!(
                "no blackboard for actor {} (user data {:#x})",
                actor.id(),
                actor.user_data()
            );
        };
        self.update_actor(actor, shape, blackboard, time)
    }

    /// Cancel everything `actor` has outstanding and clear its decider and action states.
    pub fn cancel_actor<B>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        blackboard: &mut B,
        time: Time,
    ) -> Result<ExecutionState> {
        self.cancel_actor_with_monitor(actor, shape, blackboard, time, &mut NoMonitor)
    }

    pub fn cancel_actor_with_monitor<B, M: Monitor<B>>(
        &mut self,
        actor: &mut Actor,
        shape: &Shape<B>,
        blackboard: &mut B,
        time: Time,
        monitor: &mut M,
    ) -> Result<ExecutionState> {
        self.prepare_cancel(actor, shape)?;
        self.run(&mut Tick {
            actor: &mut *actor,
            shape,
            blackboard,
            time,
            monitor,
        });
        self.finish(actor, shape)
    }

    /// Move the queued requests into `out`, tagged with `actor_id`: cancels (most recent first), then
    /// launches in traversal order. Returns the number appended.
    pub fn extract_action_requests(&mut self, actor_id: ActorId, out: &mut Vec<ActorActionRequest>) -> usize {
        let before = out.len();
        out.extend(self.action_requests.iter_for(actor_id));
        self.action_requests.clear();
        out.len() - before
    }

    /// Slice flavor of [`Vm::extract_action_requests`]; `out` must hold every queued request.
    pub fn extract_action_requests_into(
        &mut self,
        actor_id: ActorId,
        out: &mut [ActorActionRequest],
    ) -> Result<usize> {
        let count = self.action_requests.len();
        ensure!(
            out.len() >= count,
            "request buffer holds {} entries but {} requests are queued",
            out.len(),
            count
        );
        for (slot, request) in out.iter_mut().zip(self.action_requests.iter_for(actor_id)) {
            *slot = request;
        }
        self.action_requests.clear();
        Ok(count)
    }

    fn check_capacity<B>(&self, actor: &Actor, shape: &Shape<B>) -> Result<()> {
        let specification = shape.specification();
        if let Some(field) = self.capacity.shortfall(specification) {
            bail!("vm is too small for shape: {field} below the shape's requirement");
        }
        ensure!(
            actor.supports(specification),
            "actor {} is not sized for this shape",
            actor.id()
        );
        Ok(())
    }

    fn run<B, M: Monitor<B>>(&mut self, tick: &mut Tick<'_, B, M>) {
        while !self.command.is_terminal() {
            self.command = self.dispatch(tick);
        }
    }

    fn finish<B>(&self, actor: &mut Actor, shape: &Shape<B>) -> Result<ExecutionState> {
        if self.command == VmCommand::Error {
            bail!(
                "traversal of actor {} stopped at atom {}",
                actor.id(),
                self.shape_atom_index
            );
        }
        self.extract_actor_state(actor, shape);
        debug!(
            target: "liz::vm",
            actor = actor.id(),
            result = ?self.execution_state,
            decider_states = self.decider_states.len(),
            action_states = self.action_states.len(),
            launches = self.action_requests.launch_count(),
            cancels = self.action_requests.cancel_count(),
            "vm.tick"
        );
        Ok(self.execution_state)
    }

    fn notify<B, M: Monitor<B>>(&self, tick: &mut Tick<'_, B, M>, index: ShapeAtomIndex, flags: MonitorFlags) {
        if M::ENABLED {
            let event = MonitorEvent {
                shape_atom_index: index,
                flags,
                vm: self,
                actor: &*tick.actor,
                shape: tick.shape,
                blackboard: &*tick.blackboard,
                time: tick.time,
            };
            tick.monitor.notify(&event);
        }
    }
}
