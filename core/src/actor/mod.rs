//! Per-agent state persisted between ticks.
//!
//! An actor keeps three arrays next to a small header:
//! - persistent-action states, one dense slot per persistent atom of its shape;
//! - decider continuation states, sparse `(shape atom index, value)` pairs;
//! - action states, sparse `(shape atom index, state)` pairs for outstanding actions.
//!
//! Both sparse arrays are sorted ascending by shape-atom index between ticks, which lets the VM find
//! entries with one forward scan per tick.

mod layout;

use anyhow::{Result, bail, ensure};
use tracing::trace;

use crate::shape::{Shape, ShapeAtomIndex, ShapeSpecification};
use crate::state::{ExecutionState, RandomSeed};

pub use layout::{MAX_SPARSE_CAPACITY, decode_actor, encode_actor};

pub type ActorId = u32;

/// Value remembered for a running sequence: the atom index of the child to resume at.
pub type DeciderState = u32;

/// Value persistent slots start out with.
pub const INITIAL_PERSISTENT_STATE: ExecutionState = ExecutionState::Fail;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActorHeader {
    pub random_seed: RandomSeed,
    pub decider_state_count: u32,
    pub action_state_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    id: ActorId,
    user_data: u64,
    pub(crate) header: ActorHeader,
    pub(crate) persistent_states: Box<[ExecutionState]>,
    pub(crate) decider_state_shape_atom_indices: Box<[ShapeAtomIndex]>,
    pub(crate) decider_states: Box<[DeciderState]>,
    pub(crate) action_state_shape_atom_indices: Box<[ShapeAtomIndex]>,
    pub(crate) action_states: Box<[ExecutionState]>,
}

impl Actor {
    /// Create an idle actor sized for `shape`.
    pub fn new<B>(id: ActorId, shape: &Shape<B>) -> Self {
        Self::with_specification(id, shape.specification())
    }

    pub fn with_specification(id: ActorId, specification: &ShapeSpecification) -> Self {
        Self::with_capacities(
            id,
            specification.persistent_state_count as usize,
            specification.decider_state_capacity as usize,
            specification.action_state_capacity as usize,
        )
    }

    pub(crate) fn with_capacities(
        id: ActorId,
        persistent_state_count: usize,
        decider_state_capacity: usize,
        action_state_capacity: usize,
    ) -> Self {
        Self {
            id,
            user_data: 0,
            header: ActorHeader::default(),
            persistent_states: vec![INITIAL_PERSISTENT_STATE; persistent_state_count].into_boxed_slice(),
            decider_state_shape_atom_indices: vec![0; decider_state_capacity].into_boxed_slice(),
            decider_states: vec![0; decider_state_capacity].into_boxed_slice(),
            action_state_shape_atom_indices: vec![0; action_state_capacity].into_boxed_slice(),
            action_states: vec![ExecutionState::Fail; action_state_capacity].into_boxed_slice(),
        }
    }

    pub fn with_random_seed(mut self, random_seed: RandomSeed) -> Self {
        self.header.random_seed = random_seed;
        self
    }

    /// Attach the handle a [`crate::BlackboardLookup`] resolves into this actor's blackboard.
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    #[inline]
    pub fn id(&self) -> ActorId {
        self.id
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    #[inline]
    pub fn header(&self) -> &ActorHeader {
        &self.header
    }

    #[inline]
    pub fn random_seed(&self) -> RandomSeed {
        self.header.random_seed
    }

    pub fn set_random_seed(&mut self, random_seed: RandomSeed) {
        self.header.random_seed = random_seed;
    }

    #[inline]
    pub fn persistent_states(&self) -> &[ExecutionState] {
        &self.persistent_states
    }

    #[inline]
    pub fn persistent_state(&self, slot: usize) -> Option<ExecutionState> {
        self.persistent_states.get(slot).copied()
    }

    #[inline]
    pub fn decider_state_shape_atom_indices(&self) -> &[ShapeAtomIndex] {
        &self.decider_state_shape_atom_indices[..self.header.decider_state_count as usize]
    }

    #[inline]
    pub fn decider_states(&self) -> &[DeciderState] {
        &self.decider_states[..self.header.decider_state_count as usize]
    }

    #[inline]
    pub fn action_state_shape_atom_indices(&self) -> &[ShapeAtomIndex] {
        &self.action_state_shape_atom_indices[..self.header.action_state_count as usize]
    }

    #[inline]
    pub fn action_states(&self) -> &[ExecutionState] {
        &self.action_states[..self.header.action_state_count as usize]
    }

    pub fn decider_state(&self, shape_atom_index: ShapeAtomIndex) -> Option<DeciderState> {
        let indices = self.decider_state_shape_atom_indices();
        indices
            .binary_search(&shape_atom_index)
            .ok()
            .map(|position| self.decider_states[position])
    }

    pub fn action_state(&self, shape_atom_index: ShapeAtomIndex) -> Option<ExecutionState> {
        let indices = self.action_state_shape_atom_indices();
        indices
            .binary_search(&shape_atom_index)
            .ok()
            .map(|position| self.action_states[position])
    }

    /// No remembered deciders and no outstanding actions.
    pub fn is_idle(&self) -> bool {
        self.header.decider_state_count == 0 && self.header.action_state_count == 0
    }

    #[inline]
    pub fn decider_state_capacity(&self) -> usize {
        self.decider_states.len()
    }

    #[inline]
    pub fn action_state_capacity(&self) -> usize {
        self.action_states.len()
    }

    /// Whether the actor's buffers can hold the state produced by a shape with `specification`.
    pub fn supports(&self, specification: &ShapeSpecification) -> bool {
        self.persistent_states.len() == specification.persistent_state_count as usize
            && self.decider_state_capacity() >= specification.decider_state_capacity as usize
            && self.action_state_capacity() >= specification.action_state_capacity as usize
    }

    /// Merge a state reported by an external action system, keeping ascending order.
    ///
    /// Existing entries are overwritten, new ones inserted. Values are taken as reported; the VM
    /// normalizes impossible values when it consumes them.
    pub fn merge_action_state(&mut self, shape_atom_index: ShapeAtomIndex, state: ExecutionState) -> Result<()> {
        let count = self.header.action_state_count as usize;
        match self.action_state_shape_atom_indices[..count].binary_search(&shape_atom_index) {
            Ok(position) => {
                self.action_states[position] = state;
            }
            Err(position) => {
                ensure!(
                    count < self.action_states.len(),
                    "actor {}: action state buffer full ({}) while merging atom {}",
                    self.id,
                    count,
                    shape_atom_index
                );
                self.action_state_shape_atom_indices
                    .copy_within(position..count, position + 1);
                self.action_states.copy_within(position..count, position + 1);
                self.action_state_shape_atom_indices[position] = shape_atom_index;
                self.action_states[position] = state;
                self.header.action_state_count += 1;
            }
        }
        trace!(target: "liz::actor", actor = self.id, index = shape_atom_index, ?state, "actor.merge_action_state");
        Ok(())
    }

    /// Drop the outstanding entry for `shape_atom_index`. Returns whether one existed.
    pub fn remove_action_state(&mut self, shape_atom_index: ShapeAtomIndex) -> bool {
        let count = self.header.action_state_count as usize;
        match self.action_state_shape_atom_indices[..count].binary_search(&shape_atom_index) {
            Ok(position) => {
                self.action_state_shape_atom_indices
                    .copy_within(position + 1..count, position);
                self.action_states.copy_within(position + 1..count, position);
                self.header.action_state_count -= 1;
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_persistent_state(&mut self, slot: usize, state: ExecutionState) -> Result<()> {
        let Some(target) = self.persistent_states.get_mut(slot) else {
            bail!(
                "actor {}: persistent slot {} out of range ({} slots)",
                self.id,
                slot,
                self.persistent_states.len()
            );
        };
        *target = state;
        Ok(())
    }

    /// Forget all decider and action states. Persistent slots are left untouched.
    pub fn clear_states(&mut self) {
        self.header.decider_state_count = 0;
        self.header.action_state_count = 0;
    }

    pub(crate) fn is_sorted(&self) -> bool {
        self.decider_state_shape_atom_indices()
            .windows(2)
            .all(|pair| pair[0] < pair[1])
            && self
                .action_state_shape_atom_indices()
                .windows(2)
                .all(|pair| pair[0] < pair[1])
    }
}
