//! Compiled behavior trees.
//!
//! A [`Shape`] is a depth-first pre-order array of [`ShapeAtom`]s. Deciders store the absolute index one
//! past their last descendant so a whole subtree can be skipped in O(1). Shapes are immutable once built
//! and may be shared by any number of actors and VMs.

mod builder;

use std::fmt;

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{ExecutionState, RandomSeed, Time};

pub use builder::ShapeBuilder;

/// Index of an atom inside a shape's atom stream.
pub type ShapeAtomIndex = u32;

/// Synchronous action called in place while the tree is traversed.
///
/// Arguments are the actor's blackboard, its random seed, the current time and the requested state
/// (`Launch` on first call, `Running` while the previous call returned `Running`, `Cancel` when the
/// branch is abandoned). Must never return `Launch`, and may return `Cancel` only when asked to.
pub type ImmediateActionFn<B> = fn(&mut B, &mut RandomSeed, Time, ExecutionState) -> ExecutionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    ImmediateAction,
    DeferredAction,
    PersistentAction,
    SequenceDecider,
    DynamicPriorityDecider,
    ConcurrentDecider,
}

impl NodeKind {
    #[inline]
    pub const fn is_decider(self) -> bool {
        matches!(
            self,
            NodeKind::SequenceDecider | NodeKind::DynamicPriorityDecider | NodeKind::ConcurrentDecider
        )
    }

    #[inline]
    pub const fn is_action(self) -> bool {
        !self.is_decider()
    }
}

/// One node of the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeAtom {
    /// Calls `immediate_actions[function_index]` synchronously.
    ImmediateAction { function_index: u16 },
    /// Handed to an external system through launch/cancel requests.
    DeferredAction { action_id: u32, resource_id: u32 },
    /// Reads its state from the actor's dense persistent slot `state_index`.
    PersistentAction { state_index: u32 },
    SequenceDecider { end_index: ShapeAtomIndex },
    DynamicPriorityDecider { end_index: ShapeAtomIndex },
    ConcurrentDecider { end_index: ShapeAtomIndex },
}

impl ShapeAtom {
    pub const fn kind(&self) -> NodeKind {
        match self {
            ShapeAtom::ImmediateAction { .. } => NodeKind::ImmediateAction,
            ShapeAtom::DeferredAction { .. } => NodeKind::DeferredAction,
            ShapeAtom::PersistentAction { .. } => NodeKind::PersistentAction,
            ShapeAtom::SequenceDecider { .. } => NodeKind::SequenceDecider,
            ShapeAtom::DynamicPriorityDecider { .. } => NodeKind::DynamicPriorityDecider,
            ShapeAtom::ConcurrentDecider { .. } => NodeKind::ConcurrentDecider,
        }
    }

    /// Subtree end for deciders, `None` for actions.
    pub const fn end_index(&self) -> Option<ShapeAtomIndex> {
        match self {
            ShapeAtom::SequenceDecider { end_index }
            | ShapeAtom::DynamicPriorityDecider { end_index }
            | ShapeAtom::ConcurrentDecider { end_index } => Some(*end_index),
            _ => None,
        }
    }

    #[inline]
    pub const fn is_decider(&self) -> bool {
        self.kind().is_decider()
    }
}

/// Buffer capacities needed to run a shape.
///
/// Every VM and actor used with a shape must be at least this large in every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeSpecification {
    pub shape_atom_count: u32,
    pub persistent_state_count: u32,
    pub decider_state_capacity: u32,
    pub action_state_capacity: u32,
    pub persistent_state_change_capacity: u32,
    pub decider_guard_capacity: u32,
    pub action_request_capacity: u32,
}

impl ShapeSpecification {
    /// True if every capacity of `self` is at least the matching one in `other`.
    pub fn covers(&self, other: &ShapeSpecification) -> bool {
        self.shortfall(other).is_none()
    }

    /// Name of the first field in which `self` is smaller than `other`.
    pub fn shortfall(&self, other: &ShapeSpecification) -> Option<&'static str> {
        let fields = [
            ("shape_atom_count", self.shape_atom_count, other.shape_atom_count),
            (
                "persistent_state_count",
                self.persistent_state_count,
                other.persistent_state_count,
            ),
            (
                "decider_state_capacity",
                self.decider_state_capacity,
                other.decider_state_capacity,
            ),
            (
                "action_state_capacity",
                self.action_state_capacity,
                other.action_state_capacity,
            ),
            (
                "persistent_state_change_capacity",
                self.persistent_state_change_capacity,
                other.persistent_state_change_capacity,
            ),
            (
                "decider_guard_capacity",
                self.decider_guard_capacity,
                other.decider_guard_capacity,
            ),
            (
                "action_request_capacity",
                self.action_request_capacity,
                other.action_request_capacity,
            ),
        ];
        fields
            .into_iter()
            .find(|(_, have, need)| have < need)
            .map(|(name, _, _)| name)
    }

    /// Field-wise maximum, used to size one VM for several shapes.
    pub fn union(&self, other: &ShapeSpecification) -> ShapeSpecification {
        ShapeSpecification {
            shape_atom_count: self.shape_atom_count.max(other.shape_atom_count),
            persistent_state_count: self.persistent_state_count.max(other.persistent_state_count),
            decider_state_capacity: self.decider_state_capacity.max(other.decider_state_capacity),
            action_state_capacity: self.action_state_capacity.max(other.action_state_capacity),
            persistent_state_change_capacity: self
                .persistent_state_change_capacity
                .max(other.persistent_state_change_capacity),
            decider_guard_capacity: self.decider_guard_capacity.max(other.decider_guard_capacity),
            action_request_capacity: self.action_request_capacity.max(other.action_request_capacity),
        }
    }
}

/// Immutable compiled behavior tree shared across actors.
pub struct Shape<B> {
    atoms: Box<[ShapeAtom]>,
    persistent_state_shape_atom_indices: Box<[ShapeAtomIndex]>,
    immediate_actions: Box<[ImmediateActionFn<B>]>,
    specification: ShapeSpecification,
}

impl<B> Shape<B> {
    /// Validate `atoms` and derive the side tables and specification.
    ///
    /// Rejects empty streams, deciders without children, subtree ends that leave their parent or the
    /// stream, a root that does not span the whole stream, unknown immediate-action indices and
    /// persistent slots that are not numbered densely in atom order.
    pub fn new(atoms: Vec<ShapeAtom>, immediate_actions: Vec<ImmediateActionFn<B>>) -> Result<Self> {
        ensure!(!atoms.is_empty(), "shape has no atoms");
        ensure!(
            atoms.len() < ShapeAtomIndex::MAX as usize,
            "shape has too many atoms ({})",
            atoms.len()
        );
        ensure!(
            immediate_actions.len() <= u16::MAX as usize + 1,
            "too many immediate actions ({})",
            immediate_actions.len()
        );

        let atom_count = atoms.len();
        let root_end = atoms[0].end_index().map(|end| end as usize).unwrap_or(1);
        ensure!(
            root_end == atom_count,
            "root node spans {} atoms but the shape holds {}",
            root_end,
            atom_count
        );

        let mut specification = ShapeSpecification {
            shape_atom_count: atom_count as u32,
            ..ShapeSpecification::default()
        };
        let mut persistent_state_shape_atom_indices = Vec::new();
        let mut open_ends: Vec<usize> = Vec::new();

        for (index, atom) in atoms.iter().enumerate() {
            while let Some(&end) = open_ends.last()
                && end <= index
            {
                open_ends.pop();
            }

            match *atom {
                ShapeAtom::ImmediateAction { function_index } => {
                    ensure!(
                        (function_index as usize) < immediate_actions.len(),
                        "immediate action at {} refers to unknown function {}",
                        index,
                        function_index
                    );
                    specification.action_state_capacity += 1;
                }
                ShapeAtom::DeferredAction { .. } => {
                    specification.action_state_capacity += 1;
                    specification.action_request_capacity += 1;
                }
                ShapeAtom::PersistentAction { state_index } => {
                    ensure!(
                        state_index as usize == persistent_state_shape_atom_indices.len(),
                        "persistent action at {} uses slot {} but slot {} is next",
                        index,
                        state_index,
                        persistent_state_shape_atom_indices.len()
                    );
                    persistent_state_shape_atom_indices.push(index as ShapeAtomIndex);
                    specification.action_state_capacity += 1;
                }
                ShapeAtom::SequenceDecider { end_index }
                | ShapeAtom::DynamicPriorityDecider { end_index }
                | ShapeAtom::ConcurrentDecider { end_index } => {
                    let end = end_index as usize;
                    ensure!(end > index + 1, "decider at {} has no children", index);
                    ensure!(
                        end <= atom_count,
                        "decider at {} ends at {} beyond the shape end {}",
                        index,
                        end,
                        atom_count
                    );
                    if let Some(&parent_end) = open_ends.last() {
                        ensure!(
                            end <= parent_end,
                            "decider at {} ends at {} outside its parent ending at {}",
                            index,
                            end,
                            parent_end
                        );
                    }
                    open_ends.push(end);
                    specification.decider_guard_capacity =
                        specification.decider_guard_capacity.max(open_ends.len() as u32);
                    if matches!(atom, ShapeAtom::SequenceDecider { .. }) {
                        specification.decider_state_capacity += 1;
                    }
                }
            }
        }

        specification.persistent_state_count = persistent_state_shape_atom_indices.len() as u32;
        specification.persistent_state_change_capacity = specification.persistent_state_count;

        debug!(
            target: "liz::shape",
            atoms = atom_count,
            immediate_actions = immediate_actions.len(),
            guard_depth = specification.decider_guard_capacity,
            "shape.validated"
        );

        Ok(Self {
            atoms: atoms.into_boxed_slice(),
            persistent_state_shape_atom_indices: persistent_state_shape_atom_indices.into_boxed_slice(),
            immediate_actions: immediate_actions.into_boxed_slice(),
            specification,
        })
    }

    #[inline]
    pub fn atoms(&self) -> &[ShapeAtom] {
        &self.atoms
    }

    #[inline]
    pub fn atom(&self, index: ShapeAtomIndex) -> Option<ShapeAtom> {
        self.atoms.get(index as usize).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Shape-atom index owning each persistent slot, ascending.
    #[inline]
    pub fn persistent_state_shape_atom_indices(&self) -> &[ShapeAtomIndex] {
        &self.persistent_state_shape_atom_indices
    }

    #[inline]
    pub fn immediate_action(&self, function_index: u16) -> Option<ImmediateActionFn<B>> {
        self.immediate_actions.get(function_index as usize).copied()
    }

    #[inline]
    pub fn immediate_action_count(&self) -> usize {
        self.immediate_actions.len()
    }

    #[inline]
    pub fn specification(&self) -> &ShapeSpecification {
        &self.specification
    }
}

impl<B> Clone for Shape<B> {
    fn clone(&self) -> Self {
        Self {
            atoms: self.atoms.clone(),
            persistent_state_shape_atom_indices: self.persistent_state_shape_atom_indices.clone(),
            immediate_actions: self.immediate_actions.clone(),
            specification: self.specification,
        }
    }
}

impl<B> fmt::Debug for Shape<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shape")
            .field("atoms", &self.atoms)
            .field(
                "persistent_state_shape_atom_indices",
                &self.persistent_state_shape_atom_indices,
            )
            .field("immediate_actions", &self.immediate_actions.len())
            .field("specification", &self.specification)
            .finish()
    }
}
