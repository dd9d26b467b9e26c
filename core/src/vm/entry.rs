use crate::actor::DeciderState;
use crate::shape::ShapeAtomIndex;
use crate::state::ExecutionState;

/// Records keyed by the shape atom they belong to.
pub trait AtomKeyed: Copy {
    fn shape_atom_index(&self) -> ShapeAtomIndex;
}

/// Continuation remembered for a running sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeciderStateEntry {
    pub shape_atom_index: ShapeAtomIndex,
    pub state: DeciderState,
}

/// Outstanding action collected during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionStateEntry {
    pub shape_atom_index: ShapeAtomIndex,
    pub state: ExecutionState,
}

/// New value for the persistent slot owned by `shape_atom_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistentStateChange {
    pub shape_atom_index: ShapeAtomIndex,
    pub state: ExecutionState,
}

impl DeciderStateEntry {
    pub(crate) const EMPTY: Self = Self {
        shape_atom_index: 0,
        state: 0,
    };
}

impl ActionStateEntry {
    pub(crate) const EMPTY: Self = Self {
        shape_atom_index: 0,
        state: ExecutionState::Fail,
    };
}

impl PersistentStateChange {
    pub(crate) const EMPTY: Self = Self {
        shape_atom_index: 0,
        state: ExecutionState::Fail,
    };
}

impl AtomKeyed for DeciderStateEntry {
    #[inline]
    fn shape_atom_index(&self) -> ShapeAtomIndex {
        self.shape_atom_index
    }
}

impl AtomKeyed for ActionStateEntry {
    #[inline]
    fn shape_atom_index(&self) -> ShapeAtomIndex {
        self.shape_atom_index
    }
}

impl AtomKeyed for PersistentStateChange {
    #[inline]
    fn shape_atom_index(&self) -> ShapeAtomIndex {
        self.shape_atom_index
    }
}

impl AtomKeyed for ShapeAtomIndex {
    #[inline]
    fn shape_atom_index(&self) -> ShapeAtomIndex {
        *self
    }
}
