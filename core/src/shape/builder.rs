use anyhow::{Result, ensure};

use super::{ImmediateActionFn, Shape, ShapeAtom, ShapeAtomIndex};

/// Incremental, depth-first construction of a [`Shape`].
///
/// Deciders take a closure that appends their children; the decider's end index is patched once the
/// closure returns. Every append returns the atom index of the node it created.
pub struct ShapeBuilder<B> {
    atoms: Vec<ShapeAtom>,
    immediate_actions: Vec<ImmediateActionFn<B>>,
    persistent_state_count: u32,
}

impl<B> ShapeBuilder<B> {
    pub fn new() -> Self {
        Self {
            atoms: Vec::new(),
            immediate_actions: Vec::new(),
            persistent_state_count: 0,
        }
    }

    /// Add `action` to the shape's function table without emitting an atom.
    pub fn register_immediate_action(&mut self, action: ImmediateActionFn<B>) -> u16 {
        let function_index = self.immediate_actions.len() as u16;
        self.immediate_actions.push(action);
        function_index
    }

    pub fn immediate_action(&mut self, action: ImmediateActionFn<B>) -> ShapeAtomIndex {
        let function_index = self.register_immediate_action(action);
        self.immediate_action_at(function_index)
    }

    /// Emit an immediate action calling an already registered function.
    pub fn immediate_action_at(&mut self, function_index: u16) -> ShapeAtomIndex {
        self.push(ShapeAtom::ImmediateAction { function_index })
    }

    pub fn deferred_action(&mut self, action_id: u32, resource_id: u32) -> ShapeAtomIndex {
        self.push(ShapeAtom::DeferredAction {
            action_id,
            resource_id,
        })
    }

    pub fn persistent_action(&mut self) -> ShapeAtomIndex {
        let state_index = self.persistent_state_count;
        self.persistent_state_count += 1;
        self.push(ShapeAtom::PersistentAction { state_index })
    }

    pub fn sequence<F>(&mut self, children: F) -> ShapeAtomIndex
    where
        F: FnOnce(&mut Self),
    {
        self.decider(|end_index| ShapeAtom::SequenceDecider { end_index }, children)
    }

    pub fn dynamic_priority<F>(&mut self, children: F) -> ShapeAtomIndex
    where
        F: FnOnce(&mut Self),
    {
        self.decider(|end_index| ShapeAtom::DynamicPriorityDecider { end_index }, children)
    }

    pub fn concurrent<F>(&mut self, children: F) -> ShapeAtomIndex
    where
        F: FnOnce(&mut Self),
    {
        self.decider(|end_index| ShapeAtom::ConcurrentDecider { end_index }, children)
    }

    /// Number of atoms emitted so far.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn build(self) -> Result<Shape<B>> {
        ensure!(!self.atoms.is_empty(), "cannot build an empty shape");
        Shape::new(self.atoms, self.immediate_actions)
    }

    fn decider<C, F>(&mut self, make: C, children: F) -> ShapeAtomIndex
    where
        C: Fn(ShapeAtomIndex) -> ShapeAtom,
        F: FnOnce(&mut Self),
    {
        let index = self.push(make(0));
        children(self);
        let end_index = self.atoms.len() as ShapeAtomIndex;
        self.atoms[index as usize] = make(end_index);
        index
    }

    fn push(&mut self, atom: ShapeAtom) -> ShapeAtomIndex {
        let index = self.atoms.len() as ShapeAtomIndex;
        self.atoms.push(atom);
        index
    }
}

impl<B> Default for ShapeBuilder<B> {
    fn default() -> Self {
        Self::new()
    }
}
