//! Launch/cancel notifications for deferred actions.
//!
//! Both kinds share one pre-sized buffer: launch requests are pushed on the low side, cancel requests on
//! the high side. Rolling back a failed concurrent branch only ever truncates the launch side.

use serde::{Deserialize, Serialize};

use crate::actor::ActorId;
use crate::lookaside::LookasideDoubleStack;
use crate::shape::ShapeAtomIndex;

/// Request as queued inside the VM. The kind is implied by the side of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action_id: u32,
    pub resource_id: u32,
    pub shape_atom_index: ShapeAtomIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionRequestKind {
    Launch,
    Cancel,
}

/// Request addressed to an actor, as handed to the deferred action system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorActionRequest {
    pub actor_id: ActorId,
    pub action_id: u32,
    pub resource_id: u32,
    pub shape_atom_index: ShapeAtomIndex,
    pub kind: ActionRequestKind,
}

impl ActorActionRequest {
    pub fn new(actor_id: ActorId, request: ActionRequest, kind: ActionRequestKind) -> Self {
        Self {
            actor_id,
            action_id: request.action_id,
            resource_id: request.resource_id,
            shape_atom_index: request.shape_atom_index,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ActionRequestQueue {
    storage: Box<[ActionRequest]>,
    stack: LookasideDoubleStack,
}

impl ActionRequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![ActionRequest::default(); capacity].into_boxed_slice(),
            stack: LookasideDoubleStack::new(capacity),
        }
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.stack.is_full()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stack.count()
    }

    #[inline]
    pub fn launch_count(&self) -> usize {
        self.stack.count_low()
    }

    #[inline]
    pub fn cancel_count(&self) -> usize {
        self.stack.count_high()
    }

    pub fn push_launch(&mut self, request: ActionRequest) {
        let slot = self.stack.push_low();
        self.storage[slot] = request;
    }

    pub fn push_cancel(&mut self, request: ActionRequest) {
        let slot = self.stack.push_high();
        self.storage[slot] = request;
    }

    /// Forget launch requests pushed after the first `count`.
    pub fn truncate_launch(&mut self, count: usize) {
        self.stack.truncate_low(count);
    }

    /// Launch requests in the order they were pushed.
    pub fn launches(&self) -> &[ActionRequest] {
        &self.storage[..self.stack.count_low()]
    }

    /// Cancel requests, most recently pushed first.
    pub fn cancels(&self) -> &[ActionRequest] {
        &self.storage[self.stack.top_index_high()..]
    }

    /// Every queued request tagged with `actor_id`: cancels first, then launches.
    pub fn iter_for(&self, actor_id: ActorId) -> impl Iterator<Item = ActorActionRequest> + '_ {
        let cancels = self
            .cancels()
            .iter()
            .map(move |request| ActorActionRequest::new(actor_id, *request, ActionRequestKind::Cancel));
        let launches = self
            .launches()
            .iter()
            .map(move |request| ActorActionRequest::new(actor_id, *request, ActionRequestKind::Launch));
        cancels.chain(launches)
    }

    pub fn clear(&mut self) {
        self.stack.clear();
    }
}
