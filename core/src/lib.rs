//! Behavior-tree interpreter.
//!
//! A behavior tree is compiled ahead of time into a flat, read-only [`Shape`]. Each live agent owns an
//! [`Actor`] holding the state that survives between ticks. A reusable [`Vm`] walks the shape for one
//! actor at a time, writes the new actor state back and queues launch/cancel requests for the systems
//! that run deferred actions.

pub mod actor;
pub mod config;
pub mod lookaside;
pub mod shape;
pub mod state;

// Tick interpreter
pub mod vm;

pub use actor::{Actor, ActorHeader, ActorId, DeciderState, decode_actor, encode_actor};
pub use config::VmConfig;
pub use shape::{ImmediateActionFn, NodeKind, Shape, ShapeAtom, ShapeAtomIndex, ShapeBuilder, ShapeSpecification};
pub use state::{ExecutionState, RandomSeed, Time, next_random};
pub use vm::{
    ActionRequest, ActionRequestKind, ActorActionRequest, BlackboardLookup, Monitor, MonitorEvent, MonitorFlags,
    NoMonitor, Vm, VmCommand,
};
