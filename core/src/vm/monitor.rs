//! Observer hook invoked at fixed points of a tick.
//!
//! Monitors are resolved statically: with [`NoMonitor`] the `ENABLED` constant is `false` and every
//! notification site compiles away.

use std::ops::BitOr;

use super::Vm;
use crate::actor::Actor;
use crate::shape::{Shape, ShapeAtomIndex};
use crate::state::Time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MonitorFlags(u8);

impl MonitorFlags {
    pub const NONE: MonitorFlags = MonitorFlags(0);
    pub const ENTER: MonitorFlags = MonitorFlags(1 << 0);
    pub const LEAVE: MonitorFlags = MonitorFlags(1 << 1);
    /// Moving down the tree (parent to child).
    pub const FROM_TOP: MonitorFlags = MonitorFlags(1 << 2);
    /// Moving up the tree (child to parent).
    pub const FROM_BOTTOM: MonitorFlags = MonitorFlags(1 << 3);
    pub const CANCEL: MonitorFlags = MonitorFlags(1 << 4);

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn from_bits(bits: u8) -> MonitorFlags {
        MonitorFlags(bits)
    }

    #[inline]
    pub const fn contains(self, other: MonitorFlags) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub const fn union(self, other: MonitorFlags) -> MonitorFlags {
        MonitorFlags(self.0 | other.0)
    }

    #[inline]
    pub fn insert(&mut self, other: MonitorFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for MonitorFlags {
    type Output = MonitorFlags;

    fn bitor(self, rhs: MonitorFlags) -> MonitorFlags {
        self.union(rhs)
    }
}

/// Snapshot handed to a [`Monitor`]. Everything is borrowed read-only.
pub struct MonitorEvent<'a, B> {
    pub shape_atom_index: ShapeAtomIndex,
    pub flags: MonitorFlags,
    pub vm: &'a Vm,
    pub actor: &'a Actor,
    pub shape: &'a Shape<B>,
    pub blackboard: &'a B,
    pub time: Time,
}

pub trait Monitor<B> {
    const ENABLED: bool = true;

    fn notify(&mut self, event: &MonitorEvent<'_, B>);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoMonitor;

impl<B> Monitor<B> for NoMonitor {
    const ENABLED: bool = false;

    #[inline(always)]
    fn notify(&mut self, _event: &MonitorEvent<'_, B>) {}
}
