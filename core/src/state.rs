use serde::{Deserialize, Serialize};

/// Outcome of visiting a node. The same values are passed into actions as the requested state.
///
/// `Cancel` only ever travels *into* an action. An action may hand it back solely as the answer to a
/// cancel request.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    Launch = 0,
    Running = 1,
    Success = 2,
    Fail = 3,
    Cancel = 4,
}

impl ExecutionState {
    /// Launched or running: the action is still outstanding.
    #[inline]
    pub const fn is_active(self) -> bool {
        matches!(self, ExecutionState::Launch | ExecutionState::Running)
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        !self.is_active()
    }

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(tag: u8) -> Option<ExecutionState> {
        match tag {
            0 => Some(ExecutionState::Launch),
            1 => Some(ExecutionState::Running),
            2 => Some(ExecutionState::Success),
            3 => Some(ExecutionState::Fail),
            4 => Some(ExecutionState::Cancel),
            _ => None,
        }
    }
}

pub type RandomSeed = u64;

/// Simulation time handed through to immediate actions untouched.
pub type Time = f64;

/// Advance `seed` and return the next pseudo random value (SplitMix64).
///
/// Immediate actions receive the actor's seed by reference so that random choices stay reproducible
/// for a given actor history.
#[inline]
pub fn next_random(seed: &mut RandomSeed) -> u64 {
    *seed = seed.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *seed;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
