//! Binary layout of a persisted actor.
//!
//! ```text
//! magic "LIZA" | version u16 | reserved u16
//! header:      random_seed u64 | decider_state_count u32 | action_state_count u32
//! identity:    actor_id u32 | user_data u64
//! persistent:  slot_count u32 | slot_count x state u8
//! deciders:    capacity u32 | count x index u32 | count x value u32
//! actions:     capacity u32 | count x index u32 | count x state u8
//! ```
//!
//! All integers are little-endian. Only the used prefix of each sparse array is written; the capacity
//! is kept so a decoded actor can hold as much state as the one that was encoded. Capacities above
//! [`MAX_SPARSE_CAPACITY`] are rejected before anything is allocated.

use anyhow::{Context, Result, bail, ensure};

use super::{Actor, ActorHeader};
use crate::state::ExecutionState;

const MAGIC: [u8; 4] = *b"LIZA";
pub const CURRENT_VERSION: u16 = 1;
/// Largest decider or action state capacity a payload may declare.
pub const MAX_SPARSE_CAPACITY: usize = 1 << 20;

pub fn encode_actor(actor: &Actor) -> Vec<u8> {
    let decider_count = actor.header.decider_state_count as usize;
    let action_count = actor.header.action_state_count as usize;
    let mut out = Vec::with_capacity(
        40 + actor.persistent_states.len() + decider_count * 8 + action_count * 5,
    );
    out.extend_from_slice(&MAGIC);
    write_u16(&mut out, CURRENT_VERSION);
    write_u16(&mut out, 0); // reserved

    write_u64(&mut out, actor.header.random_seed);
    write_u32(&mut out, actor.header.decider_state_count);
    write_u32(&mut out, actor.header.action_state_count);

    write_u32(&mut out, actor.id);
    write_u64(&mut out, actor.user_data);

    write_u32(&mut out, actor.persistent_states.len() as u32);
    for state in actor.persistent_states.iter() {
        out.push(state.as_u8());
    }

    write_u32(&mut out, actor.decider_states.len() as u32);
    for index in actor.decider_state_shape_atom_indices() {
        write_u32(&mut out, *index);
    }
    for value in actor.decider_states() {
        write_u32(&mut out, *value);
    }

    write_u32(&mut out, actor.action_states.len() as u32);
    for index in actor.action_state_shape_atom_indices() {
        write_u32(&mut out, *index);
    }
    for state in actor.action_states() {
        out.push(state.as_u8());
    }
    out
}

pub fn decode_actor(bytes: &[u8]) -> Result<Actor> {
    ensure!(bytes.len() >= 8, "actor payload too small");
    ensure!(bytes[..4] == MAGIC, "invalid actor magic");

    let mut cursor = 4;
    let version = read_u16(bytes, &mut cursor)?;
    let _reserved = read_u16(bytes, &mut cursor)?;
    ensure!(
        version <= CURRENT_VERSION,
        "unsupported actor layout version {} (reader supports <= {})",
        version,
        CURRENT_VERSION
    );

    let header = ActorHeader {
        random_seed: read_u64(bytes, &mut cursor)?,
        decider_state_count: read_u32(bytes, &mut cursor)?,
        action_state_count: read_u32(bytes, &mut cursor)?,
    };
    let id = read_u32(bytes, &mut cursor)?;
    let user_data = read_u64(bytes, &mut cursor)?;

    let persistent_count = read_u32(bytes, &mut cursor)? as usize;
    let decider_capacity_offset = cursor + persistent_count;
    ensure!(decider_capacity_offset <= bytes.len(), "persistent states overrun payload");
    let mut persistent_offset = cursor;
    cursor = decider_capacity_offset;
    let decider_capacity = read_capacity(bytes, &mut cursor).context("decider states")?;

    let decider_count = header.decider_state_count as usize;
    ensure!(
        decider_count <= decider_capacity,
        "decider state count {} exceeds capacity {}",
        decider_count,
        decider_capacity
    );
    let mut decoded = Actor::with_capacities(id, persistent_count, decider_capacity, 0);
    decoded.user_data = user_data;
    for slot in decoded.persistent_states.iter_mut() {
        *slot = read_state(bytes, &mut persistent_offset).context("persistent state")?;
    }
    for index in decoded.decider_state_shape_atom_indices[..decider_count].iter_mut() {
        *index = read_u32(bytes, &mut cursor)?;
    }
    for value in decoded.decider_states[..decider_count].iter_mut() {
        *value = read_u32(bytes, &mut cursor)?;
    }

    let action_capacity = read_capacity(bytes, &mut cursor).context("action states")?;
    let action_count = header.action_state_count as usize;
    ensure!(
        action_count <= action_capacity,
        "action state count {} exceeds capacity {}",
        action_count,
        action_capacity
    );
    decoded.action_state_shape_atom_indices = vec![0; action_capacity].into_boxed_slice();
    decoded.action_states = vec![ExecutionState::Fail; action_capacity].into_boxed_slice();
    for index in decoded.action_state_shape_atom_indices[..action_count].iter_mut() {
        *index = read_u32(bytes, &mut cursor)?;
    }
    for state in decoded.action_states[..action_count].iter_mut() {
        *state = read_state(bytes, &mut cursor).context("action state")?;
    }
    ensure!(cursor == bytes.len(), "unexpected trailing bytes in actor payload");

    decoded.header = header;
    ensure!(
        decoded.is_sorted(),
        "actor {} sparse state arrays are not strictly ascending",
        id
    );
    Ok(decoded)
}

fn read_capacity(bytes: &[u8], cursor: &mut usize) -> Result<usize> {
    let capacity = read_u32(bytes, cursor)? as usize;
    ensure!(
        capacity <= MAX_SPARSE_CAPACITY,
        "capacity {} exceeds the supported maximum {}",
        capacity,
        MAX_SPARSE_CAPACITY
    );
    Ok(capacity)
}

fn read_state(bytes: &[u8], cursor: &mut usize) -> Result<ExecutionState> {
    let tag = read_u8(bytes, cursor)?;
    match ExecutionState::from_u8(tag) {
        Some(state) => Ok(state),
        None => bail!("unknown execution state tag {}", tag),
    }
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn read_u8(bytes: &[u8], cursor: &mut usize) -> Result<u8> {
    if *cursor >= bytes.len() {
        bail!("unexpected end of input while reading u8");
    }
    let value = bytes[*cursor];
    *cursor += 1;
    Ok(value)
}

fn read_u16(bytes: &[u8], cursor: &mut usize) -> Result<u16> {
    if *cursor + 2 > bytes.len() {
        bail!("unexpected end of input while reading u16");
    }
    let mut buf = [0u8; 2];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 2]);
    *cursor += 2;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > bytes.len() {
        bail!("unexpected end of input while reading u32");
    }
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 4]);
    *cursor += 4;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(bytes: &[u8], cursor: &mut usize) -> Result<u64> {
    if *cursor + 8 > bytes.len() {
        bail!("unexpected end of input while reading u64");
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*cursor..*cursor + 8]);
    *cursor += 8;
    Ok(u64::from_le_bytes(buf))
}
