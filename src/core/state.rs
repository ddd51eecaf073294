//! Lifecycle state bitfields
//!
//! The lower 12 bits are function states that callers may set and clear; the
//! upper 4 bits are markers reserved for internal flows (system toggle, delete
//! before cascade).

use crate::error::{Result, VaultError};

pub const STATE_NONE: u16 = 0x0000;
pub const STATE_INACTIVE: u16 = 0x0001;
pub const STATE_BLOCKED: u16 = 0x0002;
pub const STATE_READONLY: u16 = 0x0004;
pub const STATE_CLOSED: u16 = 0x0008;
pub const STATE_ACCEPTED: u16 = 0x0010;
pub const STATE_DECLINED: u16 = 0x0020;

pub const STATE_SYSTEM: u16 = 0x1000;
pub const STATE_DELETE: u16 = 0x2000;

pub const STATE_MASK_FUNCTIONS: u16 = 0x0FFF;
pub const STATE_MASK_MARKERS: u16 = 0xF000;

/// States that refuse access outright
pub const STATE_DENY_ACCESS: u16 = STATE_INACTIVE | STATE_BLOCKED | STATE_DELETE;

pub const fn has_any(state: u16, bits: u16) -> bool {
    state & bits != 0
}

pub const fn has_all(state: u16, bits: u16) -> bool {
    state & bits == bits
}

pub const fn set(state: u16, bits: u16) -> u16 {
    state | bits
}

pub const fn clear(state: u16, bits: u16) -> u16 {
    state & !bits
}

/// Reject marker bits in a caller-supplied state change
pub fn check_function_bits(bits: u16) -> Result<u16> {
    if bits & STATE_MASK_MARKERS != 0 {
        return Err(VaultError::InvalidParameter(format!(
            "state bits {:#06x} include reserved markers",
            bits
        )));
    }
    Ok(bits)
}

/// Apply a caller-supplied change: `set` and `clear` may only touch function bits
pub fn apply_user_change(state: u16, set_bits: u16, clear_bits: u16) -> Result<u16> {
    let set_bits = check_function_bits(set_bits)?;
    let clear_bits = check_function_bits(clear_bits)?;
    Ok(set(clear(state, clear_bits), set_bits))
}
