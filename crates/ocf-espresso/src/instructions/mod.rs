//! Interpreter instruction handlers
//!
//! One handler per opcode, grouped by category. Each module exposes a
//! `register` function that installs its handlers into the dense table;
//! `register_all` must run before the first dispatch.

pub mod branch;
pub mod condition;
pub mod float;
pub mod integer;
pub mod load_store;
pub mod paired;
pub mod system;

use crate::interpreter::HandlerTable;
use crate::state::ThreadState;

/// Install every handler category
pub fn register_all(table: &mut HandlerTable) {
    branch::register(table);
    condition::register(table);
    float::register(table);
    integer::register(table);
    load_store::register(table);
    paired::register(table);
    system::register(table);
}

/// Update CR0 from a 32-bit result: signed compare against zero plus the
/// sticky summary-overflow bit.
#[inline]
pub(crate) fn update_cr0(state: &mut ThreadState, value: u32) {
    let value = value as i32;
    let mut field = if value < 0 {
        0b1000
    } else if value > 0 {
        0b0100
    } else {
        0b0010
    };
    if state.xer_so() {
        field |= 1;
    }
    state.set_cr_field(0, field);
}

/// Write a compare result nibble {LT, GT, EQ, SO} into a CR field.
#[inline]
pub(crate) fn set_compare_field(state: &mut ThreadState, field: usize, lt: bool, gt: bool, eq: bool) {
    let mut nibble = 0;
    if lt {
        nibble |= 0b1000;
    }
    if gt {
        nibble |= 0b0100;
    }
    if eq {
        nibble |= 0b0010;
    }
    if state.xer_so() {
        nibble |= 1;
    }
    state.set_cr_field(field, nibble);
}
