//! nn::act account functions
//!
//! Registered under the guest's mangled import names. A single default
//! account in slot 0 is reported.

use crate::args::{ret_u32, CallArgs};
use ocf_espresso::{SyscallTable, ThreadState};
use tracing::trace;

const RESULT_SUCCESS: u32 = 0;

fn initialize(state: &mut ThreadState) {
    trace!("nn::act::Initialize()");
    ret_u32(state, RESULT_SUCCESS);
}

fn finalize(_state: &mut ThreadState) {
    trace!("nn::act::Finalize()");
}

fn cancel(state: &mut ThreadState) {
    trace!("nn::act::Cancel()");
    ret_u32(state, RESULT_SUCCESS);
}

fn get_slot_no(state: &mut ThreadState) {
    trace!("nn::act::GetSlotNo()");
    ret_u32(state, 0);
}

fn get_transferable_id(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let unk = args.u32();
    trace!("nn::act::GetTransferableId({})", unk);
    ret_u32(state, 0);
}

pub fn register(table: &SyscallTable) {
    table.register("Initialize__Q2_2nn3actFv", initialize);
    table.register("Finalize__Q2_2nn3actFv", finalize);
    table.register("Cancel__Q2_2nn3actFv", cancel);
    table.register("GetSlotNo__Q2_2nn3actFv", get_slot_no);
    table.register("GetTransferableId__Q2_2nn3actFUi", get_transferable_id);
}
