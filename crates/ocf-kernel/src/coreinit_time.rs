//! coreinit time functions
//!
//! One tick is one nanosecond since the process epoch. OSTime is ticks
//! since epoch as a signed 64-bit value, OSTick its low 32 bits.

use crate::args::{ret_i64, ret_u32, CallArgs};
use ocf_espresso::instructions::system::time_base;
use ocf_espresso::{SyscallTable, ThreadState};
use ocf_memory::BeVal;
use tracing::trace;

/// Calendar time structure as the guest sees it; field names follow
/// Posix's `struct tm`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct OsCalendarTime {
    pub tm_sec: BeVal<i32>,
    pub tm_min: BeVal<i32>,
    pub tm_hour: BeVal<i32>,
    pub tm_mday: BeVal<i32>,
    pub tm_mon: BeVal<i32>,
    pub tm_year: BeVal<i32>,
}

fn os_time() -> i64 {
    time_base() as i64
}

fn os_get_time(state: &mut ThreadState) {
    let time = os_time();
    trace!("OSGetTime() = {}", time);
    ret_i64(state, time);
}

fn os_get_system_time(state: &mut ThreadState) {
    ret_i64(state, os_time());
}

fn os_get_tick(state: &mut ThreadState) {
    ret_u32(state, os_time() as u32);
}

fn os_get_system_tick(state: &mut ThreadState) {
    ret_u32(state, os_time() as u32);
}

/// Split ticks into a calendar time and write it through the guest
/// pointer argument.
fn os_ticks_to_calendar_time(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let time = args.i64();
    let out = args.ptr::<OsCalendarTime>();

    trace!("OSTicksToCalendarTime({}, 0x{:08x})", time, out.addr());
    if out.is_null() {
        return;
    }

    let total_secs = time / 1_000_000_000;
    let mut calendar = OsCalendarTime::default();
    calendar.tm_sec.set((total_secs % 60) as i32);
    calendar.tm_min.set((total_secs / 60 % 60) as i32);
    calendar.tm_hour.set((total_secs / 3600 % 24) as i32);
    // Days since epoch; month/year splitting is not needed by anything
    // observed so far, so day counts from zero and the rest stay zero.
    calendar.tm_mday.set((total_secs / 86_400) as i32);

    let host = out.get(state.memory());
    unsafe {
        std::ptr::write_unaligned(host, calendar);
    }
}

pub fn register(table: &SyscallTable) {
    table.register("OSGetTime", os_get_time);
    table.register("OSGetSystemTime", os_get_system_time);
    table.register("OSGetTick", os_get_tick);
    table.register("OSGetSystemTick", os_get_system_tick);
    table.register("OSTicksToCalendarTime", os_ticks_to_calendar_time);
}
