//! coreinit data-cache functions
//!
//! The core does not emulate cache coherence, so these are observed as
//! no-ops — except DCZeroRange, which really zeroes.

use crate::args::CallArgs;
use ocf_core::bits::{align_down, align_up};
use ocf_espresso::{SyscallTable, ThreadState};
use tracing::trace;

fn dc_invalidate_range(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCInvalidateRange(0x{:08x}, 0x{:x})", addr, size);
}

fn dc_flush_range(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCFlushRange(0x{:08x}, 0x{:x})", addr, size);
}

fn dc_store_range(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCStoreRange(0x{:08x}, 0x{:x})", addr, size);
}

fn dc_flush_range_no_sync(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCFlushRangeNoSync(0x{:08x}, 0x{:x})", addr, size);
}

fn dc_store_range_no_sync(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCStoreRangeNoSync(0x{:08x}, 0x{:x})", addr, size);
}

fn dc_touch_range(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCTouchRange(0x{:08x}, 0x{:x})", addr, size);
}

/// Zero whole cache lines inside the range: the start address rounds up
/// and the size rounds down to 32-byte lines.
fn dc_zero_range(state: &mut ThreadState) {
    let mut args = CallArgs::new(state);
    let (addr, size) = (args.u32(), args.u32());
    trace!("DCZeroRange(0x{:08x}, 0x{:x})", addr, size);

    let aligned_addr = align_up(addr, 32);
    let aligned_size = align_down(size, 32);
    if aligned_size > 0 {
        state.memory().zero(aligned_addr, aligned_size as usize);
        state.notify_store(aligned_addr, aligned_size);
    }
}

pub fn register(table: &SyscallTable) {
    table.register("DCInvalidateRange", dc_invalidate_range);
    table.register("DCFlushRange", dc_flush_range);
    table.register("DCStoreRange", dc_store_range);
    table.register("DCFlushRangeNoSync", dc_flush_range_no_sync);
    table.register("DCStoreRangeNoSync", dc_store_range_no_sync);
    table.register("DCZeroRange", dc_zero_range);
    table.register("DCTouchRange", dc_touch_range);
}
