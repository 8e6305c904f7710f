//! Wii U memory map constants

/// System data view base address
pub const SYSTEM_DATA_BASE: u32 = 0x0100_0000;
/// System data view end address (exclusive)
pub const SYSTEM_DATA_END: u32 = 0x0200_0000;
/// System data page size (4 KiB)
pub const SYSTEM_DATA_PAGE: u32 = 0x1000;

/// Application (MEM2) view base address
pub const APPLICATION_BASE: u32 = 0x0200_0000;
/// Application view end address (exclusive, 1 GiB)
pub const APPLICATION_END: u32 = 0x4200_0000;
/// Application page size (128 KiB)
pub const APPLICATION_PAGE: u32 = 0x2_0000;

/// Foreground bucket view base address
pub const FOREGROUND_BASE: u32 = 0xE000_0000;
/// Foreground bucket view end address (exclusive, 64 MiB)
pub const FOREGROUND_END: u32 = 0xE400_0000;
/// Foreground bucket page size (128 KiB)
pub const FOREGROUND_PAGE: u32 = 0x2_0000;

/// MEM1 view base address
pub const MEM1_BASE: u32 = 0xF400_0000;
/// MEM1 view end address (exclusive, 32 MiB)
pub const MEM1_END: u32 = 0xF600_0000;
/// MEM1 page size (64 KiB)
pub const MEM1_PAGE: u32 = 0x1_0000;

/// Total guest address space size (4 GiB, 32-bit)
pub const ADDRESS_SPACE_SIZE: usize = 0x1_0000_0000;

/// Espresso data cache line size in bytes
pub const CACHE_LINE: u32 = 32;

/// Sentinel program counter that terminates the interpreter loop.
///
/// Outside every mapped view; the only place it appears is as an LR value
/// installed by `execute_sub`.
pub const CALLBACK_ADDR: u32 = 0xFBAD_CDE0;
