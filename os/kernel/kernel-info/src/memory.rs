//! # Memory Layout

/// Higher Half Direct Map (HHDM) base.
/// Physical address `pa` is reachable at `HHDM_BASE + pa` once the direct map
/// is installed.
pub const HHDM_BASE: u64 = 0xffff_8880_0000_0000;

const _: () = assert!(HHDM_BASE.is_multiple_of(4096));
