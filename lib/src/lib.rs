#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod cpu;
pub mod dlog;

pub use cpu::cpuid::CpuidRegisters;
pub use cpu::walk::{LeafRecord, LeafWalker, SUBLEAF_UNSPECIFIED, VendorSignature};
pub use dlog::{DlogLevel, dlog_get_level, dlog_register_backend, dlog_set_level};
