pub mod cpuid;
pub mod walk;

pub use cpuid::*;
pub use walk::*;
