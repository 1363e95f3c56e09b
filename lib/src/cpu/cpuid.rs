//! CPUID instruction access.
//!
//! Thin wrappers around the hardware instruction, plus the leaf numbers the
//! enumeration walker dispatches on.  Register contents are opaque payload
//! here — no feature-flag decoding is attached.

/// Raw result of one CPUID invocation, named by register role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CpuidRegisters {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

// =============================================================================
// Leaf Numbers
// =============================================================================

/// Highest standard leaf and vendor string.
pub const LEAF_BASIC_INFO: u32 = 0x0;

/// Deterministic cache parameters; one subleaf per cache level.
pub const LEAF_CACHE_TOPOLOGY: u32 = 0x4;

/// Structured extended features; subleaf 0 reports the subleaf count in EAX.
pub const LEAF_EXTENDED_FEATURES: u32 = 0x7;

/// XSAVE state enumeration; subleaf 0 reports valid subleaves in EDX:EAX.
pub const LEAF_EXTENDED_STATE: u32 = 0xd;

/// Base of the hypervisor information range.
pub const LEAF_HYPERVISOR_BASE: u32 = 0x4000_0000;

/// Base of the second hypervisor sub-range (viridian-compatible layouts).
pub const LEAF_HYPERVISOR_SECOND: u32 = 0x4000_0100;

/// Base of the extended function range.
pub const LEAF_EXTENDED_BASE: u32 = 0x8000_0000;

/// Highest architecturally meaningful XSAVE subleaf.
pub const XSTATE_SUBLEAF_LIMIT: u32 = 63;

// =============================================================================
// Instruction Wrappers
// =============================================================================

/// Execute CPUID with the given leaf (subleaf left to the hardware default).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_unsafe)]
pub fn cpuid(leaf: u32) -> CpuidRegisters {
    let res = unsafe { core::arch::x86_64::__cpuid(leaf) };
    CpuidRegisters {
        eax: res.eax,
        ebx: res.ebx,
        ecx: res.ecx,
        edx: res.edx,
    }
}

/// Execute CPUID with a specific leaf **and subleaf** (ECX).
///
/// Required for leaves that enumerate multiple sub-structures, such as
/// leaf `0x0D` (XSAVE state enumeration) and leaf `0x07` (structured
/// extended features).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
#[allow(unused_unsafe)]
pub fn cpuid_count(leaf: u32, subleaf: u32) -> CpuidRegisters {
    let res = unsafe { core::arch::x86_64::__cpuid_count(leaf, subleaf) };
    CpuidRegisters {
        eax: res.eax,
        ebx: res.ebx,
        ecx: res.ecx,
        edx: res.edx,
    }
}

// =============================================================================
// Cached Range Ceilings
// =============================================================================

#[cfg(target_arch = "x86_64")]
static MAX_STANDARD_LEAF: spin::Once<u32> = spin::Once::new();

#[cfg(target_arch = "x86_64")]
static MAX_EXTENDED_LEAF: spin::Once<u32> = spin::Once::new();

/// Highest standard leaf reported by leaf 0.  Queried once and cached;
/// the value is constant for a given CPU.
#[cfg(target_arch = "x86_64")]
pub fn max_standard_leaf() -> u32 {
    *MAX_STANDARD_LEAF.call_once(|| cpuid(LEAF_BASIC_INFO).eax)
}

/// Highest extended leaf reported by leaf 0x80000000.  Queried once and
/// cached.
#[cfg(target_arch = "x86_64")]
pub fn max_extended_leaf() -> u32 {
    *MAX_EXTENDED_LEAF.call_once(|| cpuid(LEAF_EXTENDED_BASE).eax)
}
