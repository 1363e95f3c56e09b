//! Exhaustive CPUID leaf/subleaf enumeration.
//!
//! Walks every (leaf, subleaf) pair the processor — or the hypervisor
//! answering on its behalf — exposes, handing the raw registers for each
//! visit to a reporting sink.  The identification space is only partially
//! self-describing: each range's introductory leaf reports that range's
//! ceiling, a handful of leaves have their own subleaf iteration rules, and
//! a vendor extension window inside the hypervisor range is located by
//! signature match during the walk itself.
//!
//! The walker is provider-agnostic: it drives any `query(leaf, subleaf)`
//! callable, so the same walk can run over the native instruction and over
//! an emulated view supplied by a virtualization layer.

use core::fmt;

use super::cpuid::{
    CpuidRegisters, LEAF_BASIC_INFO, LEAF_CACHE_TOPOLOGY, LEAF_EXTENDED_BASE,
    LEAF_EXTENDED_FEATURES, LEAF_EXTENDED_STATE, LEAF_HYPERVISOR_BASE, LEAF_HYPERVISOR_SECOND,
    XSTATE_SUBLEAF_LIMIT,
};

/// Subleaf value passed while a leaf is not yet known to be sub-leafed.
/// Sub-leafed leaves ignore it; everything else must still receive a
/// deterministic value.
pub const SUBLEAF_UNSPECIFIED: u32 = !0;

/// Vendor window offset whose leaf carries a hardcoded two extra subleaves.
const VENDOR_SUBLEAF_OFFSET: u32 = 3;

/// Vendor window offset with leaf semantics; subleaf-reset to 0 but never
/// expanded further.
const VENDOR_LEAF_OFFSET: u32 = 4;

// =============================================================================
// Vendor Signature
// =============================================================================

/// Three-register hypervisor identity signature, as reported in EBX:ECX:EDX
/// of a hypervisor range's introductory leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VendorSignature {
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

const fn signature_word(bytes: &[u8; 12], at: usize) -> u32 {
    (bytes[at] as u32)
        | ((bytes[at + 1] as u32) << 8)
        | ((bytes[at + 2] as u32) << 16)
        | ((bytes[at + 3] as u32) << 24)
}

impl VendorSignature {
    /// Xen: `"XenVMMXenVMM"`.
    pub const XEN: Self = Self::from_ascii(b"XenVMMXenVMM");

    /// KVM: `"KVMKVMKVM\0\0\0"`.
    pub const KVM: Self = Self::from_ascii(b"KVMKVMKVM\0\0\0");

    /// Hyper-V: `"Microsoft Hv"`.
    pub const HYPERV: Self = Self::from_ascii(b"Microsoft Hv");

    /// Build a signature from its 12-byte ASCII form, split little-endian
    /// across EBX, ECX, EDX the way the hardware reports it.
    pub const fn from_ascii(bytes: &[u8; 12]) -> Self {
        Self {
            ebx: signature_word(bytes, 0),
            ecx: signature_word(bytes, 4),
            edx: signature_word(bytes, 8),
        }
    }

    /// Whether `regs` carries this signature in EBX:ECX:EDX.
    pub fn matches(&self, regs: &CpuidRegisters) -> bool {
        regs.ebx == self.ebx && regs.ecx == self.ecx && regs.edx == self.edx
    }
}

// =============================================================================
// Leaf Records
// =============================================================================

/// One visited (leaf, subleaf) pair and its raw register payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafRecord {
    pub leaf: u32,
    pub subleaf: u32,
    pub regs: CpuidRegisters,
}

impl fmt::Display for LeafRecord {
    /// Reference dump format: `leaf:subleaf -> eax:ebx:ecx:edx`, every
    /// field zero-padded to 8 hex digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}:{:08x} -> {:08x}:{:08x}:{:08x}:{:08x}",
            self.leaf, self.subleaf, self.regs.eax, self.regs.ebx, self.regs.ecx, self.regs.edx
        )
    }
}

// =============================================================================
// Walk Topology
// =============================================================================

/// How a leaf participates in the walk, resolved once per visit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeafKind {
    /// Leaf 0: reports the standard range ceiling.
    Standard0,
    /// Leaf 4: one subleaf per cache level, terminated by a zero type field.
    CacheTopology,
    /// Leaf 7: subleaf 0 reports its own subleaf ceiling.
    ExtendedFeatures,
    /// Leaf 0xd: subleaf 0 reports a validity bitmask; invalid subleaves
    /// are stepped over without being queried.
    ExtendedState,
    /// Leaf 0x40000000: hypervisor ceiling plus vendor signature check.
    HypervisorBase,
    /// Leaf 0x40000100: second hypervisor sub-range, same rules.
    HypervisorExt,
    /// Leaf 0x80000000: reports the extended range ceiling.
    ExtendedBase,
    /// Leaf inside the discovered vendor window, at this offset from its
    /// base.
    VendorWindow(u32),
    /// No special bookkeeping or subleaf iteration.
    Plain,
}

/// Range ceilings and sub-range bounds discovered during one walk.
///
/// Each field starts at its "not confirmed present" value and is written at
/// most once, when the owning range's introductory leaf is visited; from
/// then on it is authoritative for the rest of the walk.  The whole value
/// is local to a single [`LeafWalker::run`] call.
#[derive(Clone, Copy, Debug)]
struct WalkTopology {
    max_standard: u32,
    max_hypervisor: u32,
    max_hypervisor2: u32,
    max_extended: u32,
    max_l7_subleaf: u32,
    valid_xstate: u64,
    /// Vendor window bounds; `first > last` means "never discovered".
    vendor_first: u32,
    vendor_last: u32,
}

impl WalkTopology {
    const fn new() -> Self {
        Self {
            max_standard: 0,
            max_hypervisor: 0,
            max_hypervisor2: 0,
            max_extended: 0,
            max_l7_subleaf: 0,
            valid_xstate: 0,
            vendor_first: u32::MAX,
            vendor_last: 0,
        }
    }

    fn in_vendor_window(&self, leaf: u32) -> bool {
        self.vendor_first <= leaf && leaf <= self.vendor_last
    }

    fn classify(&self, leaf: u32) -> LeafKind {
        match leaf {
            LEAF_BASIC_INFO => LeafKind::Standard0,
            LEAF_CACHE_TOPOLOGY => LeafKind::CacheTopology,
            LEAF_EXTENDED_FEATURES => LeafKind::ExtendedFeatures,
            LEAF_EXTENDED_STATE => LeafKind::ExtendedState,
            LEAF_HYPERVISOR_BASE => LeafKind::HypervisorBase,
            LEAF_HYPERVISOR_SECOND => LeafKind::HypervisorExt,
            LEAF_EXTENDED_BASE => LeafKind::ExtendedBase,
            _ if self.in_vendor_window(leaf) => LeafKind::VendorWindow(leaf - self.vendor_first),
            _ => LeafKind::Plain,
        }
    }

    /// Whether `leaf` iterates subleaves starting from 0, rather than being
    /// queried once with the unspecified sentinel.
    fn is_subleafed(&self, leaf: u32) -> bool {
        matches!(
            self.classify(leaf),
            LeafKind::CacheTopology
                | LeafKind::ExtendedFeatures
                | LeafKind::ExtendedState
                | LeafKind::VendorWindow(VENDOR_SUBLEAF_OFFSET | VENDOR_LEAF_OFFSET)
        )
    }
}

// =============================================================================
// Walker
// =============================================================================

/// CPUID space enumerator.
///
/// Holds the vendor signature to probe for; all traversal state lives in a
/// fresh [`WalkTopology`] per [`run`](Self::run) call, so one walker can
/// drive any number of providers sequentially.
#[derive(Clone, Copy, Debug)]
pub struct LeafWalker {
    signature: VendorSignature,
}

impl Default for LeafWalker {
    fn default() -> Self {
        Self::new()
    }
}

impl LeafWalker {
    /// Walker probing for the Xen signature.
    pub const fn new() -> Self {
        Self::with_signature(VendorSignature::XEN)
    }

    /// Walker probing for a specific hypervisor vendor signature.  Only one
    /// signature is checked per walk.
    pub const fn with_signature(signature: VendorSignature) -> Self {
        Self { signature }
    }

    /// Visit every (leaf, subleaf) pair `query` exposes, passing each record
    /// to `sink` in discovery order.
    ///
    /// Leaves are visited in non-decreasing order and subleaves strictly
    /// increase within a leaf.  The walk ends when the leaf counter passes
    /// the extended range ceiling — the only termination condition — which
    /// happens for any provider reporting fixed, finite ceilings.  A range
    /// whose ceiling is never reported still has its introductory leaf
    /// visited exactly once; the zero ceiling then exits the range on the
    /// next advance.
    pub fn run<Q, S>(&self, mut query: Q, mut sink: S)
    where
        Q: FnMut(u32, u32) -> CpuidRegisters,
        S: FnMut(&LeafRecord),
    {
        let mut topo = WalkTopology::new();
        let mut leaf: u32 = LEAF_BASIC_INFO;
        let mut subleaf: u32 = SUBLEAF_UNSPECIFIED;

        loop {
            let regs = query(leaf, subleaf);
            sink(&LeafRecord { leaf, subleaf, regs });

            // Requery the same leaf at the bumped subleaf when set.
            let mut expand = false;

            match topo.classify(leaf) {
                LeafKind::Standard0 => topo.max_standard = regs.eax,
                LeafKind::CacheTopology => {
                    subleaf = subleaf.wrapping_add(1);
                    // A zero type field in EAX[4:0] ends the cache list.
                    expand = regs.eax & 0x1f != 0;
                }
                LeafKind::ExtendedFeatures => {
                    if subleaf == 0 {
                        topo.max_l7_subleaf = regs.eax;
                    }
                    subleaf = subleaf.wrapping_add(1);
                    expand = subleaf <= topo.max_l7_subleaf;
                }
                LeafKind::ExtendedState => {
                    if subleaf == 0 {
                        topo.valid_xstate = (u64::from(regs.edx) << 32) | u64::from(regs.eax);
                    }
                    // Step over subleaves whose validity bit is clear; they
                    // must not be queried at all.
                    loop {
                        subleaf = subleaf.wrapping_add(1);
                        if subleaf >= XSTATE_SUBLEAF_LIMIT
                            || topo.valid_xstate & (1u64 << subleaf) != 0
                        {
                            break;
                        }
                    }
                    expand = subleaf < XSTATE_SUBLEAF_LIMIT;
                }
                LeafKind::HypervisorBase => {
                    topo.max_hypervisor = regs.eax;
                    if self.signature.matches(&regs) {
                        topo.vendor_first = leaf;
                        topo.vendor_last = regs.eax;
                    }
                }
                LeafKind::HypervisorExt => {
                    topo.max_hypervisor2 = regs.eax;
                    if self.signature.matches(&regs) {
                        topo.vendor_first = leaf;
                        topo.vendor_last = regs.eax;
                    }
                }
                LeafKind::ExtendedBase => topo.max_extended = regs.eax,
                LeafKind::VendorWindow(_) | LeafKind::Plain => {}
            }

            if expand {
                continue;
            }

            // Vendor window rules apply to every leaf inside the window,
            // including the introductory leaf that just established it.
            // The window advertises no per-leaf ceiling of its own: offset
            // 3 carries a hardcoded two extra subleaves, offset 4 has leaf
            // semantics and is never expanded.
            if topo.in_vendor_window(leaf)
                && leaf - topo.vendor_first == VENDOR_SUBLEAF_OFFSET
                && subleaf < 2
            {
                subleaf += 1;
                continue;
            }

            // Advance, jumping across the gap to the next range whenever
            // the current range's ceiling has been passed.
            leaf = leaf.wrapping_add(1);
            if leaf > LEAF_BASIC_INFO && leaf < LEAF_HYPERVISOR_BASE && leaf > topo.max_standard {
                leaf = LEAF_HYPERVISOR_BASE;
            }
            if leaf > LEAF_HYPERVISOR_BASE
                && leaf < LEAF_HYPERVISOR_SECOND
                && leaf > topo.max_hypervisor
            {
                leaf = LEAF_HYPERVISOR_SECOND;
            }
            if leaf > LEAF_HYPERVISOR_SECOND
                && leaf < LEAF_EXTENDED_BASE
                && leaf > topo.max_hypervisor2
            {
                leaf = LEAF_EXTENDED_BASE;
            }
            if leaf > LEAF_EXTENDED_BASE && leaf > topo.max_extended {
                break;
            }

            subleaf = if topo.is_subleafed(leaf) {
                0
            } else {
                SUBLEAF_UNSPECIFIED
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xen_signature_words() {
        assert_eq!(VendorSignature::XEN.ebx, 0x566e_6558); // "XenV"
        assert_eq!(VendorSignature::XEN.ecx, 0x6558_4d4d); // "MMXe"
        assert_eq!(VendorSignature::XEN.edx, 0x4d4d_566e); // "nVMM"
    }

    #[test]
    fn signature_match_requires_all_three_registers() {
        let sig = VendorSignature::XEN;
        let mut regs = CpuidRegisters {
            eax: 0x4000_0005,
            ebx: sig.ebx,
            ecx: sig.ecx,
            edx: sig.edx,
        };
        assert!(sig.matches(&regs));

        regs.ecx ^= 1;
        assert!(!sig.matches(&regs));
    }

    #[test]
    fn empty_window_matches_nothing() {
        let topo = WalkTopology::new();
        assert!(!topo.in_vendor_window(0));
        assert!(!topo.in_vendor_window(LEAF_HYPERVISOR_BASE));
        assert!(!topo.in_vendor_window(u32::MAX));
    }

    #[test]
    fn classification_prefers_special_leaves() {
        let mut topo = WalkTopology::new();
        assert_eq!(topo.classify(0), LeafKind::Standard0);
        assert_eq!(topo.classify(4), LeafKind::CacheTopology);
        assert_eq!(topo.classify(7), LeafKind::ExtendedFeatures);
        assert_eq!(topo.classify(0xd), LeafKind::ExtendedState);
        assert_eq!(topo.classify(0x4000_0000), LeafKind::HypervisorBase);
        assert_eq!(topo.classify(0x4000_0100), LeafKind::HypervisorExt);
        assert_eq!(topo.classify(0x8000_0000), LeafKind::ExtendedBase);
        assert_eq!(topo.classify(5), LeafKind::Plain);

        topo.vendor_first = 0x4000_0000;
        topo.vendor_last = 0x4000_0005;
        assert_eq!(topo.classify(0x4000_0003), LeafKind::VendorWindow(3));
        // The introductory leaf keeps its own kind even inside the window.
        assert_eq!(topo.classify(0x4000_0000), LeafKind::HypervisorBase);
        assert_eq!(topo.classify(0x4000_0006), LeafKind::Plain);
    }

    #[test]
    fn subleaf_reset_rule() {
        let mut topo = WalkTopology::new();
        assert!(topo.is_subleafed(4));
        assert!(topo.is_subleafed(7));
        assert!(topo.is_subleafed(0xd));
        assert!(!topo.is_subleafed(0));
        assert!(!topo.is_subleafed(1));
        assert!(!topo.is_subleafed(0x4000_0000));

        topo.vendor_first = 0x4000_0000;
        topo.vendor_last = 0x4000_0005;
        assert!(topo.is_subleafed(0x4000_0003));
        assert!(topo.is_subleafed(0x4000_0004));
        assert!(!topo.is_subleafed(0x4000_0002));
        assert!(!topo.is_subleafed(0x4000_0005));
    }

    #[test]
    fn record_display_is_zero_padded_hex() {
        let record = LeafRecord {
            leaf: 0x4000_0000,
            subleaf: SUBLEAF_UNSPECIFIED,
            regs: CpuidRegisters {
                eax: 0x4000_0005,
                ebx: 0x566e_6558,
                ecx: 0x6558_4d4d,
                edx: 0x4d4d_566e,
            },
        };
        assert_eq!(
            record.to_string(),
            "40000000:ffffffff -> 40000005:566e6558:65584d4d:4d4d566e"
        );
    }
}
