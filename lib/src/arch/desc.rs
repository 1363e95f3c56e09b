//! Segment and gate descriptor layouts.
//!
//! Pure data contracts: byte and bit positions follow the processor's
//! documented formats exactly (Intel SDM Vol. 3A, §3.4.5 and §6.14.1).
//! Nothing here loads a table — constructing and inspecting descriptor
//! images is the whole job.
//!
//! | Item | Purpose |
//! |------|---------|
//! | [`SegmentSelector`] | 16-bit selector: index, table indicator, RPL |
//! | [`SegAttr`] | User segment attribute bits in packed form |
//! | [`SegmentDescriptor`] | 8-byte GDT/LDT user segment |
//! | [`GateDescriptor32`] | 8-byte protected mode IDT/call gate |
//! | [`GateDescriptor64`] | 16-byte long mode IDT gate |
//! | [`DescTablePtr32`], [`DescTablePtr64`] | `lgdt`/`lidt` operands |

use bitflags::bitflags;

// =============================================================================
// Segment Selector
// =============================================================================

/// x86 segment selector.
///
/// Layout (16 bits):
/// - Bits 0-1: Requested Privilege Level (RPL)
/// - Bit 2: Table Indicator (0 = GDT, 1 = LDT)
/// - Bits 3-15: Descriptor index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    /// Null selector (index 0, GDT, RPL 0).
    pub const NULL: Self = Self(0);

    /// Create a new segment selector.
    #[inline]
    pub const fn new(index: u16, ldt: bool, rpl: u8) -> Self {
        let ti = if ldt { 1 << 2 } else { 0 };
        Self((index << 3) | ti | (rpl as u16 & 0x3))
    }

    /// Get the descriptor table index.
    #[inline]
    pub const fn index(self) -> u16 {
        self.0 >> 3
    }

    /// Check if this selector references the LDT.
    #[inline]
    pub const fn is_ldt(self) -> bool {
        self.0 & (1 << 2) != 0
    }

    /// Get the requested privilege level (0-3).
    #[inline]
    pub const fn rpl(self) -> u8 {
        (self.0 & 0x3) as u8
    }

    /// Get the raw selector value.
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }
}

// =============================================================================
// User Segment Attributes
// =============================================================================

bitflags! {
    /// GDT/LDT user segment attribute bits in the packed form consumed by
    /// [`SegmentDescriptor::new`]: the access byte in bits 0-7, the flags
    /// nibble in bits 12-15.  Bits 8-11 are unused and masked off during
    /// packing.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SegAttr: u16 {
        /// Limit granularity (set = 4K units).
        const G = 0x8000;
        /// Default operand size (set = 32-bit); `B` flag for data segments.
        const D = 0x4000;
        /// Long mode code segment.
        const L = 0x2000;
        /// Available for software use.
        const AVL = 0x1000;
        /// Present.
        const P = 0x0080;
        /// Descriptor privilege level 1.
        const DPL1 = 0x0020;
        /// Descriptor privilege level 2.
        const DPL2 = 0x0040;
        /// Descriptor privilege level 3 (both DPL bits).
        const DPL3 = 0x0060;
        /// Non-system descriptor (code or data).
        const S = 0x0010;
        /// Code segment (clear = data).
        const CODE = 0x0008;
        /// Conforming for code, expand-down for data.
        const C = 0x0004;
        /// Readable for code, writable for data.
        const RW = 0x0002;
        /// Accessed; set by hardware on first use.
        const A = 0x0001;

        /// Commonly set bits: G, P, S, A.
        const COMMON = 0x8091;
    }
}

// =============================================================================
// User Segment Descriptor
// =============================================================================

/// 8-byte GDT/LDT user segment descriptor (`S` bit set).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentDescriptor(pub u64);

impl SegmentDescriptor {
    /// Null descriptor — GDT index 0.
    pub const NULL: Self = Self(0);

    /// Pack `base`, `limit` and `attr` into descriptor form.
    ///
    /// Bit layout:
    /// - Bits  0-15: Limit 15:0
    /// - Bits 16-39: Base 23:0
    /// - Bits 40-47: Access byte (attr 7:0)
    /// - Bits 48-51: Limit 19:16
    /// - Bits 52-55: Flags (attr 15:12)
    /// - Bits 56-63: Base 31:24
    pub const fn new(base: u32, limit: u32, attr: SegAttr) -> Self {
        let attr = (attr.bits() & 0xf0ff) as u64;
        let base = base as u64;
        let limit = limit as u64;
        let lo = ((base & 0xffff) << 16) | (limit & 0xffff);
        let hi = (base & 0xff00_0000)
            | (limit & 0x000f_0000)
            | (attr << 8)
            | ((base & 0x00ff_0000) >> 16);
        Self((hi << 32) | lo)
    }

    /// Segment base address.
    pub const fn base(self) -> u32 {
        let low = (self.0 >> 16) & 0xffff;
        let mid = (self.0 >> 32) & 0xff;
        let high = (self.0 >> 56) & 0xff;
        (low | (mid << 16) | (high << 24)) as u32
    }

    /// Raw 20-bit limit field; units depend on the G bit.
    pub const fn limit(self) -> u32 {
        ((self.0 & 0xffff) | ((self.0 >> 32) & 0x000f_0000)) as u32
    }

    /// Attribute bits in the packed [`SegAttr`] form.
    pub const fn attr(self) -> SegAttr {
        let access = (self.0 >> 40) & 0xff;
        let flags = (self.0 >> 52) & 0xf;
        SegAttr::from_bits_retain(((flags << 12) | access) as u16)
    }
}

/// Flat 64-bit ring-0 code segment (0x00af9b000000ffff).
pub const KERNEL_CODE64_DESCRIPTOR: SegmentDescriptor = SegmentDescriptor::new(
    0,
    0xf_ffff,
    SegAttr::COMMON.union(SegAttr::L).union(SegAttr::CODE).union(SegAttr::RW),
);

/// Flat ring-0 data segment (0x00cf93000000ffff).
pub const KERNEL_DATA_DESCRIPTOR: SegmentDescriptor = SegmentDescriptor::new(
    0,
    0xf_ffff,
    SegAttr::COMMON.union(SegAttr::D).union(SegAttr::RW),
);

/// Flat 64-bit ring-3 code segment (0x00affb000000ffff).
pub const USER_CODE64_DESCRIPTOR: SegmentDescriptor = SegmentDescriptor::new(
    0,
    0xf_ffff,
    SegAttr::COMMON
        .union(SegAttr::L)
        .union(SegAttr::CODE)
        .union(SegAttr::RW)
        .union(SegAttr::DPL3),
);

/// Flat ring-3 data segment (0x00cff3000000ffff).
pub const USER_DATA_DESCRIPTOR: SegmentDescriptor = SegmentDescriptor::new(
    0,
    0xf_ffff,
    SegAttr::COMMON
        .union(SegAttr::D)
        .union(SegAttr::RW)
        .union(SegAttr::DPL3),
);

// =============================================================================
// Gate Descriptors
// =============================================================================

/// Interrupt gate type attribute (DPL=0, present).  Clears IF on entry.
pub const GATE_TYPE_INTERRUPT: u8 = 0x8E;

/// Trap gate type attribute (DPL=0, present).  Does not clear IF on entry.
pub const GATE_TYPE_TRAP: u8 = 0x8F;

/// 8-byte gate: protected mode IDT entry, GDT task/call gate.
///
/// Hardware-defined layout — do not reorder or add fields.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct GateDescriptor32 {
    pub offset_low: u16,
    pub selector: u16,
    reserved: u8,
    pub type_attr: u8,
    pub offset_high: u16,
}

impl GateDescriptor32 {
    /// Zeroed (not-present) gate.
    pub const fn zero() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            reserved: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    pub const fn new(offset: u32, selector: SegmentSelector, type_attr: u8) -> Self {
        Self {
            offset_low: offset as u16,
            selector: selector.0,
            reserved: 0,
            type_attr,
            offset_high: (offset >> 16) as u16,
        }
    }

    /// Entry point offset.
    pub const fn offset(self) -> u32 {
        self.offset_low as u32 | ((self.offset_high as u32) << 16)
    }
}

/// 16-byte gate: long mode IDT entry.
///
/// Hardware-defined layout — do not reorder or add fields.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct GateDescriptor64 {
    pub offset_low: u16,
    pub selector: u16,
    /// IST index in bits 0-2, rest reserved.
    pub ist: u8,
    pub type_attr: u8,
    pub offset_mid: u16,
    pub offset_high: u32,
    reserved: u32,
}

impl GateDescriptor64 {
    /// Zeroed (not-present) gate.
    pub const fn zero() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            ist: 0,
            type_attr: 0,
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    pub const fn new(offset: u64, selector: SegmentSelector, ist: u8, type_attr: u8) -> Self {
        Self {
            offset_low: offset as u16,
            selector: selector.0,
            ist: ist & 0x7,
            type_attr,
            offset_mid: (offset >> 16) as u16,
            offset_high: (offset >> 32) as u32,
            reserved: 0,
        }
    }

    /// Entry point offset.
    pub const fn offset(self) -> u64 {
        self.offset_low as u64
            | ((self.offset_mid as u64) << 16)
            | ((self.offset_high as u64) << 32)
    }
}

// =============================================================================
// Descriptor Table Pointers
// =============================================================================

/// Protected mode `lgdt`/`lidt` operand: limit (byte count - 1) + base.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DescTablePtr32 {
    pub limit: u16,
    pub base: u32,
}

/// Long mode `lgdt`/`lidt` operand: limit (byte count - 1) + base.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DescTablePtr64 {
    pub limit: u16,
    pub base: u64,
}

// =============================================================================
// Compile-time layout assertions
// =============================================================================

const _: () = {
    assert!(core::mem::size_of::<SegmentDescriptor>() == 8);
    assert!(core::mem::size_of::<GateDescriptor32>() == 8);
    assert!(core::mem::size_of::<GateDescriptor64>() == 16);
    assert!(core::mem::size_of::<DescTablePtr32>() == 6);
    assert!(core::mem::size_of::<DescTablePtr64>() == 10);

    assert!(SegAttr::COMMON.bits() == 0x8091);
    assert!(KERNEL_CODE64_DESCRIPTOR.0 == 0x00af_9b00_0000_ffff);
    assert!(KERNEL_DATA_DESCRIPTOR.0 == 0x00cf_9300_0000_ffff);
    assert!(USER_CODE64_DESCRIPTOR.0 == 0x00af_fb00_0000_ffff);
    assert!(USER_DATA_DESCRIPTOR.0 == 0x00cf_f300_0000_ffff);
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_descriptor_field_round_trip() {
        let attr = SegAttr::COMMON.union(SegAttr::D).union(SegAttr::RW);
        let desc = SegmentDescriptor::new(0x1234_5678, 0xa_bcde, attr);
        assert_eq!(desc.base(), 0x1234_5678);
        assert_eq!(desc.limit(), 0xa_bcde);
        assert_eq!(desc.attr(), attr);
    }

    #[test]
    fn segment_descriptor_masks_out_of_range_fields() {
        // Limit is 20 bits; higher bits must not leak into the base.
        let desc = SegmentDescriptor::new(0, 0xfff_ffff, SegAttr::COMMON);
        assert_eq!(desc.limit(), 0xf_ffff);
        assert_eq!(desc.base(), 0);
    }

    #[test]
    fn selector_decomposition() {
        let sel = SegmentSelector::new(4, false, 3);
        assert_eq!(sel.bits(), 0x23);
        assert_eq!(sel.index(), 4);
        assert_eq!(sel.rpl(), 3);
        assert!(!sel.is_ldt());

        let ldt_sel = SegmentSelector::new(2, true, 0);
        assert!(ldt_sel.is_ldt());
        assert_eq!(ldt_sel.index(), 2);
    }

    #[test]
    fn gate32_offset_split() {
        let gate = GateDescriptor32::new(
            0xdead_beef,
            SegmentSelector::new(1, false, 0),
            GATE_TYPE_INTERRUPT,
        );
        assert_eq!(gate.offset(), 0xdead_beef);
        let selector = gate.selector;
        assert_eq!(selector, 0x08);
        let type_attr = gate.type_attr;
        assert_eq!(type_attr, 0x8E);
    }

    #[test]
    fn gate64_offset_split() {
        let gate = GateDescriptor64::new(
            0xffff_8000_1234_5678,
            SegmentSelector::new(1, false, 0),
            2,
            GATE_TYPE_TRAP,
        );
        assert_eq!(gate.offset(), 0xffff_8000_1234_5678);
        let ist = gate.ist;
        assert_eq!(ist, 2);
    }

    #[test]
    fn gate64_ist_is_three_bits() {
        let gate = GateDescriptor64::new(0, SegmentSelector::NULL, 0xff, GATE_TYPE_INTERRUPT);
        let ist = gate.ist;
        assert_eq!(ist, 0x7);
    }
}
