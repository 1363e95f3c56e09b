//! Page table entry encoding.
//!
//! Entries are raw `u64`s: a physical frame address combined with
//! [`PteFlags`].  The helpers here only pack and unpack — building or
//! walking page tables is out of scope.

use bitflags::bitflags;

bitflags! {
    /// x86_64 page table entry flags.
    ///
    /// These flags control page permissions, caching behavior, and the
    /// hardware-maintained access/dirty bits.  Combine with `|`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PteFlags: u64 {
        /// Page is present in memory (bit 0).
        const PRESENT       = 1 << 0;
        /// Page is writable, otherwise read-only (bit 1).
        const WRITABLE      = 1 << 1;
        /// Page is accessible from user mode (bit 2).
        const USER          = 1 << 2;
        /// Write-through caching (bit 3).
        const WRITE_THROUGH = 1 << 3;
        /// Disable caching for this page (bit 4).
        const CACHE_DISABLE = 1 << 4;
        /// Set by hardware when the page is accessed (bit 5).
        const ACCESSED      = 1 << 5;
        /// Set by hardware when the page is written (bit 6).
        const DIRTY         = 1 << 6;
        /// 2MB (PDE) or 1GB (PDPTE) huge page (bit 7).
        const HUGE          = 1 << 7;
        /// Not flushed from the TLB on CR3 change (bit 8).
        const GLOBAL        = 1 << 8;
        /// Disable instruction fetch (bit 63).  Requires EFER.NXE.
        const NO_EXECUTE    = 1 << 63;

        /// Kernel read-write page.
        const KERNEL_RW = Self::PRESENT.bits() | Self::WRITABLE.bits();
        /// Kernel read-only page.
        const KERNEL_RO = Self::PRESENT.bits();
        /// User read-write page.
        const USER_RW = Self::PRESENT.bits() | Self::WRITABLE.bits() | Self::USER.bits();
        /// User read-only page.
        const USER_RO = Self::PRESENT.bits() | Self::USER.bits();
    }
}

/// 4KB page shift.
pub const PAGE_SHIFT: u32 = 12;

/// 4KB page size.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Bits 12-51 of an entry: the physical frame address.
pub const PTE_ADDR_MASK: u64 = 0x000f_ffff_ffff_f000;

/// Physical address mapped by `pte`, flags stripped.
#[inline]
pub const fn pte_to_paddr(pte: u64) -> u64 {
    pte & PTE_ADDR_MASK
}

/// Entry mapping `paddr` with `flags`.  `paddr` must be page aligned.
#[inline]
pub const fn pte_from_paddr(paddr: u64, flags: PteFlags) -> u64 {
    paddr | flags.bits()
}

/// Entry mapping physical frame number `frame` with `flags`.
#[inline]
pub const fn pte_from_frame(frame: u64, flags: PteFlags) -> u64 {
    pte_from_paddr(frame << PAGE_SHIFT, flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_encoding_round_trip() {
        let pte = pte_from_frame(0x1234, PteFlags::KERNEL_RW);
        assert_eq!(pte_to_paddr(pte), 0x1234 << PAGE_SHIFT);
        assert!(PteFlags::from_bits_truncate(pte).contains(PteFlags::PRESENT));
        assert!(PteFlags::from_bits_truncate(pte).contains(PteFlags::WRITABLE));
        assert!(!PteFlags::from_bits_truncate(pte).contains(PteFlags::USER));
    }

    #[test]
    fn no_execute_does_not_clobber_address() {
        let paddr = 0x000f_ffff_ffff_f000;
        let pte = pte_from_paddr(paddr, PteFlags::USER_RO.union(PteFlags::NO_EXECUTE));
        assert_eq!(pte_to_paddr(pte), paddr);
        assert!(PteFlags::from_bits_truncate(pte).contains(PteFlags::NO_EXECUTE));
    }

    #[test]
    fn address_mask_excludes_flag_bits() {
        assert_eq!(PTE_ADDR_MASK & PteFlags::all().bits(), 0);
        assert_eq!(PTE_ADDR_MASK & (PAGE_SIZE - 1), 0);
    }
}
