//! A RAL-like module to support DMA register access
//!
//! The BCM2837 doesn't have a generated RAL. The register blocks
//! and fields in here are written by hand against the BCM2835 ARM
//! peripherals datasheet; the BCM2837 keeps the same DMA engine.
//!
//! Field modules follow the RAL layout so that the `ral-registers`
//! macros work on them. The register cell is generic, so the same
//! driver code runs against the memory-mapped controller or the
//! software model.

#![allow(
    non_snake_case, // Compatibility with RAL
)]

pub mod dma;

pub use ral_registers::{modify_reg, read_reg, write_reg};
use ral_registers::RWRegister;

/// A 32-bit register cell.
///
/// The `ral-registers` macros only need `read()` and `write()`. Hardware
/// uses [`RWRegister`], which is a volatile access into mapped memory.
pub trait Register {
    /// Read the register.
    fn read(&self) -> u32;
    /// Write the register.
    fn write(&self, value: u32);
}

impl Register for RWRegister<u32> {
    #[inline(always)]
    fn read(&self) -> u32 {
        RWRegister::<u32>::read(self)
    }
    #[inline(always)]
    fn write(&self, value: u32) {
        RWRegister::<u32>::write(self, value)
    }
}

//
// Helper types for static memory
//
// Similar to the RAL's `Instance` type, but more copy.
//

pub(crate) struct Static<T>(pub(crate) *const T);
impl<T> core::ops::Deref for Static<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        // Safety: pointer points to static memory (peripheral memory)
        unsafe { &*self.0 }
    }
}
impl<T> Clone for Static<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Static<T> {}

//
// Field helpers for plain memory
//
// Control blocks live in normal memory and aren't registers. They
// still use the register field definitions.
//

/// Replace the field described by `mask` / `offset` in `word`.
///
/// `value` is truncated to the field width.
#[inline]
pub(crate) fn insert_field(word: &mut u32, mask: u32, offset: u32, value: u32) {
    *word = (*word & !mask) | ((value << offset) & mask);
}

/// Extract the field described by `mask` / `offset` from `word`.
#[inline]
pub(crate) const fn extract_field(word: u32, mask: u32, offset: u32) -> u32 {
    (word & mask) >> offset
}

#[cfg(test)]
mod tests {
    use super::{extract_field, insert_field};

    #[test]
    fn insert_truncates_to_field_width() {
        let mut word = 0xFFFF_FFFF;
        insert_field(&mut word, 0xF << 16, 16, 0x1234_5675);
        assert_eq!(word, 0xFFF5_FFFF);
        assert_eq!(extract_field(word, 0xF << 16, 16), 0x5);
    }

    #[test]
    fn insert_leaves_neighbours_alone() {
        let mut word = 0;
        insert_field(&mut word, 0x1F << 21, 21, 0x1F);
        insert_field(&mut word, 0x1F << 16, 16, 0);
        assert_eq!(word, 0x1F << 21);
    }
}
