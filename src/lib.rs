//! Direct Memory Access (DMA) driver for the BCM2837 (Raspberry Pi 3).
//!
//! `bcm2837-dma` provides
//!
//! - a register-level API for the 15 DMA channels reachable through the
//!   DMA window, both "standard" (0 through 6) and "lite" (7 through 14).
//! - [`ControlBlock`], the in-memory transfer descriptor that the engine
//!   reads once you hand it the block's physical address.
//! - the 6-byte command protocol that splits the driver into a
//!   register-side half ([`Dma::dispatch`]) and a user-side half
//!   ([`client::DmaClient`]) talking through a pseudo-file.
//! - physical / virtual [address translation](mmu).
//!
//! # Getting started
//!
//! The register-side half needs the DMA window mapped into the address
//! space. In a kernel module, that's the `ioremap` of [`ral::dma::DMA_BASE`].
//! From user space with the `devmem` feature, use `devmem::Mapping`.
//!
//! ```no_run
//! use bcm2837_dma::{ControlBlock, Dma};
//! # let window: *const () = core::ptr::null();
//!
//! // Safety: `window` is the mapped DMA register window.
//! let dma = unsafe { Dma::new(window) };
//!
//! let mut cb = ControlBlock::new();
//! cb.set_src_addr_phys(0xC000_0000);
//! cb.set_dst_addr_phys(0xC000_1000);
//! cb.enable_src_addr_inc(true);
//! cb.enable_dst_addr_inc(true);
//! cb.set_transfer_length_bytes(256);
//!
//! let channel = dma.channel(0).unwrap();
//! channel.set_control_block_address(0xC000_2000);
//! channel.set_transfer_active(true);
//! while !channel.transfer_done() {}
//! ```
//!
//! Most callers live in user space and use the [`client`] instead.
//!
//! ### License
//!
//! Licensed under either of
//!
//! - [Apache License, Version 2.0](http://www.apache.org/licenses/LICENSE-2.0)
//! - [MIT License](http://opensource.org/licenses/MIT)
//!
//! at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted
//! for inclusion in the work by you, as defined in the Apache-2.0 license, shall be
//! dual licensed as above, without any additional terms or conditions.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(test, not(feature = "std")))]
extern crate std;

mod barrier;
pub mod channel;
#[cfg(feature = "std")]
pub mod client;
mod control_block;
#[cfg(feature = "devmem")]
pub mod devmem;
mod dispatch;
mod error;
pub mod mmu;
pub mod protocol;
pub mod ral;
#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use channel::{Channel, ChannelType};
pub use control_block::{permap, ControlBlock};
pub use dispatch::Service;
pub use error::Error;
pub use mmu::Translate;

use ral::dma::{ChannelRegisterBlock, GlobalRegisterBlock, CHANNEL_COUNT};
use ral::{Register, Static};
use ral_registers::RWRegister;

/// A DMA result
pub type Result<T> = core::result::Result<T, Error>;

/// The DMA hardware context.
///
/// `Dma` holds handles to every channel register block and to the two
/// registers that all channels share. Build it once, when the register
/// window is mapped, then pass it by reference to whatever needs it.
///
/// `R` is the register cell. It's the memory-mapped register unless
/// you're driving the [software model](crate::sim).
pub struct Dma<R = RWRegister<u32>> {
    channels: [Static<ChannelRegisterBlock<R>>; CHANNEL_COUNT],
    global: Static<GlobalRegisterBlock<R>>,
}

// Safety: OK to allocate a DMA driver in a static context. Shared
// read-modify-writes are serialized in the driver.
unsafe impl<R> Sync for Dma<R> {}
// Safety: only holds pointers to peripheral memory.
unsafe impl<R> Send for Dma<R> {}

impl Dma {
    /// Create the DMA driver over the mapped DMA window.
    ///
    /// # Safety
    ///
    /// `window` must point to the start of the DMA register window
    /// ([`ral::dma::DMA_BASE`] before mapping), and the mapping must span
    /// [`ral::dma::DMA_WINDOW_SIZE`] bytes for as long as the `Dma` lives.
    pub const unsafe fn new(window: *const ()) -> Self {
        use ral::dma::{CHANNEL_STRIDE, GLOBAL_OFFSET};

        let base = window.cast::<u8>();
        let mut channels = [Static(core::ptr::null()); CHANNEL_COUNT];
        let mut index = 0;
        while index < CHANNEL_COUNT {
            channels[index] = Static(base.add(index * CHANNEL_STRIDE).cast());
            index += 1;
        }
        Self {
            channels,
            global: Static(base.add(GLOBAL_OFFSET).cast()),
        }
    }
}

impl<R: Register> Dma<R> {
    /// Create the DMA driver from individual register blocks.
    ///
    /// # Safety
    ///
    /// Every pointer must point to a register block that stays valid
    /// for as long as the `Dma` lives. `channels[n]` must be the block
    /// for channel `n`.
    pub const unsafe fn from_raw_parts(
        channels: [*const ChannelRegisterBlock<R>; CHANNEL_COUNT],
        global: *const GlobalRegisterBlock<R>,
    ) -> Self {
        let mut statics = [Static(core::ptr::null()); CHANNEL_COUNT];
        let mut index = 0;
        while index < CHANNEL_COUNT {
            statics[index] = Static(channels[index]);
            index += 1;
        }
        Self {
            channels: statics,
            global: Static(global),
        }
    }

    /// Returns the channel described by `index`.
    ///
    /// Returns `None` if `index` is outside of `0..=14`.
    pub fn channel(&self, index: u8) -> Option<Channel<'_, R>> {
        let kind = ChannelType::of(index)?;
        let registers = self.channels.get(usize::from(index))?;
        Some(Channel::new(index, kind, registers))
    }

    /// Enable or disable a channel in the global enable register.
    ///
    /// Indices outside of `0..=14` are ignored.
    pub fn enable_channel(&self, index: u8, enable: bool) {
        if usize::from(index) >= CHANNEL_COUNT {
            return;
        }
        let bit = 1u32 << index;
        let global = &*self.global;
        // All channels share ENABLE. Serialize the read-modify-write.
        critical_section::with(|_| {
            ral::modify_reg!(crate::ral::dma, global, ENABLE, |enabled: u32| {
                if enable {
                    enabled | bit
                } else {
                    enabled & !bit
                }
            });
        });
    }

    /// Indicates if a channel is enabled in the global enable register.
    ///
    /// Returns `false` for indices outside of `0..=14`.
    pub fn is_channel_enabled(&self, index: u8) -> bool {
        if usize::from(index) >= CHANNEL_COUNT {
            return false;
        }
        let global = &*self.global;
        let enabled = ral::read_reg!(crate::ral::dma, global, ENABLE);
        enabled & (1 << index) != 0
    }

    /// Returns the interrupt status bits of all channels.
    ///
    /// Bit `n` is channel `n`'s interrupt. This doesn't clear anything.
    pub fn interrupt_status(&self) -> u32 {
        let global = &*self.global;
        let status = ral::read_reg!(crate::ral::dma, global, INT_STATUS);
        status & ral::dma::INT_STATUS::CHANNELS
    }

    /// Indicates if a channel's bit is set in the global interrupt status.
    ///
    /// Returns `false` for indices outside of `0..=14`.
    pub fn channel_interrupt_status(&self, index: u8) -> bool {
        if usize::from(index) >= CHANNEL_COUNT {
            return false;
        }
        self.interrupt_status() & (1 << index) != 0
    }
}

#[cfg(test)]
mod tests {
    use crate::ral::{self, dma::CHANNEL_COUNT, Register};
    use crate::sim::{Memory, Simulator};

    #[test]
    fn concurrent_enables_keep_every_channel() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x10));
        let dma = sim.dma();

        std::thread::scope(|scope| {
            for index in 0..CHANNEL_COUNT as u8 {
                let dma = &dma;
                scope.spawn(move || {
                    for round in 0..20_000 {
                        dma.enable_channel(index, round % 2 == 1);
                    }
                    dma.enable_channel(index, true);
                });
            }
        });

        let global = &*dma.global;
        assert_eq!(ral::read_reg!(crate::ral::dma, global, ENABLE), 0x7FFF);
        assert!((0..CHANNEL_COUNT as u8).all(|index| dma.is_channel_enabled(index)));
    }
}
