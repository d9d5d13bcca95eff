//! DMA register blocks and fields
//!
//! Channels 0 through 14 sit in one 4KiB window, `0x100` apart. The
//! interrupt status and enable registers live at the end of the same
//! window. Channel 15 is elsewhere and isn't modelled.

#![allow(non_upper_case_globals)] // RAL field constants

use super::RWRegister;

/// ARM physical address of the DMA window on the BCM2837.
///
/// The datasheet lists bus address `0x7E00_7000`. The ARM sees
/// peripherals at `0x3F00_0000` on the BCM2837.
pub const DMA_BASE: usize = 0x3F00_7000;

/// Size of the DMA register window.
pub const DMA_WINDOW_SIZE: usize = 0x1000;

/// Distance between two channel register blocks.
pub const CHANNEL_STRIDE: usize = 0x100;

/// Offset of the global registers from [`DMA_BASE`].
pub const GLOBAL_OFFSET: usize = 0xFE0;

/// Number of channels reachable through the DMA window.
pub const CHANNEL_COUNT: usize = 15;

/// Per-channel registers.
///
/// `TI` through `NEXTCONBK` are loaded by the engine from the active
/// control block. Software only reads them.
#[repr(C)]
pub struct ChannelRegisterBlock<R = RWRegister<u32>> {
    /// Control and Status
    pub CS: R,
    /// Control Block Address
    pub CONBLK_AD: R,
    /// Transfer Information
    pub TI: R,
    /// Source Address
    pub SOURCE_AD: R,
    /// Destination Address
    pub DEST_AD: R,
    /// Transfer Length
    pub TXFR_LEN: R,
    /// 2D Stride
    pub STRIDE: R,
    /// Next Control Block Address
    pub NEXTCONBK: R,
    /// Debug
    pub DEBUG: R,
}

/// Registers shared by all channels.
#[repr(C)]
pub struct GlobalRegisterBlock<R = RWRegister<u32>> {
    /// Interrupt status of each channel
    pub INT_STATUS: R,
    pub(crate) _reserved: [R; 3],
    /// Global enable bit for each channel
    pub ENABLE: R,
}

const _: () = assert!(core::mem::offset_of!(ChannelRegisterBlock<RWRegister<u32>>, DEBUG) == 0x20);
const _: () = assert!(core::mem::size_of::<ChannelRegisterBlock<RWRegister<u32>>>() <= CHANNEL_STRIDE);
const _: () = assert!(core::mem::offset_of!(GlobalRegisterBlock<RWRegister<u32>>, ENABLE) == 0x10);

macro_rules! field {
    ($(#[$attr:meta])* $name:ident, $offset:expr, $width:expr) => {
        $(#[$attr])*
        pub mod $name {
            pub const offset: u32 = $offset;
            pub const mask: u32 = (((1u64 << $width) - 1) as u32) << offset;
            pub mod R {}
            pub mod W {}
            pub mod RW {}
        }
    };
}

pub mod CS {
    field!(
        /// Write 1 to reset the channel. Self clearing.
        RESET, 31, 1
    );
    field!(
        /// Write 1 to abort the current control block. Self clearing.
        ABORT, 30, 1
    );
    field!(DISDEBUG, 29, 1);
    field!(WAIT_FOR_OUTSTANDING_WRITES, 28, 1);
    field!(PANIC_PRIORITY, 20, 4);
    field!(PRIORITY, 16, 4);
    field!(ERROR, 8, 1);
    field!(WAITING_FOR_OUTSTANDING_WRITES, 6, 1);
    field!(DREQ_STOPS_DMA, 5, 1);
    field!(PAUSED, 4, 1);
    field!(DREQ, 3, 1);
    field!(
        /// Interrupt status. Write 1 to clear.
        INT, 2, 1
    );
    field!(
        /// Transfer complete. Write 1 to clear.
        END, 1, 1
    );
    field!(ACTIVE, 0, 1);

    /// Latched bits that a write of 1 acknowledges.
    pub const W1C: u32 = INT::mask | END::mask;
}

pub mod CONBLK_AD {}

pub mod TI {
    field!(
        /// Standard channels only.
        NO_WIDE_BURSTS, 26, 1
    );
    field!(WAITS, 21, 5);
    field!(PERMAP, 16, 5);
    field!(BURST_LENGTH, 12, 4);
    field!(
        /// Standard channels only.
        SRC_IGNORE, 11, 1
    );
    field!(SRC_DREQ, 10, 1);
    field!(SRC_WIDTH, 9, 1);
    field!(SRC_INC, 8, 1);
    field!(
        /// Standard channels only.
        DEST_IGNORE, 7, 1
    );
    field!(DEST_DREQ, 6, 1);
    field!(DEST_WIDTH, 5, 1);
    field!(DEST_INC, 4, 1);
    field!(WAIT_RESP, 3, 1);
    field!(
        /// Standard channels only.
        TDMODE, 1, 1
    );
    field!(INTEN, 0, 1);
}

pub mod SOURCE_AD {}

pub mod DEST_AD {}

pub mod TXFR_LEN {
    field!(
        /// 2D row count. Standard channels only.
        YLENGTH, 16, 14
    );
    field!(XLENGTH, 0, 16);
}

/// Standard channels only.
pub mod STRIDE {
    field!(D_STRIDE, 16, 16);
    field!(S_STRIDE, 0, 16);
}

pub mod NEXTCONBK {}

pub mod DEBUG {
    field!(LITE, 28, 1);
    field!(VERSION, 25, 3);
    field!(DMA_STATE, 16, 9);
    field!(DMA_ID, 8, 8);
    field!(OUTSTANDING_WRITES, 4, 4);
    field!(READ_ERROR, 2, 1);
    field!(FIFO_ERROR, 1, 1);
    field!(READ_LAST_NOT_SET_ERROR, 0, 1);

    /// Latched error bits that a write of 1 acknowledges.
    pub const W1C: u32 = READ_ERROR::mask | FIFO_ERROR::mask | READ_LAST_NOT_SET_ERROR::mask;
}

pub mod INT_STATUS {
    /// One bit per channel in the window.
    pub const CHANNELS: u32 = 0x7FFF;
}

pub mod ENABLE {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_info_fields_do_not_overlap() {
        let fields = [
            TI::NO_WIDE_BURSTS::mask,
            TI::WAITS::mask,
            TI::PERMAP::mask,
            TI::BURST_LENGTH::mask,
            TI::SRC_IGNORE::mask,
            TI::SRC_DREQ::mask,
            TI::SRC_WIDTH::mask,
            TI::SRC_INC::mask,
            TI::DEST_IGNORE::mask,
            TI::DEST_DREQ::mask,
            TI::DEST_WIDTH::mask,
            TI::DEST_INC::mask,
            TI::WAIT_RESP::mask,
            TI::TDMODE::mask,
            TI::INTEN::mask,
        ];
        let mut seen = 0u32;
        for mask in fields {
            assert_eq!(seen & mask, 0, "overlap at {mask:#010x}");
            seen |= mask;
        }
    }

    #[test]
    fn field_masks_match_datasheet() {
        assert_eq!(CS::PANIC_PRIORITY::mask, 0x00F0_0000);
        assert_eq!(CS::PRIORITY::mask, 0x000F_0000);
        assert_eq!(TI::WAITS::mask, 0x03E0_0000);
        assert_eq!(TXFR_LEN::YLENGTH::mask, 0x3FFF_0000);
        assert_eq!(STRIDE::D_STRIDE::mask, 0xFFFF_0000);
        assert_eq!(DEBUG::DMA_STATE::mask, 0x01FF_0000);
        assert_eq!(CS::W1C, 0b110);
    }
}
