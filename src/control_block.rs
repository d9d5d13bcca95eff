//! DMA control blocks.

use crate::mmu::Translate;
use crate::ral::{dma, extract_field, insert_field};

/// Peripheral map selectors.
///
/// The peripheral map picks the DREQ signal that paces a transfer.
/// Use [`ALWAYS_ON`](permap::ALWAYS_ON) for memory-to-memory copies.
pub mod permap {
    pub const ALWAYS_ON: u8 = 0;
    pub const DSI: u8 = 1;
    pub const PCM_TX: u8 = 2;
    pub const PCM_RX: u8 = 3;
    pub const SMI: u8 = 4;
    pub const PWM: u8 = 5;
    pub const SPI_TX: u8 = 6;
    pub const SPI_RX: u8 = 7;
    pub const I2C_TX: u8 = 8;
    pub const I2C_RX: u8 = 9;
    pub const EMMC: u8 = 11;
    pub const UART_TX: u8 = 12;
    pub const SD_HOST: u8 = 13;
    pub const UART_RX: u8 = 14;
    pub const SLIMBUS_MCTX: u8 = 16;
    pub const HDMI: u8 = 17;
    pub const SLIMBUS_MCRX: u8 = 18;
    pub const SLIMBUS_DC0: u8 = 19;
    pub const SLIMBUS_DC1: u8 = 20;
    pub const SLIMBUS_DC2: u8 = 21;
    pub const SLIMBUS_DC3: u8 = 22;
    pub const SLIMBUS_DC4: u8 = 23;
    pub const SCALERFIFO0: u8 = 24;
    pub const SCALERFIFO1: u8 = 25;
    pub const SCALERFIFO2: u8 = 26;
    pub const SLIMBUS_DC5: u8 = 27;
    pub const SLIMBUS_DC6: u8 = 28;
    pub const SLIMBUS_DC7: u8 = 29;
    pub const SLIMBUS_DC8: u8 = 30;
    pub const SLIMBUS_DC9: u8 = 31;

    /// The BSC/SPI slave shares the I2C requests.
    pub const BSC_SPI_TX: u8 = I2C_TX;
    /// The BSC/SPI slave shares the I2C requests.
    pub const BSC_SPI_RX: u8 = I2C_RX;
}

/// A DMA control block.
///
/// The engine reads control blocks straight from memory, so the layout
/// is fixed: eight 32-bit words, 256-bit aligned. Hand the block's
/// *physical* address to a channel, or link it from another block.
///
/// Like the channel registers, setters truncate their input to the
/// field width. The block doesn't know which channel will run it, so
/// standard-only fields can be set here and are ignored by lite
/// channels.
///
/// Addresses stored in a control block are physical. The `_virt`
/// setters translate a pointer before storing it.
#[repr(C, align(32))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ControlBlock {
    transfer_info: u32,
    src_addr: u32,
    dst_addr: u32,
    transfer_length: u32,
    stride: u32,
    next_ctrlblock_addr: u32,
    reserved: [u32; 2],
}

const _: () = assert!(core::mem::size_of::<ControlBlock>() == 32);
const _: () = assert!(core::mem::align_of::<ControlBlock>() == 32);

impl ControlBlock {
    /// Number of words in a control block.
    pub const WORDS: usize = 8;

    /// A zeroed control block.
    pub const fn new() -> Self {
        ControlBlock {
            transfer_info: 0,
            src_addr: 0,
            dst_addr: 0,
            transfer_length: 0,
            stride: 0,
            next_ctrlblock_addr: 0,
            reserved: [0; 2],
        }
    }

    /// Zero every field.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// The block as the engine sees it in memory.
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.transfer_info,
            self.src_addr,
            self.dst_addr,
            self.transfer_length,
            self.stride,
            self.next_ctrlblock_addr,
            0,
            0,
        ]
    }

    /// Rebuild a block from memory. The reserved words are dropped.
    pub const fn from_words(words: [u32; Self::WORDS]) -> Self {
        ControlBlock {
            transfer_info: words[0],
            src_addr: words[1],
            dst_addr: words[2],
            transfer_length: words[3],
            stride: words[4],
            next_ctrlblock_addr: words[5],
            reserved: [0; 2],
        }
    }

    fn set_info_flag(&mut self, mask: u32, offset: u32, enable: bool) {
        insert_field(&mut self.transfer_info, mask, offset, enable as u32);
    }

    fn info_flag(&self, mask: u32, offset: u32) -> bool {
        extract_field(self.transfer_info, mask, offset) != 0
    }

    //
    // Transfer information
    //

    /// Prevent two-beat AXI bursts. Standard channels only.
    pub fn disable_wide_bursts(&mut self, disable: bool) {
        use dma::TI::NO_WIDE_BURSTS::{mask, offset};
        self.set_info_flag(mask, offset, disable);
    }

    pub fn wide_bursts_disabled(&self) -> bool {
        use dma::TI::NO_WIDE_BURSTS::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Dummy cycles after each read or write. Five bits.
    pub fn set_wait_cycles(&mut self, wait_cycles: u8) {
        use dma::TI::WAITS::{mask, offset};
        insert_field(&mut self.transfer_info, mask, offset, wait_cycles.into());
    }

    pub fn wait_cycles(&self) -> u32 {
        use dma::TI::WAITS::{mask, offset};
        extract_field(self.transfer_info, mask, offset)
    }

    /// Select the pacing peripheral. Five bits. See [`permap`].
    pub fn set_permap(&mut self, permap: u8) {
        use dma::TI::PERMAP::{mask, offset};
        insert_field(&mut self.transfer_info, mask, offset, permap.into());
    }

    pub fn permap(&self) -> u32 {
        use dma::TI::PERMAP::{mask, offset};
        extract_field(self.transfer_info, mask, offset)
    }

    /// Burst transfer length. Four bits.
    pub fn set_burst_length(&mut self, burst_length: u8) {
        use dma::TI::BURST_LENGTH::{mask, offset};
        insert_field(&mut self.transfer_info, mask, offset, burst_length.into());
    }

    pub fn burst_length(&self) -> u32 {
        use dma::TI::BURST_LENGTH::{mask, offset};
        extract_field(self.transfer_info, mask, offset)
    }

    /// Don't read the source; write zeros instead. Standard channels only.
    pub fn enable_ignore_src_reads(&mut self, enable: bool) {
        use dma::TI::SRC_IGNORE::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn ignore_src_reads_enabled(&self) -> bool {
        use dma::TI::SRC_IGNORE::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Let the peripheral's DREQ gate source reads.
    pub fn set_dreq_paces_src_reads(&mut self, enable: bool) {
        use dma::TI::SRC_DREQ::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn dreq_paces_src_reads(&self) -> bool {
        use dma::TI::SRC_DREQ::{mask, offset};
        self.info_flag(mask, offset)
    }

    pub fn enable_src_read_128bit_width(&mut self, enable: bool) {
        use dma::TI::SRC_WIDTH::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn src_read_128bit_width_enabled(&self) -> bool {
        use dma::TI::SRC_WIDTH::{mask, offset};
        self.info_flag(mask, offset)
    }

    pub fn enable_src_addr_inc(&mut self, enable: bool) {
        use dma::TI::SRC_INC::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn src_addr_inc_enabled(&self) -> bool {
        use dma::TI::SRC_INC::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Don't write the destination. Standard channels only.
    pub fn enable_ignore_dst_writes(&mut self, enable: bool) {
        use dma::TI::DEST_IGNORE::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn ignore_dst_writes_enabled(&self) -> bool {
        use dma::TI::DEST_IGNORE::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Let the peripheral's DREQ gate destination writes.
    pub fn set_dreq_paces_dst_writes(&mut self, enable: bool) {
        use dma::TI::DEST_DREQ::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn dreq_paces_dst_writes(&self) -> bool {
        use dma::TI::DEST_DREQ::{mask, offset};
        self.info_flag(mask, offset)
    }

    pub fn enable_dst_write_128bit_width(&mut self, enable: bool) {
        use dma::TI::DEST_WIDTH::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn dst_write_128bit_width_enabled(&self) -> bool {
        use dma::TI::DEST_WIDTH::{mask, offset};
        self.info_flag(mask, offset)
    }

    pub fn enable_dst_addr_inc(&mut self, enable: bool) {
        use dma::TI::DEST_INC::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn dst_addr_inc_enabled(&self) -> bool {
        use dma::TI::DEST_INC::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Wait for a write response after each write.
    pub fn enable_wait_write_response(&mut self, enable: bool) {
        use dma::TI::WAIT_RESP::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn wait_write_response_enabled(&self) -> bool {
        use dma::TI::WAIT_RESP::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Interpret the transfer length as rows and columns. Standard
    /// channels only.
    pub fn enable_tdmode(&mut self, enable: bool) {
        use dma::TI::TDMODE::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn tdmode_enabled(&self) -> bool {
        use dma::TI::TDMODE::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// Raise the channel interrupt when this block completes.
    pub fn enable_intr(&mut self, enable: bool) {
        use dma::TI::INTEN::{mask, offset};
        self.set_info_flag(mask, offset, enable);
    }

    pub fn intr_enabled(&self) -> bool {
        use dma::TI::INTEN::{mask, offset};
        self.info_flag(mask, offset)
    }

    /// The raw transfer information word.
    pub fn transfer_info(&self) -> u32 {
        self.transfer_info
    }

    //
    // Addresses
    //

    pub fn set_src_addr_phys(&mut self, addr: u32) {
        self.src_addr = addr;
    }

    /// Translate `src` and store its physical address.
    pub fn set_src_addr_virt<T, M: Translate + ?Sized>(
        &mut self,
        mmu: &mut M,
        src: *const T,
    ) -> crate::Result<()> {
        self.src_addr = mmu.to_physical(src as usize)?;
        Ok(())
    }

    pub fn src_addr(&self) -> u32 {
        self.src_addr
    }

    pub fn set_dst_addr_phys(&mut self, addr: u32) {
        self.dst_addr = addr;
    }

    /// Translate `dst` and store its physical address.
    pub fn set_dst_addr_virt<T, M: Translate + ?Sized>(
        &mut self,
        mmu: &mut M,
        dst: *mut T,
    ) -> crate::Result<()> {
        self.dst_addr = mmu.to_physical(dst as usize)?;
        Ok(())
    }

    pub fn dst_addr(&self) -> u32 {
        self.dst_addr
    }

    /// Link the next block by physical address. Zero ends the chain.
    pub fn set_next_ctrlblock_addr_phys(&mut self, addr: u32) {
        self.next_ctrlblock_addr = addr;
    }

    /// Link the next block by translating its pointer.
    pub fn set_next_ctrlblock_addr_virt<M: Translate + ?Sized>(
        &mut self,
        mmu: &mut M,
        next: *const ControlBlock,
    ) -> crate::Result<()> {
        self.next_ctrlblock_addr = mmu.to_physical(next as usize)?;
        Ok(())
    }

    pub fn next_ctrlblock_addr(&self) -> u32 {
        self.next_ctrlblock_addr
    }

    //
    // Length and stride
    //

    /// Bytes to transfer, or bytes per row in 2D mode.
    pub fn set_transfer_length_bytes(&mut self, length: u16) {
        use dma::TXFR_LEN::XLENGTH::{mask, offset};
        insert_field(&mut self.transfer_length, mask, offset, length.into());
    }

    pub fn transfer_length_bytes(&self) -> u32 {
        use dma::TXFR_LEN::XLENGTH::{mask, offset};
        extract_field(self.transfer_length, mask, offset)
    }

    /// Row count in 2D mode. Fourteen bits. Standard channels only.
    pub fn set_transfer_length_ext(&mut self, length: u16) {
        use dma::TXFR_LEN::YLENGTH::{mask, offset};
        insert_field(&mut self.transfer_length, mask, offset, length.into());
    }

    pub fn transfer_length_ext(&self) -> u32 {
        use dma::TXFR_LEN::YLENGTH::{mask, offset};
        extract_field(self.transfer_length, mask, offset)
    }

    /// Signed byte increment applied to the source after each row.
    /// Standard channels only.
    pub fn set_src_stride(&mut self, stride: u16) {
        use dma::STRIDE::S_STRIDE::{mask, offset};
        insert_field(&mut self.stride, mask, offset, stride.into());
    }

    pub fn src_stride(&self) -> u32 {
        use dma::STRIDE::S_STRIDE::{mask, offset};
        extract_field(self.stride, mask, offset)
    }

    /// Signed byte increment applied to the destination after each row.
    /// Standard channels only.
    pub fn set_dst_stride(&mut self, stride: u16) {
        use dma::STRIDE::D_STRIDE::{mask, offset};
        insert_field(&mut self.stride, mask, offset, stride.into());
    }

    pub fn dst_stride(&self) -> u32 {
        use dma::STRIDE::D_STRIDE::{mask, offset};
        extract_field(self.stride, mask, offset)
    }
}
