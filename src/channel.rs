//! DMA channels
//!
//! Channels 0 through 6 are standard channels. Channels 7 through 14
//! are lite channels. Lite channels lack wide bursts, ignored reads and
//! writes, 2D mode and strides. The register bits for those features
//! read as zero through this API, whatever the hardware reports.

use crate::barrier;
use crate::ral::{self, dma, dma::ChannelRegisterBlock, Register};

/// The kind of DMA engine behind a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Full feature set. Channels 0 through 6.
    Standard,
    /// Reduced feature set. Channels 7 through 14.
    Lite,
}

impl ChannelType {
    /// Returns the type of the channel with `index`.
    ///
    /// Returns `None` if `index` is outside of `0..=14`.
    pub const fn of(index: u8) -> Option<Self> {
        match index {
            0..=6 => Some(ChannelType::Standard),
            7..=14 => Some(ChannelType::Lite),
            _ => None,
        }
    }
}

/// A DMA channel
///
/// Use [`Dma::channel`](crate::Dma::channel) to get a channel. Every
/// method is a direct register access; nothing is cached.
///
/// Setters truncate their input to the field width. They never reject
/// a value.
pub struct Channel<'a, R = ral_registers::RWRegister<u32>> {
    /// Our channel number, expected to be between [0, 15)
    index: u8,
    kind: ChannelType,
    /// Reference to the channel registers
    registers: &'a ChannelRegisterBlock<R>,
}

impl<'a, R: Register> Channel<'a, R> {
    pub(crate) fn new(index: u8, kind: ChannelType, registers: &'a ChannelRegisterBlock<R>) -> Self {
        Channel {
            index,
            kind,
            registers,
        }
    }

    /// Returns the DMA channel number
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Returns the channel type
    pub fn channel_type(&self) -> ChannelType {
        self.kind
    }

    fn is_standard(&self) -> bool {
        self.kind == ChannelType::Standard
    }

    /// Read-modify-write on CS.
    ///
    /// Latched END / INT bits are written back as zero. Writing them back
    /// as read would acknowledge events that nobody has observed yet.
    fn modify_status(&self, mask: u32, value: u32) {
        ral::modify_reg!(crate::ral::dma, self.registers, CS, |cs: u32| {
            (cs & !(mask | dma::CS::W1C)) | (value & mask)
        });
    }

    /// Report a latched CS flag, acknowledging it if it's set.
    fn take_status_flag(&self, flag: u32) -> bool {
        let cs = ral::read_reg!(crate::ral::dma, self.registers, CS);
        if cs & flag == 0 {
            return false;
        }
        ral::write_reg!(crate::ral::dma, self.registers, CS, (cs & !dma::CS::W1C) | flag);
        true
    }

    /// Report a latched DEBUG error, acknowledging it if it's set.
    fn take_debug_flag(&self, flag: u32) -> bool {
        let debug = ral::read_reg!(crate::ral::dma, self.registers, DEBUG);
        if debug & flag == 0 {
            return false;
        }
        // The rest of DEBUG is read only.
        ral::write_reg!(crate::ral::dma, self.registers, DEBUG, flag);
        true
    }

    //
    // Control and status
    //

    /// Reset the channel.
    ///
    /// Returns immediately. Poll [`is_transfer_active`](Self::is_transfer_active)
    /// to observe the reset.
    pub fn reset(&self) {
        self.modify_status(dma::CS::RESET::mask, dma::CS::RESET::mask);
    }

    /// Abort the current control block.
    ///
    /// The engine loads the next control block, if any, and carries on.
    /// Returns immediately.
    pub fn abort(&self) {
        self.modify_status(dma::CS::ABORT::mask, dma::CS::ABORT::mask);
    }

    /// Ignore (`true`) or honour (`false`) the debug pause signal.
    pub fn set_debug_pause_disabled(&self, disable: bool) {
        self.modify_status(
            dma::CS::DISDEBUG::mask,
            (disable as u32) << dma::CS::DISDEBUG::offset,
        );
    }

    /// Indicates if the channel ignores the debug pause signal.
    pub fn debug_pause_disabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, DISDEBUG == 1)
    }

    /// Wait for outstanding writes before signalling the end of a block.
    pub fn set_wait_for_outstanding_writes(&self, enable: bool) {
        self.modify_status(
            dma::CS::WAIT_FOR_OUTSTANDING_WRITES::mask,
            (enable as u32) << dma::CS::WAIT_FOR_OUTSTANDING_WRITES::offset,
        );
    }

    /// Indicates if the channel waits for outstanding writes.
    pub fn wait_for_outstanding_writes_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, WAIT_FOR_OUTSTANDING_WRITES == 1)
    }

    /// Set the AXI panic priority. Only the low four bits are used.
    pub fn set_panic_priority(&self, priority: u32) {
        self.modify_status(
            dma::CS::PANIC_PRIORITY::mask,
            priority << dma::CS::PANIC_PRIORITY::offset,
        );
    }

    /// Returns the AXI panic priority.
    pub fn panic_priority(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, CS, PANIC_PRIORITY)
    }

    /// Set the AXI priority. Only the low four bits are used.
    pub fn set_priority(&self, priority: u32) {
        self.modify_status(dma::CS::PRIORITY::mask, priority << dma::CS::PRIORITY::offset);
    }

    /// Returns the AXI priority.
    pub fn priority(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, CS, PRIORITY)
    }

    /// Indicates if the channel has an error flagged in DEBUG.
    pub fn error_occurred(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, ERROR == 1)
    }

    /// Indicates if the channel is waiting for outstanding writes.
    pub fn is_waiting_for_outstanding_writes(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, WAITING_FOR_OUTSTANDING_WRITES == 1)
    }

    /// Indicates if the channel is paused because its DREQ is inactive.
    pub fn is_paused_by_inactive_dreq(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, DREQ_STOPS_DMA == 1)
    }

    /// Indicates if the channel is paused.
    pub fn is_paused(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, PAUSED == 1)
    }

    /// Indicates if the selected peripheral is requesting data.
    pub fn is_requesting_data(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, DREQ == 1)
    }

    /// Returns `true` once per channel interrupt.
    ///
    /// A set flag is acknowledged before this returns, so the next call
    /// reports `false` until the engine raises another interrupt.
    pub fn interrupt_status(&self) -> bool {
        self.take_status_flag(dma::CS::INT::mask)
    }

    /// Returns `true` once per completed transfer.
    ///
    /// A set flag is acknowledged before this returns, so the next call
    /// reports `false` until the engine completes another transfer.
    pub fn transfer_done(&self) -> bool {
        self.take_status_flag(dma::CS::END::mask)
    }

    /// Start (`true`) or pause (`false`) the channel.
    ///
    /// Starting loads the control block at
    /// [`control_block_address`](Self::control_block_address). Stores to the
    /// control block are ordered before the start.
    pub fn set_transfer_active(&self, active: bool) {
        if active {
            barrier::data_sync();
        }
        self.modify_status(dma::CS::ACTIVE::mask, active as u32);
    }

    /// Indicates if the channel is active.
    pub fn is_transfer_active(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, CS, ACTIVE == 1)
    }

    //
    // Control block address
    //

    /// Set the physical address of the first control block.
    ///
    /// The address must be 256-bit aligned.
    pub fn set_control_block_address(&self, addr: u32) {
        ral::write_reg!(crate::ral::dma, self.registers, CONBLK_AD, addr);
    }

    /// Returns the physical address of the current control block.
    pub fn control_block_address(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, CONBLK_AD)
    }

    //
    // Transfer information, loaded from the control block
    //

    /// Always `false` on lite channels.
    pub fn wide_bursts_disabled(&self) -> bool {
        self.is_standard()
            && ral::read_reg!(crate::ral::dma, self.registers, TI, NO_WIDE_BURSTS == 1)
    }

    /// Dummy cycles added after each transfer.
    pub fn wait_cycles(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, TI, WAITS)
    }

    /// Returns the peripheral map selector. See [`permap`](crate::permap).
    pub fn permap(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, TI, PERMAP)
    }

    /// Number of words per burst transfer.
    pub fn burst_length(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, TI, BURST_LENGTH)
    }

    /// Always `false` on lite channels.
    pub fn ignore_src_reads_enabled(&self) -> bool {
        self.is_standard() && ral::read_reg!(crate::ral::dma, self.registers, TI, SRC_IGNORE == 1)
    }

    /// Indicates if the peripheral DREQ gates source reads.
    pub fn dreq_paces_src_reads(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, SRC_DREQ == 1)
    }

    /// Indicates if source reads are 128 bits wide.
    pub fn src_read_128bit_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, SRC_WIDTH == 1)
    }

    /// Indicates if the source address advances after each read.
    pub fn src_addr_inc_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, SRC_INC == 1)
    }

    /// Always `false` on lite channels.
    pub fn ignore_dst_writes_enabled(&self) -> bool {
        self.is_standard()
            && ral::read_reg!(crate::ral::dma, self.registers, TI, DEST_IGNORE == 1)
    }

    /// Indicates if the peripheral DREQ gates destination writes.
    pub fn dreq_paces_dst_writes(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, DEST_DREQ == 1)
    }

    /// Indicates if destination writes are 128 bits wide.
    pub fn dst_write_128bit_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, DEST_WIDTH == 1)
    }

    /// Indicates if the destination address advances after each write.
    pub fn dst_addr_inc_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, DEST_INC == 1)
    }

    /// Indicates if the channel waits for an AXI write response after each write.
    pub fn wait_write_response_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, WAIT_RESP == 1)
    }

    /// Always `false` on lite channels.
    pub fn tdmode_enabled(&self) -> bool {
        self.is_standard() && ral::read_reg!(crate::ral::dma, self.registers, TI, TDMODE == 1)
    }

    /// Indicates if the channel raises an interrupt when the control block completes.
    pub fn interrupt_enabled(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, TI, INTEN == 1)
    }

    /// Physical source address of the current transfer.
    pub fn src_addr(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, SOURCE_AD)
    }

    /// Physical destination address of the current transfer.
    pub fn dst_addr(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, DEST_AD)
    }

    /// Remaining bytes of the current row (or of the whole transfer,
    /// outside of 2D mode).
    pub fn transfer_length_bytes(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, TXFR_LEN, XLENGTH)
    }

    /// 2D mode row count. Always zero on lite channels.
    pub fn transfer_length_ext(&self) -> u32 {
        if !self.is_standard() {
            return 0;
        }
        ral::read_reg!(crate::ral::dma, self.registers, TXFR_LEN, YLENGTH)
    }

    /// Always zero on lite channels.
    pub fn src_stride(&self) -> u32 {
        if !self.is_standard() {
            return 0;
        }
        ral::read_reg!(crate::ral::dma, self.registers, STRIDE, S_STRIDE)
    }

    /// Always zero on lite channels.
    pub fn dst_stride(&self) -> u32 {
        if !self.is_standard() {
            return 0;
        }
        ral::read_reg!(crate::ral::dma, self.registers, STRIDE, D_STRIDE)
    }

    /// Physical address of the next control block. Zero ends the chain.
    pub fn next_control_block_address(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, NEXTCONBK)
    }

    //
    // Debug
    //

    /// The hardware's own view of the channel type.
    pub fn debug_is_lite(&self) -> bool {
        ral::read_reg!(crate::ral::dma, self.registers, DEBUG, LITE == 1)
    }

    /// DMA controller version.
    pub fn debug_version(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, DEBUG, VERSION)
    }

    /// Internal state machine number.
    pub fn debug_state(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, DEBUG, DMA_STATE)
    }

    /// AXI ID of this channel.
    pub fn debug_id(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, DEBUG, DMA_ID)
    }

    /// Writes issued but not yet acknowledged.
    pub fn debug_outstanding_writes(&self) -> u32 {
        ral::read_reg!(crate::ral::dma, self.registers, DEBUG, OUTSTANDING_WRITES)
    }

    /// Returns `true` once per slave read error. See [`transfer_done`](Self::transfer_done).
    pub fn debug_read_error(&self) -> bool {
        self.take_debug_flag(dma::DEBUG::READ_ERROR::mask)
    }

    /// Returns `true` once per FIFO error.
    pub fn debug_fifo_error(&self) -> bool {
        self.take_debug_flag(dma::DEBUG::FIFO_ERROR::mask)
    }

    /// Returns `true` once per "read last not set" error.
    pub fn debug_read_last_not_set_error(&self) -> bool {
        self.take_debug_flag(dma::DEBUG::READ_LAST_NOT_SET_ERROR::mask)
    }
}
