use super::{Config, ProcFile, Transport};
use crate::mmu::Translate;
use crate::protocol::{Command, Frame};
use crate::{ChannelType, ControlBlock, Result};

/// Generates getters that return the raw argument.
macro_rules! value_getters {
    ($($(#[$attr:meta])* $name:ident => $command:ident,)*) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self, channel: u8) -> Result<u32> {
                self.call(Command::$command, channel, 0)
            }
        )*
    };
}

/// Generates getters that return bit 0 of the argument.
macro_rules! flag_getters {
    ($($(#[$attr:meta])* $name:ident => $command:ident,)*) => {
        $(
            $(#[$attr])*
            pub fn $name(&mut self, channel: u8) -> Result<bool> {
                Ok(self.call(Command::$command, channel, 0)? & 1 != 0)
            }
        )*
    };
}

/// The user-side DMA driver.
///
/// Every method is one request / response exchange over the transport,
/// and fails only if the transport does. Channel indices aren't checked
/// here; the register side acknowledges requests for channels outside
/// of `0..=14` and answers getters with zero.
#[derive(Debug)]
pub struct DmaClient<T> {
    transport: T,
}

impl DmaClient<ProcFile> {
    /// Open the DMA pseudo-file named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        ProcFile::open(config.dma_path(), config.wait()).map(DmaClient::new)
    }
}

impl<T: Transport> DmaClient<T> {
    pub fn new(transport: T) -> Self {
        DmaClient { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn call(&mut self, command: Command, channel: u8, argument: u32) -> Result<u32> {
        let mut frame = Frame::request(command, channel, argument);
        self.transport.exchange(frame.as_bytes_mut())?;
        Ok(frame.argument())
    }

    fn set(&mut self, command: Command, channel: u8, argument: u32) -> Result<()> {
        self.call(command, channel, argument).map(drop)
    }

    /// The channel's type, derived from its index. No exchange happens.
    pub fn channel_type(&self, channel: u8) -> Option<ChannelType> {
        ChannelType::of(channel)
    }

    //
    // Global registers
    //

    pub fn enable_ctrl(&mut self, channel: u8, enable: bool) -> Result<()> {
        self.set(Command::SetEnableCtrl, channel, enable.into())
    }

    /// Returns every channel's interrupt status, one bit per channel.
    pub fn full_intr_status(&mut self) -> Result<u32> {
        self.call(Command::GetFullIntrStatus, 0, 0)
    }

    flag_getters! {
        ctrl_is_enabled => GetEnableCtrl,
        channel_intr_status => GetChannelIntrStatus,
    }

    //
    // Control and status
    //

    pub fn set_ctrlblock_addr_phys(&mut self, channel: u8, addr: u32) -> Result<()> {
        self.set(Command::SetCtrlblockAddr, channel, addr)
    }

    /// Translate `cb` and hand its physical address to the channel.
    pub fn set_ctrlblock_addr_virt<M: Translate + ?Sized>(
        &mut self,
        channel: u8,
        mmu: &mut M,
        cb: *const ControlBlock,
    ) -> Result<()> {
        let addr = mmu.to_physical(cb as usize)?;
        self.set_ctrlblock_addr_phys(channel, addr)
    }

    pub fn set_transfer_active(&mut self, channel: u8, active: bool) -> Result<()> {
        self.set(Command::SetTransferActive, channel, active.into())
    }

    /// Only the low four bits are used.
    pub fn set_priority(&mut self, channel: u8, priority: u32) -> Result<()> {
        self.set(Command::SetPriority, channel, priority)
    }

    /// Only the low four bits are used.
    pub fn set_panic_priority(&mut self, channel: u8, priority: u32) -> Result<()> {
        self.set(Command::SetPanicPriority, channel, priority)
    }

    pub fn enable_wait_ostd_writes(&mut self, channel: u8, enable: bool) -> Result<()> {
        self.set(Command::SetEnableWaitOstdWrites, channel, enable.into())
    }

    pub fn disable_debug_pause(&mut self, channel: u8, disable: bool) -> Result<()> {
        self.set(Command::SetDisableDebugPause, channel, disable.into())
    }

    /// Abort the current control block. Doesn't wait for the engine.
    pub fn abort(&mut self, channel: u8) -> Result<()> {
        self.set(Command::Abort, channel, 0)
    }

    /// Reset the channel. Doesn't wait for the engine.
    pub fn reset(&mut self, channel: u8) -> Result<()> {
        self.set(Command::Reset, channel, 0)
    }

    value_getters! {
        ctrlblock_addr_phys => GetCtrlblockAddr,
        priority => GetPriority,
        panic_priority => GetPanicPriority,
    }

    flag_getters! {
        transfer_active => GetTransferActive,
        /// Read-and-clear. Reports each completed transfer once.
        transfer_done => GetTransferDone,
        /// Read-and-clear. Reports each channel interrupt once.
        intr_status => GetIntrStatus,
        is_requesting_data => GetIsRequestingData,
        is_paused => GetIsPaused,
        is_paused_by_inactive_dreq => GetIsPausedByInactiveDreq,
        is_waiting_ostd_writes => GetIsWaitingOstdWrites,
        error_occurred => GetErrorOccurred,
        wait_ostd_writes_is_enabled => GetEnableWaitOstdWrites,
        debug_pause_is_disabled => GetDisableDebugPause,
    }

    //
    // Transfer information of the loaded control block
    //

    flag_getters! {
        /// Always `false` on lite channels.
        wide_bursts_is_disabled => GetDisableWideBursts,
        /// Always `false` on lite channels.
        ignore_src_reads_is_enabled => GetEnableIgnoreSrcReads,
        dreq_calls_src_reads => GetDreqCallsSrcReads,
        src_read_128bit_is_enabled => GetEnableSrcRead128bitWidth,
        src_addr_inc_is_enabled => GetEnableSrcAddrInc,
        /// Always `false` on lite channels.
        ignore_dst_writes_is_enabled => GetEnableIgnoreDstWrites,
        dreq_calls_dst_writes => GetDreqCallsDstWrites,
        dst_write_128bit_is_enabled => GetEnableDstWrite128bitWidth,
        dst_addr_inc_is_enabled => GetEnableDstAddrInc,
        wait_write_response_is_enabled => GetEnableWaitWriteResponse,
        /// Always `false` on lite channels.
        tdmode_is_enabled => GetEnableTdmode,
        intr_is_enabled => GetEnableIntr,
    }

    value_getters! {
        wait_cycles => GetWaitCycles,
        permap => GetPermap,
        burst_length => GetBurstLength,
        src_addr_phys => GetSrcAddr,
        dst_addr_phys => GetDstAddr,
        transfer_length_bytes => GetTransferLengthBytes,
        /// Always zero on lite channels.
        transfer_length_ext => GetTransferLengthExt,
        /// Always zero on lite channels.
        src_stride => GetSrcStride,
        /// Always zero on lite channels.
        dst_stride => GetDstStride,
        next_ctrlblock_addr_phys => GetNextCbAddr,
    }

    //
    // Debug
    //

    value_getters! {
        debug_version => DebugGetVersion,
        debug_state => DebugGetState,
        debug_id => DebugGetId,
        debug_ostd_writes_counter => DebugGetOstdWritesCounter,
    }

    flag_getters! {
        debug_is_type_lite => DebugGetIsTypeLite,
        /// Read-and-clear.
        debug_read_error => DebugGetReadError,
        /// Read-and-clear.
        debug_fifo_error => DebugGetFifoError,
        /// Read-and-clear.
        debug_read_last_not_set_error => DebugGetReadLastNotSetError,
    }
}

#[cfg(test)]
mod tests {
    use super::DmaClient;
    use crate::client::{Loopback, Transport};
    use crate::mmu::LinearMap;
    use crate::protocol::{Command, Frame, RESPONSE};
    use crate::sim::{Memory, Simulator};
    use crate::{ChannelType, ControlBlock, Result};

    /// Records every request and answers with a fixed argument.
    struct Recorder {
        requests: Vec<Frame>,
        answer: u32,
    }

    impl Transport for Recorder {
        fn exchange(&mut self, bytes: &mut [u8]) -> Result<()> {
            let mut frame = Frame::try_from(&*bytes)?;
            self.requests.push(frame);
            frame.set_argument(self.answer);
            frame.mark_response();
            bytes.copy_from_slice(frame.as_bytes());
            Ok(())
        }
    }

    #[test]
    fn requests_follow_the_frame_layout() {
        let mut client = DmaClient::new(Recorder { requests: Vec::new(), answer: 0x10 });
        client.enable_ctrl(3, true).unwrap();
        client.set_priority(12, 0xFFFF_FFFF).unwrap();
        assert_eq!(client.priority(12).unwrap(), 0x10);
        assert!(!client.transfer_done(1).unwrap());

        let requests = client.into_inner().requests;
        assert_eq!(requests[0].as_bytes(), &[0, 3, 1, 0, 0, 0]);
        assert_eq!(requests[1].as_bytes(), &[15, 12, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(requests[2].command(), Some(Command::GetPriority));
        assert_eq!(requests[3].command(), Some(Command::GetTransferDone));
        assert_ne!(requests[3].opcode(), RESPONSE);
    }

    #[test]
    fn channel_type_needs_no_exchange() {
        let client = DmaClient::new(Recorder { requests: Vec::new(), answer: 0 });
        assert_eq!(client.channel_type(6), Some(ChannelType::Standard));
        assert_eq!(client.channel_type(14), Some(ChannelType::Lite));
        assert_eq!(client.channel_type(15), None);
        assert!(client.into_inner().requests.is_empty());
    }

    #[test]
    fn virtual_control_block_address() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        let mut client = DmaClient::new(Loopback::new(&dma));

        let cb = Box::new(ControlBlock::new());
        let virt = &*cb as *const ControlBlock as usize;
        let mut mmu = LinearMap::new(virt, 0xC000_0040, 32);

        client.set_ctrlblock_addr_virt(2, &mut mmu, &*cb).unwrap();
        assert_eq!(client.ctrlblock_addr_phys(2).unwrap(), 0xC000_0040);
    }

    #[test]
    fn stride_reads_depend_on_channel_type() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        let mut client = DmaClient::new(Loopback::new(&dma));
        for channel in [5, 10] {
            sim.load_registers(channel, &[0, 0, 0, 0, 0xFFFE_0008, 0]);
        }

        assert_eq!(client.src_stride(5).unwrap(), 0x0008);
        assert_eq!(client.dst_stride(5).unwrap(), 0xFFFE);
        assert_eq!(client.src_stride(10).unwrap(), 0);
        assert_eq!(client.dst_stride(10).unwrap(), 0);
    }

    #[test]
    fn priority_masking_over_the_wire() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        let mut client = DmaClient::new(Loopback::new(&dma));
        for priority in [0, 9, 0x1F, 0xABCD_EF01] {
            client.set_panic_priority(0, priority).unwrap();
            assert_eq!(client.panic_priority(0).unwrap(), priority & 0xF);
        }
    }
}
