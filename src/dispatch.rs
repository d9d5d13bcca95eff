//! Register-side command dispatch

use crate::protocol::{Command, Frame};
use crate::ral::Register;
use crate::{Dma, Result};

/// Answers protocol frames in place.
///
/// Implemented by the DMA dispatcher and by the MMU [server](crate::mmu::Server).
/// A transport hands the raw frame to `serve`, then sends it back.
pub trait Service {
    /// Run the request in `frame` and turn it into the response.
    ///
    /// Fails only if `frame` has the wrong size for the protocol.
    fn serve(&mut self, frame: &mut [u8]) -> Result<()>;
}

impl<S: Service + ?Sized> Service for &mut S {
    fn serve(&mut self, frame: &mut [u8]) -> Result<()> {
        (**self).serve(frame)
    }
}

impl<R: Register> Dma<R> {
    /// Run one command frame against the hardware.
    ///
    /// Getters store their result in the argument; flags answer `0` or `1`.
    /// The opcode is overwritten with [`RESPONSE`](crate::protocol::RESPONSE)
    /// before this returns.
    ///
    /// Unknown opcodes are acknowledged with the argument untouched.
    /// Commands that name a channel outside of `0..=14` are acknowledged
    /// without touching any register; getters answer `0`.
    pub fn dispatch(&self, frame: &mut Frame) {
        let Some(command) = frame.command() else {
            log::warn!("DMA: unknown opcode {}", frame.opcode());
            frame.mark_response();
            return;
        };
        let index = frame.channel();
        let argument = frame.argument();
        log::trace!("DMA: {command:?} channel {index} argument {argument:#010x}");

        if let Some(answer) = self.execute(command, index, argument, frame.flag()) {
            frame.set_argument(answer);
        }
        frame.mark_response();
    }

    /// Returns the answer to store in the argument, if any.
    fn execute(&self, command: Command, index: u8, argument: u32, flag: bool) -> Option<u32> {
        match command {
            Command::GetFullIntrStatus => return Some(self.interrupt_status()),
            Command::SetEnableCtrl => {
                self.enable_channel(index, flag);
                return None;
            }
            Command::GetEnableCtrl => return Some(self.is_channel_enabled(index).into()),
            Command::GetChannelIntrStatus => {
                return Some(self.channel_interrupt_status(index).into())
            }
            _ => {}
        }

        let Some(channel) = self.channel(index) else {
            log::warn!("DMA: {command:?} on invalid channel {index}");
            return (!command.is_setter()).then_some(0);
        };

        let answer = match command {
            Command::SetCtrlblockAddr => {
                channel.set_control_block_address(argument);
                return None;
            }
            Command::SetTransferActive => {
                channel.set_transfer_active(flag);
                return None;
            }
            Command::SetPriority => {
                channel.set_priority(argument);
                return None;
            }
            Command::SetPanicPriority => {
                channel.set_panic_priority(argument);
                return None;
            }
            Command::SetEnableWaitOstdWrites => {
                channel.set_wait_for_outstanding_writes(flag);
                return None;
            }
            Command::SetDisableDebugPause => {
                channel.set_debug_pause_disabled(flag);
                return None;
            }
            Command::Abort => {
                channel.abort();
                return None;
            }
            Command::Reset => {
                channel.reset();
                return None;
            }

            Command::GetCtrlblockAddr => channel.control_block_address(),
            Command::GetTransferActive => channel.is_transfer_active().into(),
            Command::GetTransferDone => channel.transfer_done().into(),
            Command::GetIntrStatus => channel.interrupt_status().into(),
            Command::GetIsRequestingData => channel.is_requesting_data().into(),
            Command::GetIsPaused => channel.is_paused().into(),
            Command::GetIsPausedByInactiveDreq => channel.is_paused_by_inactive_dreq().into(),
            Command::GetIsWaitingOstdWrites => channel.is_waiting_for_outstanding_writes().into(),
            Command::GetErrorOccurred => channel.error_occurred().into(),
            Command::GetPriority => channel.priority(),
            Command::GetPanicPriority => channel.panic_priority(),
            Command::GetEnableWaitOstdWrites => channel.wait_for_outstanding_writes_enabled().into(),
            Command::GetDisableDebugPause => channel.debug_pause_disabled().into(),
            Command::GetDisableWideBursts => channel.wide_bursts_disabled().into(),
            Command::GetWaitCycles => channel.wait_cycles(),
            Command::GetPermap => channel.permap(),
            Command::GetBurstLength => channel.burst_length(),
            Command::GetEnableIgnoreSrcReads => channel.ignore_src_reads_enabled().into(),
            Command::GetDreqCallsSrcReads => channel.dreq_paces_src_reads().into(),
            Command::GetEnableSrcRead128bitWidth => channel.src_read_128bit_enabled().into(),
            Command::GetEnableSrcAddrInc => channel.src_addr_inc_enabled().into(),
            Command::GetEnableIgnoreDstWrites => channel.ignore_dst_writes_enabled().into(),
            Command::GetDreqCallsDstWrites => channel.dreq_paces_dst_writes().into(),
            Command::GetEnableDstWrite128bitWidth => channel.dst_write_128bit_enabled().into(),
            Command::GetEnableDstAddrInc => channel.dst_addr_inc_enabled().into(),
            Command::GetEnableWaitWriteResponse => channel.wait_write_response_enabled().into(),
            Command::GetEnableTdmode => channel.tdmode_enabled().into(),
            Command::GetEnableIntr => channel.interrupt_enabled().into(),
            Command::GetSrcAddr => channel.src_addr(),
            Command::GetDstAddr => channel.dst_addr(),
            Command::GetTransferLengthBytes => channel.transfer_length_bytes(),
            Command::GetTransferLengthExt => channel.transfer_length_ext(),
            Command::GetSrcStride => channel.src_stride(),
            Command::GetDstStride => channel.dst_stride(),
            Command::GetNextCbAddr => channel.next_control_block_address(),
            Command::DebugGetIsTypeLite => channel.debug_is_lite().into(),
            Command::DebugGetVersion => channel.debug_version(),
            Command::DebugGetState => channel.debug_state(),
            Command::DebugGetId => channel.debug_id(),
            Command::DebugGetOstdWritesCounter => channel.debug_outstanding_writes(),
            Command::DebugGetReadError => channel.debug_read_error().into(),
            Command::DebugGetFifoError => channel.debug_fifo_error().into(),
            Command::DebugGetReadLastNotSetError => channel.debug_read_last_not_set_error().into(),

            // Served above, without a channel.
            Command::GetFullIntrStatus
            | Command::SetEnableCtrl
            | Command::GetEnableCtrl
            | Command::GetChannelIntrStatus => return None,
        };
        Some(answer)
    }
}

impl<R: Register> Service for &Dma<R> {
    fn serve(&mut self, bytes: &mut [u8]) -> Result<()> {
        let mut frame = Frame::try_from(&*bytes)?;
        self.dispatch(&mut frame);
        bytes.copy_from_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::protocol::{Command, Frame, FRAME_SIZE, RESPONSE};
    use crate::ral::dma;
    use crate::sim::{Memory, Simulator};
    use crate::{Error, Service};

    fn run(dma: &crate::Dma<crate::sim::SimRegister>, command: Command, channel: u8, argument: u32) -> Frame {
        let mut frame = Frame::request(command, channel, argument);
        dma.dispatch(&mut frame);
        assert!(frame.is_response());
        frame
    }

    #[test]
    fn setters_and_getters_round_trip() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();

        run(&dma, Command::SetPriority, 2, 0x1234_567B);
        assert_eq!(run(&dma, Command::GetPriority, 2, 0).argument(), 0xB);

        run(&dma, Command::SetCtrlblockAddr, 2, 0xC000_0040);
        assert_eq!(run(&dma, Command::GetCtrlblockAddr, 2, 0).argument(), 0xC000_0040);

        run(&dma, Command::SetDisableDebugPause, 2, 3);
        assert_eq!(run(&dma, Command::GetDisableDebugPause, 2, 0).argument(), 1);
    }

    #[test]
    fn read_and_clear_commands_answer_once() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        sim.latch_status(5, dma::CS::END::mask);
        assert_eq!(run(&dma, Command::GetTransferDone, 5, 0).argument(), 1);
        assert_eq!(run(&dma, Command::GetTransferDone, 5, 0).argument(), 0);
    }

    #[test]
    fn lite_channels_answer_zero_for_strides() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        sim.load_registers(8, &[0, 0, 0, 0, 0x0040_0040, 0]);
        assert_eq!(run(&dma, Command::GetSrcStride, 8, 0xFFFF).argument(), 0);
        assert_eq!(run(&dma, Command::DebugGetIsTypeLite, 8, 0).argument(), 1);
    }

    #[test]
    fn global_commands() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();

        run(&dma, Command::SetEnableCtrl, 6, 0);
        assert_eq!(run(&dma, Command::GetEnableCtrl, 6, 0).argument(), 0);
        assert_eq!(run(&dma, Command::GetEnableCtrl, 5, 0).argument(), 1);
        assert_eq!(run(&dma, Command::GetFullIntrStatus, 200, 0).argument(), 0);
    }

    #[test]
    fn flag_setters_only_look_at_bit_0() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();

        run(&dma, Command::SetEnableCtrl, 3, 0xFFFF_FFFE);
        assert_eq!(run(&dma, Command::GetEnableCtrl, 3, 0).argument(), 0);
        run(&dma, Command::SetEnableCtrl, 3, 0x8000_0001);
        assert_eq!(run(&dma, Command::GetEnableCtrl, 3, 0).argument(), 1);

        run(&dma, Command::SetEnableWaitOstdWrites, 3, 2);
        assert_eq!(run(&dma, Command::GetEnableWaitOstdWrites, 3, 0).argument(), 0);
    }

    #[test]
    fn invalid_channel_is_acknowledged() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();

        let frame = run(&dma, Command::GetPriority, 15, 0xDEAD_BEEF);
        assert_eq!(frame.argument(), 0);

        let frame = run(&dma, Command::SetPriority, 15, 0xDEAD_BEEF);
        assert_eq!(frame.argument(), 0xDEAD_BEEF);
    }

    #[test]
    fn unknown_opcode_is_acknowledged() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        let mut frame = Frame::from_bytes([77, 0, 1, 2, 3, 4]);
        dma.dispatch(&mut frame);
        assert_eq!(frame.as_bytes(), &[RESPONSE, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn service_checks_frame_size() {
        let sim = Simulator::new(Memory::new(0xC000_0000, 0x100));
        let dma = sim.dma();
        let mut service = &dma;

        let mut bytes = [0u8; FRAME_SIZE + 1];
        assert!(matches!(
            service.serve(&mut bytes),
            Err(Error::FrameLength { expected: FRAME_SIZE, actual: 7 })
        ));

        let mut bytes = *Frame::request(Command::GetEnableCtrl, 0, 0).as_bytes();
        service.serve(&mut bytes).unwrap();
        assert_eq!(bytes, [RESPONSE, 0, 1, 0, 0, 0]);
    }
}
