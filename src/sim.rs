//! A software model of the DMA controller
//!
//! The model has the same register blocks as the hardware, with the
//! same access rules: read-only status bits, write-1-to-clear events
//! and self-clearing commands. [`Simulator::step`] plays the engine. It
//! walks control blocks out of a simulated bus [`Memory`] and copies
//! bytes between physical addresses in that memory.
//!
//! DREQ pacing isn't modelled; every peripheral is always ready.
//! `INT_STATUS` and `CS.ERROR` follow the channel flags as of the last
//! step or latch.
//!
//! ```
//! use bcm2837_dma::sim::{Memory, Simulator};
//! use bcm2837_dma::ControlBlock;
//!
//! let sim = Simulator::new(Memory::new(0xC000_0000, 0x1000));
//! let dma = sim.dma();
//!
//! let mut cb = ControlBlock::new();
//! cb.set_src_addr_phys(0xC000_0100);
//! cb.set_dst_addr_phys(0xC000_0200);
//! cb.enable_src_addr_inc(true);
//! cb.enable_dst_addr_inc(true);
//! cb.set_transfer_length_bytes(4);
//! sim.write_memory(0xC000_0100, &[1, 2, 3, 4]).unwrap();
//! sim.store_control_block(0xC000_0000, &cb).unwrap();
//!
//! let channel = dma.channel(0).unwrap();
//! channel.set_control_block_address(0xC000_0000);
//! channel.set_transfer_active(true);
//! sim.step();
//!
//! assert!(channel.transfer_done());
//! let mut copy = [0; 4];
//! sim.read_memory(0xC000_0200, &mut copy).unwrap();
//! assert_eq!(copy, [1, 2, 3, 4]);
//! ```

use core::ops::Range;
use core::sync::atomic::{AtomicU32, Ordering};

use std::boxed::Box;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::vec;
use std::vec::Vec;

use crate::channel::ChannelType;
use crate::ral::dma::{self, ChannelRegisterBlock, GlobalRegisterBlock, CHANNEL_COUNT};
use crate::ral::Register;
use crate::{ControlBlock, Dma, Error, Result};

/// A modelled 32-bit register.
///
/// Software writes follow the masks:
///
/// - read-only bits keep their value.
/// - write-1-to-clear bits clear where a 1 is written.
/// - strobe bits are set by a 1 and stay set until the engine services
///   them. A 0 doesn't cancel a pending strobe.
/// - every other bit takes the written value.
#[derive(Debug)]
pub struct SimRegister {
    value: AtomicU32,
    read_only: u32,
    w1c: u32,
    strobe: u32,
}

impl SimRegister {
    /// A fully writable register.
    pub const fn new(reset: u32) -> Self {
        Self::with_masks(reset, 0, 0, 0)
    }

    /// A register that software can only read.
    pub const fn read_only(reset: u32) -> Self {
        Self::with_masks(reset, u32::MAX, 0, 0)
    }

    pub const fn with_masks(reset: u32, read_only: u32, w1c: u32, strobe: u32) -> Self {
        SimRegister {
            value: AtomicU32::new(reset),
            read_only,
            w1c,
            strobe,
        }
    }

    /// Set the register from the hardware side, ignoring the masks.
    pub fn set(&self, value: u32) {
        self.value.store(value, Ordering::SeqCst);
    }

    /// Raise bits from the hardware side.
    pub fn latch(&self, bits: u32) {
        self.value.fetch_or(bits, Ordering::SeqCst);
    }

    /// Drop bits from the hardware side.
    pub fn clear(&self, bits: u32) {
        self.value.fetch_and(!bits, Ordering::SeqCst);
    }

    fn written(&self, old: u32, value: u32) -> u32 {
        let plain = !(self.read_only | self.w1c | self.strobe);
        (old & self.read_only)
            | (old & self.w1c & !value)
            | ((old | value) & self.strobe)
            | (value & plain)
    }
}

impl Register for SimRegister {
    fn read(&self) -> u32 {
        self.value.load(Ordering::SeqCst)
    }

    fn write(&self, value: u32) {
        let mut old = self.value.load(Ordering::SeqCst);
        loop {
            let new = self.written(old, value);
            match self
                .value
                .compare_exchange_weak(old, new, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(current) => old = current,
            }
        }
    }
}

/// Simulated bus memory.
///
/// `len` bytes starting at the physical address `base`. Accesses outside
/// of that window are bus faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Memory {
    base: u32,
    bytes: Vec<u8>,
}

impl Memory {
    /// Zeroed memory at physical address `base`.
    pub fn new(base: u32, len: usize) -> Self {
        Memory {
            base,
            bytes: vec![0; len],
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn range(&self, addr: u32, len: usize) -> Result<Range<usize>> {
        let start = addr
            .checked_sub(self.base)
            .map(|offset| offset as usize)
            .ok_or(Error::Unmapped(addr as usize))?;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(Error::Unmapped(addr as usize))?;
        Ok(start..end)
    }

    pub fn read(&self, addr: u32, buffer: &mut [u8]) -> Result<()> {
        let range = self.range(addr, buffer.len())?;
        buffer.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        let range = self.range(addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn read_word(&self, addr: u32) -> Result<u32> {
        let mut word = [0; 4];
        self.read(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_word(&mut self, addr: u32, word: u32) -> Result<()> {
        self.write(addr, &word.to_le_bytes())
    }

    fn read_byte(&self, addr: u32) -> Result<u8> {
        let mut byte = [0];
        self.read(addr, &mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, addr: u32, byte: u8) -> Result<()> {
        self.write(addr, &[byte])
    }
}

fn channel_block(index: usize) -> ChannelRegisterBlock<SimRegister> {
    use dma::{CS, DEBUG};

    let lite = if index >= 7 { DEBUG::LITE::mask } else { 0 };
    let debug = lite | (2 << DEBUG::VERSION::offset) | ((index as u32) << DEBUG::DMA_ID::offset);

    ChannelRegisterBlock {
        CS: SimRegister::with_masks(
            0,
            CS::ERROR::mask
                | CS::WAITING_FOR_OUTSTANDING_WRITES::mask
                | CS::DREQ_STOPS_DMA::mask
                | CS::PAUSED::mask
                | CS::DREQ::mask,
            CS::W1C,
            CS::RESET::mask | CS::ABORT::mask,
        ),
        CONBLK_AD: SimRegister::new(0),
        TI: SimRegister::read_only(0),
        SOURCE_AD: SimRegister::read_only(0),
        DEST_AD: SimRegister::read_only(0),
        TXFR_LEN: SimRegister::read_only(0),
        STRIDE: SimRegister::read_only(0),
        NEXTCONBK: SimRegister::read_only(0),
        DEBUG: SimRegister::with_masks(debug, !DEBUG::W1C, DEBUG::W1C, 0),
    }
}

/// The modelled DMA controller.
pub struct Simulator {
    channels: [ChannelRegisterBlock<SimRegister>; CHANNEL_COUNT],
    global: GlobalRegisterBlock<SimRegister>,
    memory: Mutex<Memory>,
}

impl Simulator {
    /// Create a controller with every channel enabled and idle.
    ///
    /// The controller is leaked so that `Dma` handles can point at it
    /// for the rest of the program.
    pub fn new(memory: Memory) -> &'static Simulator {
        let sim = Simulator {
            channels: core::array::from_fn(channel_block),
            global: GlobalRegisterBlock {
                INT_STATUS: SimRegister::read_only(0),
                _reserved: [SimRegister::new(0), SimRegister::new(0), SimRegister::new(0)],
                ENABLE: SimRegister::new(dma::INT_STATUS::CHANNELS),
            },
            memory: Mutex::new(memory),
        };
        Box::leak(Box::new(sim))
    }

    /// A `Dma` driver bound to this controller.
    pub fn dma(&'static self) -> Dma<SimRegister> {
        let channels = core::array::from_fn(|index| &self.channels[index] as *const _);
        // Safety: the simulator is never freed.
        unsafe { Dma::from_raw_parts(channels, &self.global) }
    }

    /// Lock the simulated memory.
    pub fn memory(&self) -> MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_memory(&self, addr: u32, data: &[u8]) -> Result<()> {
        self.memory().write(addr, data)
    }

    pub fn read_memory(&self, addr: u32, buffer: &mut [u8]) -> Result<()> {
        self.memory().read(addr, buffer)
    }

    /// Copy `cb` into memory at `addr`, the way the engine will read it.
    pub fn store_control_block(&self, addr: u32, cb: &ControlBlock) -> Result<()> {
        let mut memory = self.memory();
        for (offset, word) in (0..).step_by(4).zip(cb.to_words()) {
            memory.write_word(addr.wrapping_add(offset), word)?;
        }
        Ok(())
    }

    /// Raise CS flags on a channel, as the engine would.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside of `0..=14`.
    pub fn latch_status(&self, index: u8, bits: u32) {
        self.channels[usize::from(index)].CS.latch(bits);
        self.sync_status();
    }

    /// Raise DEBUG flags on a channel, as the engine would.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside of `0..=14`.
    pub fn latch_debug(&self, index: u8, bits: u32) {
        self.channels[usize::from(index)].DEBUG.latch(bits);
        self.sync_status();
    }

    /// Set `TI`, `SOURCE_AD`, `DEST_AD`, `TXFR_LEN`, `STRIDE` and
    /// `NEXTCONBK` of a channel, as if a control block was loaded.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside of `0..=14`.
    pub fn load_registers(&self, index: u8, values: &[u32; 6]) {
        let block = &self.channels[usize::from(index)];
        for (register, value) in loaded_registers(block).into_iter().zip(values) {
            register.set(*value);
        }
    }

    /// Advance every enabled channel by one control block.
    ///
    /// Pending resets and aborts are serviced first, and take the
    /// channel's whole step. Returns the number of control blocks that
    /// were loaded.
    pub fn step(&self) -> usize {
        let enabled = self.global.ENABLE.read();
        let mut loaded = 0;
        for (index, block) in self.channels.iter().enumerate() {
            if enabled & (1 << index) != 0 && self.step_channel(index, block) {
                loaded += 1;
            }
        }
        self.sync_status();
        loaded
    }

    /// Step until no channel is active, for at most `max_steps` steps.
    ///
    /// Returns `true` if every channel went idle.
    pub fn run(&self, max_steps: usize) -> bool {
        for _ in 0..max_steps {
            if !self.any_active() {
                return true;
            }
            self.step();
        }
        !self.any_active()
    }

    fn any_active(&self) -> bool {
        let enabled = self.global.ENABLE.read();
        self.channels.iter().enumerate().any(|(index, block)| {
            enabled & (1 << index) != 0
                && block.CS.read() & (dma::CS::ACTIVE::mask | dma::CS::RESET::mask | dma::CS::ABORT::mask) != 0
        })
    }

    fn step_channel(&self, index: usize, block: &ChannelRegisterBlock<SimRegister>) -> bool {
        use dma::CS;

        let cs = block.CS.read();
        if cs & CS::RESET::mask != 0 {
            log::trace!("SIM: channel {index} reset");
            block.CS.set(0);
            block.CONBLK_AD.set(0);
            for register in loaded_registers(block) {
                register.set(0);
            }
            block.DEBUG.clear(dma::DEBUG::W1C);
            return false;
        }
        if cs & CS::ABORT::mask != 0 {
            let next = block.NEXTCONBK.read();
            log::trace!("SIM: channel {index} abort, next block {next:#010x}");
            block.CS.clear(CS::ABORT::mask);
            block.CONBLK_AD.set(next);
            if next == 0 {
                block.CS.clear(CS::ACTIVE::mask);
            }
            return false;
        }
        if cs & CS::ACTIVE::mask == 0 {
            return false;
        }
        let addr = block.CONBLK_AD.read();
        if addr == 0 {
            block.CS.clear(CS::ACTIVE::mask);
            return false;
        }

        let mut memory = self.memory();
        let cb = match load_control_block(&memory, addr) {
            Ok(cb) => cb,
            Err(err) => {
                fault(index, block, err);
                return false;
            }
        };
        for (register, word) in loaded_registers(block).into_iter().zip(cb.to_words()) {
            register.set(word);
        }

        let standard = ChannelType::of(index as u8) == Some(ChannelType::Standard);
        match transfer(&mut memory, &cb, standard) {
            Ok((src, dst)) => {
                block.SOURCE_AD.set(src);
                block.DEST_AD.set(dst);
                block.TXFR_LEN.set(0);
            }
            Err(err) => {
                fault(index, block, err);
                return true;
            }
        }

        if cb.intr_enabled() {
            block.CS.latch(CS::INT::mask);
        }
        let next = cb.next_ctrlblock_addr();
        block.CONBLK_AD.set(next);
        if next == 0 {
            log::trace!("SIM: channel {index} done");
            block.CS.latch(CS::END::mask);
            block.CS.clear(CS::ACTIVE::mask);
        }
        true
    }

    /// Mirror channel flags into `INT_STATUS` and `CS.ERROR`.
    fn sync_status(&self) {
        let mut status = 0;
        for (index, block) in self.channels.iter().enumerate() {
            if block.CS.read() & dma::CS::INT::mask != 0 {
                status |= 1 << index;
            }
            if block.DEBUG.read() & dma::DEBUG::W1C != 0 {
                block.CS.latch(dma::CS::ERROR::mask);
            } else {
                block.CS.clear(dma::CS::ERROR::mask);
            }
        }
        self.global.INT_STATUS.set(status);
    }
}

fn loaded_registers(block: &ChannelRegisterBlock<SimRegister>) -> [&SimRegister; 6] {
    [
        &block.TI,
        &block.SOURCE_AD,
        &block.DEST_AD,
        &block.TXFR_LEN,
        &block.STRIDE,
        &block.NEXTCONBK,
    ]
}

fn fault(index: usize, block: &ChannelRegisterBlock<SimRegister>, err: Error) {
    log::debug!("SIM: channel {index} bus fault: {err}");
    block.DEBUG.latch(dma::DEBUG::READ_ERROR::mask);
    block.CS.latch(dma::CS::ERROR::mask);
    block.CS.clear(dma::CS::ACTIVE::mask);
}

fn load_control_block(memory: &Memory, addr: u32) -> Result<ControlBlock> {
    let mut words = [0; ControlBlock::WORDS];
    for (offset, word) in (0..).step_by(4).zip(words.iter_mut()) {
        *word = memory.read_word(addr.wrapping_add(offset))?;
    }
    Ok(ControlBlock::from_words(words))
}

/// Non-incrementing addresses stay on one 32-bit word.
fn address(base: u32, column: u32, increment: bool) -> u32 {
    if increment {
        base.wrapping_add(column)
    } else {
        base.wrapping_add(column % 4)
    }
}

/// Run one control block. Returns the final source and destination.
fn transfer(memory: &mut Memory, cb: &ControlBlock, standard: bool) -> Result<(u32, u32)> {
    let tdmode = standard && cb.tdmode_enabled();
    let ignore_src = standard && cb.ignore_src_reads_enabled();
    let ignore_dst = standard && cb.ignore_dst_writes_enabled();
    let (src_inc, dst_inc) = (cb.src_addr_inc_enabled(), cb.dst_addr_inc_enabled());

    // The engine runs YLENGTH + 1 rows in 2D mode.
    let rows = if tdmode { cb.transfer_length_ext() + 1 } else { 1 };
    let (src_stride, dst_stride) = if tdmode {
        (cb.src_stride() as u16 as i16, cb.dst_stride() as u16 as i16)
    } else {
        (0, 0)
    };
    let columns = cb.transfer_length_bytes();

    let mut src = cb.src_addr();
    let mut dst = cb.dst_addr();
    for _ in 0..rows {
        for column in 0..columns {
            let byte = if ignore_src {
                0
            } else {
                memory.read_byte(address(src, column, src_inc))?
            };
            if !ignore_dst {
                memory.write_byte(address(dst, column, dst_inc), byte)?;
            }
        }
        if src_inc {
            src = src.wrapping_add(columns);
        }
        if dst_inc {
            dst = dst.wrapping_add(columns);
        }
        src = src.wrapping_add_signed(src_stride.into());
        dst = dst.wrapping_add_signed(dst_stride.into());
    }
    Ok((src, dst))
}

#[cfg(test)]
mod tests {
    use super::{Memory, SimRegister, Simulator};
    use crate::ral::{dma, Register};
    use crate::ControlBlock;

    const BASE: u32 = 0xC000_0000;

    fn copy_block(src: u32, dst: u32, len: u16) -> ControlBlock {
        let mut cb = ControlBlock::new();
        cb.set_src_addr_phys(src);
        cb.set_dst_addr_phys(dst);
        cb.enable_src_addr_inc(true);
        cb.enable_dst_addr_inc(true);
        cb.set_transfer_length_bytes(len);
        cb
    }

    #[test]
    fn register_masks() {
        let reg = SimRegister::with_masks(0b0110, 0b1000_0000, 0b0110, 0b1_0000);
        reg.write(0b0001_0010);
        assert_eq!(reg.read(), 0b0001_0100);
        reg.write(0);
        assert_eq!(reg.read(), 0b0001_0100);
        reg.set(0b1000_0000);
        reg.write(0);
        assert_eq!(reg.read(), 0b1000_0000);
    }

    #[test]
    fn memory_faults_outside_window() {
        let mut memory = Memory::new(BASE, 16);
        assert!(memory.write_word(BASE + 12, 1).is_ok());
        assert!(memory.write_word(BASE + 13, 1).is_err());
        assert!(memory.read_word(BASE - 4).is_err());
    }

    #[test]
    fn control_block_at_the_top_of_the_bus_faults() {
        let sim = Simulator::new(Memory::new(0xFFFF_FF00, 0x100));
        let cb = copy_block(0, 0, 4);
        assert!(sim.store_control_block(0xFFFF_FFE0, &cb).is_ok());
        assert!(sim.store_control_block(0xFFFF_FFF0, &cb).is_err());
    }

    #[test]
    fn chained_blocks_run_one_per_step() {
        let sim = Simulator::new(Memory::new(BASE, 0x400));
        let dma = sim.dma();
        sim.write_memory(BASE + 0x100, b"hello, world!!!!").unwrap();

        let mut first = copy_block(BASE + 0x100, BASE + 0x200, 8);
        first.set_next_ctrlblock_addr_phys(BASE + 0x20);
        first.enable_intr(true);
        let second = copy_block(BASE + 0x108, BASE + 0x208, 8);
        sim.store_control_block(BASE, &first).unwrap();
        sim.store_control_block(BASE + 0x20, &second).unwrap();

        let channel = dma.channel(4).unwrap();
        channel.set_control_block_address(BASE);
        channel.set_transfer_active(true);

        assert_eq!(sim.step(), 1);
        assert!(channel.is_transfer_active());
        assert!(!channel.transfer_done());
        assert!(dma.channel_interrupt_status(4));
        assert_eq!(channel.control_block_address(), BASE + 0x20);

        assert_eq!(sim.step(), 1);
        assert!(!channel.is_transfer_active());
        assert!(channel.transfer_done());
        assert!(channel.interrupt_status());
        assert_eq!(channel.src_addr(), BASE + 0x110);

        let mut copy = [0; 16];
        sim.read_memory(BASE + 0x200, &mut copy).unwrap();
        assert_eq!(&copy, b"hello, world!!!!");
    }

    #[test]
    fn fixed_source_repeats_one_word() {
        let sim = Simulator::new(Memory::new(BASE, 0x100));
        let dma = sim.dma();
        sim.write_memory(BASE + 0x40, &[0xAu8, 0xB, 0xC, 0xD]).unwrap();
        let mut cb = copy_block(BASE + 0x40, BASE + 0x80, 12);
        cb.enable_src_addr_inc(false);
        sim.store_control_block(BASE, &cb).unwrap();

        let channel = dma.channel(8).unwrap();
        channel.set_control_block_address(BASE);
        channel.set_transfer_active(true);
        assert!(sim.run(4));

        let mut copy = [0; 12];
        sim.read_memory(BASE + 0x80, &mut copy).unwrap();
        assert_eq!(copy, [0xAu8, 0xB, 0xC, 0xD].repeat(3).as_slice());
    }

    #[test]
    fn tdmode_uses_strides_on_standard_channels() {
        let sim = Simulator::new(Memory::new(BASE, 0x200));
        let dma = sim.dma();
        sim.write_memory(BASE + 0x100, &[1, 2, 0, 0, 3, 4, 0, 0]).unwrap();

        let mut cb = copy_block(BASE + 0x100, BASE + 0x180, 2);
        cb.enable_tdmode(true);
        cb.set_transfer_length_ext(1);
        cb.set_src_stride(2);
        sim.store_control_block(BASE, &cb).unwrap();
        sim.store_control_block(BASE + 0x20, &cb).unwrap();

        let standard = dma.channel(0).unwrap();
        standard.set_control_block_address(BASE);
        standard.set_transfer_active(true);
        let lite = dma.channel(7).unwrap();
        lite.set_control_block_address(BASE + 0x20);
        lite.set_transfer_active(true);
        assert!(sim.run(4));

        let mut copy = [0; 4];
        sim.read_memory(BASE + 0x180, &mut copy).unwrap();
        assert_eq!(copy, [1, 2, 3, 4]);
        assert!(standard.tdmode_enabled());
        assert!(!lite.tdmode_enabled());
    }

    #[test]
    fn bus_fault_stops_the_channel() {
        let sim = Simulator::new(Memory::new(BASE, 0x100));
        let dma = sim.dma();
        sim.store_control_block(BASE, &copy_block(0x1000, BASE + 0x80, 4)).unwrap();

        let channel = dma.channel(2).unwrap();
        channel.set_control_block_address(BASE);
        channel.set_transfer_active(true);
        sim.step();

        assert!(!channel.is_transfer_active());
        assert!(!channel.transfer_done());
        assert!(channel.error_occurred());
        assert!(channel.debug_read_error());
        sim.step();
        assert!(!channel.error_occurred());
    }

    #[test]
    fn reset_and_abort_are_serviced_by_the_engine() {
        let sim = Simulator::new(Memory::new(BASE, 0x100));
        let dma = sim.dma();
        let mut cb = copy_block(BASE + 0x80, BASE + 0xC0, 4);
        cb.set_next_ctrlblock_addr_phys(BASE + 0x20);
        sim.store_control_block(BASE, &cb).unwrap();
        sim.store_control_block(BASE + 0x20, &cb).unwrap();

        let channel = dma.channel(1).unwrap();
        channel.set_control_block_address(BASE);
        channel.set_transfer_active(true);
        sim.step();

        channel.abort();
        assert_ne!(sim.channels[1].CS.read() & dma::CS::ABORT::mask, 0);
        sim.step();
        assert_eq!(sim.channels[1].CS.read() & dma::CS::ABORT::mask, 0);
        assert_eq!(channel.control_block_address(), BASE + 0x20);
        assert!(channel.is_transfer_active());

        channel.reset();
        sim.step();
        assert!(!channel.is_transfer_active());
        assert_eq!(channel.control_block_address(), 0);
        assert_eq!(channel.next_control_block_address(), 0);
    }

    #[test]
    fn disabled_channels_do_not_run() {
        let sim = Simulator::new(Memory::new(BASE, 0x100));
        let dma = sim.dma();
        sim.store_control_block(BASE, &copy_block(BASE + 0x80, BASE + 0xC0, 4)).unwrap();

        dma.enable_channel(3, false);
        let channel = dma.channel(3).unwrap();
        channel.set_control_block_address(BASE);
        channel.set_transfer_active(true);
        assert_eq!(sim.step(), 0);
        assert!(channel.is_transfer_active());

        dma.enable_channel(3, true);
        assert_eq!(sim.step(), 1);
        assert!(channel.transfer_done());
    }
}
