//! The DMA pseudo-file protocol
//!
//! Every request is a 6-byte frame:
//!
//! | byte | contents                          |
//! |------|-----------------------------------|
//! | 0    | opcode, see [`Command`]           |
//! | 1    | channel index                     |
//! | 2..6 | argument, `u32` little endian     |
//!
//! The register side runs the command, stores any result in the
//! argument, and overwrites the opcode with [`RESPONSE`]. Opcode numbers
//! are positional. Both sides must agree on them exactly; there's no
//! protocol version.

use crate::{Error, Result};

/// Size of a DMA frame.
pub const FRAME_SIZE: usize = 6;

/// Written into the opcode byte once a request is served.
pub const RESPONSE: u8 = 0xFF;

macro_rules! commands {
    ($($(#[$attr:meta])* $name:ident = $opcode:literal,)*) => {
        /// A DMA command opcode.
        ///
        /// Setters take their value from the argument. Getters store
        /// their result in the argument; flags use bit 0.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Command {
            $($(#[$attr])* $name = $opcode,)*
        }

        impl Command {
            /// Every command, in opcode order.
            pub const ALL: &'static [Command] = &[$(Command::$name,)*];

            /// Decode an opcode.
            pub const fn from_opcode(opcode: u8) -> Option<Self> {
                match opcode {
                    $($opcode => Some(Command::$name),)*
                    _ => None,
                }
            }
        }
    };
}

commands! {
    SetEnableCtrl = 0,
    GetEnableCtrl = 1,
    GetChannelIntrStatus = 2,
    /// Ignores the channel byte.
    GetFullIntrStatus = 3,
    SetCtrlblockAddr = 4,
    GetCtrlblockAddr = 5,
    SetTransferActive = 6,
    GetTransferActive = 7,
    /// Read-and-clear.
    GetTransferDone = 8,
    /// Read-and-clear.
    GetIntrStatus = 9,
    GetIsRequestingData = 10,
    GetIsPaused = 11,
    GetIsPausedByInactiveDreq = 12,
    GetIsWaitingOstdWrites = 13,
    GetErrorOccurred = 14,
    SetPriority = 15,
    GetPriority = 16,
    SetPanicPriority = 17,
    GetPanicPriority = 18,
    SetEnableWaitOstdWrites = 19,
    GetEnableWaitOstdWrites = 20,
    SetDisableDebugPause = 21,
    GetDisableDebugPause = 22,
    Abort = 23,
    Reset = 24,
    GetDisableWideBursts = 25,
    GetWaitCycles = 26,
    GetPermap = 27,
    GetBurstLength = 28,
    GetEnableIgnoreSrcReads = 29,
    GetDreqCallsSrcReads = 30,
    GetEnableSrcRead128bitWidth = 31,
    GetEnableSrcAddrInc = 32,
    GetEnableIgnoreDstWrites = 33,
    GetDreqCallsDstWrites = 34,
    GetEnableDstWrite128bitWidth = 35,
    GetEnableDstAddrInc = 36,
    GetEnableWaitWriteResponse = 37,
    GetEnableTdmode = 38,
    GetEnableIntr = 39,
    GetSrcAddr = 40,
    GetDstAddr = 41,
    GetTransferLengthBytes = 42,
    GetTransferLengthExt = 43,
    GetSrcStride = 44,
    GetDstStride = 45,
    GetNextCbAddr = 46,
    DebugGetIsTypeLite = 47,
    DebugGetVersion = 48,
    DebugGetState = 49,
    DebugGetId = 50,
    DebugGetOstdWritesCounter = 51,
    /// Read-and-clear.
    DebugGetReadError = 52,
    /// Read-and-clear.
    DebugGetFifoError = 53,
    /// Read-and-clear.
    DebugGetReadLastNotSetError = 54,
}

impl Command {
    /// The opcode byte.
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    /// Indicates if the command changes hardware state rather than
    /// only reporting it.
    ///
    /// Read-and-clear getters aren't setters, even though they
    /// acknowledge what they report.
    pub const fn is_setter(self) -> bool {
        matches!(
            self,
            Command::SetEnableCtrl
                | Command::SetCtrlblockAddr
                | Command::SetTransferActive
                | Command::SetPriority
                | Command::SetPanicPriority
                | Command::SetEnableWaitOstdWrites
                | Command::SetDisableDebugPause
                | Command::Abort
                | Command::Reset
        )
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;
    fn try_from(opcode: u8) -> core::result::Result<Self, u8> {
        Command::from_opcode(opcode).ok_or(opcode)
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.opcode()
    }
}

/// A DMA request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    /// Build a request.
    pub fn request(command: Command, channel: u8, argument: u32) -> Self {
        let mut frame = Frame([command.opcode(), channel, 0, 0, 0, 0]);
        frame.set_argument(argument);
        frame
    }

    pub const fn from_bytes(bytes: [u8; FRAME_SIZE]) -> Self {
        Frame(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.0
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; FRAME_SIZE] {
        &mut self.0
    }

    /// The raw opcode byte. [`RESPONSE`] once served.
    pub const fn opcode(&self) -> u8 {
        self.0[0]
    }

    /// The decoded opcode, if it's known.
    pub const fn command(&self) -> Option<Command> {
        Command::from_opcode(self.0[0])
    }

    pub const fn channel(&self) -> u8 {
        self.0[1]
    }

    pub fn argument(&self) -> u32 {
        let [_, _, a, b, c, d] = self.0;
        u32::from_le_bytes([a, b, c, d])
    }

    pub fn set_argument(&mut self, argument: u32) {
        self.0[2..].copy_from_slice(&argument.to_le_bytes());
    }

    /// Bit 0 of the argument.
    pub fn flag(&self) -> bool {
        self.argument() & 1 != 0
    }

    pub const fn is_response(&self) -> bool {
        self.0[0] == RESPONSE
    }

    pub fn mark_response(&mut self) {
        self.0[0] = RESPONSE;
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = Error;
    fn try_from(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; FRAME_SIZE] = bytes.try_into().map_err(|_| Error::FrameLength {
            expected: FRAME_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Frame(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_positional() {
        assert_eq!(Command::ALL.len(), 55);
        for (position, command) in Command::ALL.iter().enumerate() {
            assert_eq!(usize::from(command.opcode()), position);
            assert_eq!(Command::from_opcode(command.opcode()), Some(*command));
        }
        assert_eq!(Command::from_opcode(55), None);
        assert_eq!(Command::try_from(RESPONSE), Err(RESPONSE));
    }

    #[test]
    fn known_opcodes() {
        assert_eq!(Command::SetCtrlblockAddr.opcode(), 4);
        assert_eq!(Command::GetTransferDone.opcode(), 8);
        assert_eq!(Command::Reset.opcode(), 24);
        assert_eq!(Command::GetNextCbAddr.opcode(), 46);
        assert_eq!(Command::DebugGetReadLastNotSetError.opcode(), 54);
    }

    #[test]
    fn frame_layout() {
        let frame = Frame::request(Command::SetPriority, 12, 0xA1B2_C3D4);
        assert_eq!(frame.as_bytes(), &[15, 12, 0xD4, 0xC3, 0xB2, 0xA1]);
        assert_eq!(frame.command(), Some(Command::SetPriority));
        assert_eq!(frame.channel(), 12);
        assert_eq!(frame.argument(), 0xA1B2_C3D4);
        assert!(!frame.is_response());
    }

    #[test]
    fn response_keeps_channel_and_argument() {
        let mut frame = Frame::request(Command::GetPriority, 3, 0);
        frame.set_argument(7);
        frame.mark_response();
        assert!(frame.is_response());
        assert_eq!(frame.command(), None);
        assert_eq!(frame.channel(), 3);
        assert_eq!(frame.argument(), 7);
    }

    #[test]
    fn frames_must_be_six_bytes() {
        assert!(Frame::try_from(&[0u8; 6][..]).is_ok());
        assert!(matches!(
            Frame::try_from(&[0u8; 5][..]),
            Err(Error::FrameLength { expected: 6, actual: 5 })
        ));
    }
}
