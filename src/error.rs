//! DMA driver errors.
//!
//! Hardware faults aren't errors here. They're status bits on the
//! channel that callers poll. These errors describe the plumbing
//! around the hardware: the pseudo-file, frame layout and address
//! translation.

use core::fmt;

/// A driver error.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The pseudo-file couldn't be opened, written or read.
    #[cfg(feature = "std")]
    Io(std::io::Error),
    /// No response sentinel arrived within the configured timeout.
    Timeout,
    /// A frame doesn't have the size that its protocol expects.
    FrameLength {
        /// Size required by the protocol.
        expected: usize,
        /// Size of the buffer that was supplied.
        actual: usize,
    },
    /// A virtual address doesn't fit the 32-bit translation protocol.
    AddressWidth(usize),
    /// An address falls outside of a translation window.
    Unmapped(usize),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(feature = "std")]
            Error::Io(err) => write!(f, "pseudo-file I/O failed: {err}"),
            Error::Timeout => f.write_str("timed out waiting for the kernel response"),
            Error::FrameLength { expected, actual } => {
                write!(f, "frame is {actual} bytes, expected {expected}")
            }
            Error::AddressWidth(addr) => {
                write!(f, "address {addr:#x} doesn't fit in 32 bits")
            }
            Error::Unmapped(addr) => write!(f, "address {addr:#x} isn't mapped"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
