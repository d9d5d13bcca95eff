//! Physical / virtual address translation
//!
//! Control blocks, and the channel's control block address, hold
//! physical addresses. Software holds virtual pointers. A [`Translate`]
//! implementation bridges the two.
//!
//! The kernel exposes translation through its own 5-byte pseudo-file
//! protocol: `[command][u32 LE address]`. [`Server`] answers that
//! protocol over any `Translate`. The user-side client is
//! `client::MmuClient`.

use crate::{dispatch::Service, Error, Result};

/// Converts between virtual and physical addresses.
pub trait Translate {
    /// Returns the physical address behind the virtual address `virt`.
    fn to_physical(&mut self, virt: usize) -> Result<u32>;
    /// Returns the virtual address that maps the physical address `phys`.
    fn to_virtual(&mut self, phys: u32) -> Result<usize>;
}

impl<T: Translate + ?Sized> Translate for &mut T {
    fn to_physical(&mut self, virt: usize) -> Result<u32> {
        (**self).to_physical(virt)
    }
    fn to_virtual(&mut self, phys: u32) -> Result<usize> {
        (**self).to_virtual(phys)
    }
}

/// A contiguous virtual window over a contiguous physical window.
///
/// This is the shape of a buffer from the VideoCore mailbox allocator,
/// or of a mapped `/dev/mem` region. Addresses outside of the window
/// don't translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMap {
    virt: usize,
    phys: u32,
    len: usize,
}

impl LinearMap {
    /// Map `len` bytes starting at virtual address `virt` onto physical
    /// address `phys`.
    pub const fn new(virt: usize, phys: u32, len: usize) -> Self {
        LinearMap { virt, phys, len }
    }

    /// The start of the virtual window.
    pub const fn virtual_base(&self) -> usize {
        self.virt
    }

    /// The start of the physical window.
    pub const fn physical_base(&self) -> u32 {
        self.phys
    }

    /// Length of both windows.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Translate for LinearMap {
    fn to_physical(&mut self, virt: usize) -> Result<u32> {
        let offset = virt
            .checked_sub(self.virt)
            .filter(|offset| *offset < self.len)
            .ok_or(Error::Unmapped(virt))?;
        u32::try_from(offset)
            .ok()
            .and_then(|offset| self.phys.checked_add(offset))
            .ok_or(Error::Unmapped(virt))
    }

    fn to_virtual(&mut self, phys: u32) -> Result<usize> {
        let offset = phys
            .checked_sub(self.phys)
            .map(|offset| offset as usize)
            .filter(|offset| *offset < self.len)
            .ok_or(Error::Unmapped(phys as usize))?;
        self.virt
            .checked_add(offset)
            .ok_or(Error::Unmapped(phys as usize))
    }
}

/// Size of an MMU frame.
pub const FRAME_SIZE: usize = 5;

/// Ask for the physical address behind a virtual address.
pub const GET_PHYSICAL_ADDR: u8 = 1;

/// Ask for the virtual address of a physical address.
pub const GET_VIRTUAL_ADDR: u8 = 2;

/// Written into the command byte once the request is served.
pub const RESPONSE: u8 = 0xFF;

/// An MMU request or response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame([u8; FRAME_SIZE]);

impl Frame {
    /// Build a request.
    pub fn request(command: u8, address: u32) -> Self {
        let mut frame = Frame([0; FRAME_SIZE]);
        frame.0[0] = command;
        frame.set_address(address);
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

    pub const fn command(&self) -> u8 {
        self.0[0]
    }

    pub fn address(&self) -> u32 {
        let [_, a, b, c, d] = self.0;
        u32::from_le_bytes([a, b, c, d])
    }

    pub fn set_address(&mut self, address: u32) {
        self.0[1..].copy_from_slice(&address.to_le_bytes());
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

/// Answers MMU frames with a [`Translate`] implementation.
///
/// Addresses that don't translate are answered with zero. Unknown
/// commands are acknowledged and the address is left as it was.
#[derive(Debug)]
pub struct Server<T> {
    translate: T,
}

impl<T: Translate> Server<T> {
    pub fn new(translate: T) -> Self {
        Server { translate }
    }

    /// Answer `frame` in place.
    pub fn handle(&mut self, frame: &mut Frame) {
        let address = frame.address();
        match frame.command() {
            GET_PHYSICAL_ADDR => {
                let phys = self.translate.to_physical(address as usize).unwrap_or_else(|err| {
                    log::warn!("MMU: {err}");
                    0
                });
                frame.set_address(phys);
            }
            GET_VIRTUAL_ADDR => {
                let virt = self
                    .translate
                    .to_virtual(address)
                    .and_then(|virt| u32::try_from(virt).map_err(|_| Error::AddressWidth(virt)))
                    .unwrap_or_else(|err| {
                        log::warn!("MMU: {err}");
                        0
                    });
                frame.set_address(virt);
            }
            command => log::warn!("MMU: unknown command {command}"),
        }
        frame.mark_response();
    }

    pub fn into_inner(self) -> T {
        self.translate
    }
}

impl<T: Translate> Service for Server<T> {
    fn serve(&mut self, bytes: &mut [u8]) -> Result<()> {
        let mut frame = Frame::try_from(&*bytes)?;
        log::trace!("MMU: command {} address {:#010x}", frame.command(), frame.address());
        self.handle(&mut frame);
        bytes.copy_from_slice(frame.as_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_map_translates_inside_window() {
        let mut map = LinearMap::new(0x1000, 0xC000_0000, 0x100);
        assert_eq!(map.to_physical(0x1000).unwrap(), 0xC000_0000);
        assert_eq!(map.to_physical(0x10FF).unwrap(), 0xC000_00FF);
        assert_eq!(map.to_virtual(0xC000_0080).unwrap(), 0x1080);
    }

    #[test]
    fn linear_map_rejects_outside_window() {
        let mut map = LinearMap::new(0x1000, 0xC000_0000, 0x100);
        assert!(matches!(map.to_physical(0xFFF), Err(Error::Unmapped(0xFFF))));
        assert!(matches!(map.to_physical(0x1100), Err(Error::Unmapped(0x1100))));
        assert!(matches!(map.to_virtual(0xC000_0100), Err(Error::Unmapped(_))));
        assert!(map.to_virtual(0xBFFF_FFFF).is_err());
    }

    #[test]
    fn linear_map_rejects_virtual_overflow() {
        let mut map = LinearMap::new(usize::MAX - 0x10, 0, 0x100);
        assert_eq!(map.to_virtual(0x10).unwrap(), usize::MAX);
        assert!(matches!(map.to_virtual(0x20), Err(Error::Unmapped(0x20))));
    }

    #[test]
    fn address_is_little_endian() {
        let frame = Frame::request(GET_PHYSICAL_ADDR, 0x1234_5678);
        assert_eq!(frame.as_bytes(), &[1, 0x78, 0x56, 0x34, 0x12]);
    }

    #[test]
    fn server_answers_both_directions() {
        let mut server = Server::new(LinearMap::new(0x1000, 0xC000_0000, 0x100));

        let mut bytes = *Frame::request(GET_PHYSICAL_ADDR, 0x1010).as_bytes();
        server.serve(&mut bytes).unwrap();
        let frame = Frame::from_bytes(bytes);
        assert!(frame.is_response());
        assert_eq!(frame.address(), 0xC000_0010);

        let mut bytes = *Frame::request(GET_VIRTUAL_ADDR, 0xC000_0020).as_bytes();
        server.serve(&mut bytes).unwrap();
        assert_eq!(Frame::from_bytes(bytes).address(), 0x1020);
    }

    #[test]
    fn server_answers_zero_when_unmapped() {
        let mut server = Server::new(LinearMap::new(0x1000, 0xC000_0000, 0x100));
        let mut frame = Frame::request(GET_PHYSICAL_ADDR, 0x8000);
        server.handle(&mut frame);
        assert!(frame.is_response());
        assert_eq!(frame.address(), 0);
    }

    #[test]
    fn server_acknowledges_unknown_commands() {
        let mut server = Server::new(LinearMap::new(0, 0, 0));
        let mut frame = Frame::request(9, 0xABCD);
        server.handle(&mut frame);
        assert!(frame.is_response());
        assert_eq!(frame.address(), 0xABCD);
    }

    #[test]
    fn server_rejects_short_frames() {
        let mut server = Server::new(LinearMap::new(0, 0, 0));
        let mut bytes = [GET_PHYSICAL_ADDR, 0, 0];
        assert!(matches!(
            server.serve(&mut bytes),
            Err(Error::FrameLength { expected: 5, actual: 3 })
        ));
        assert_eq!(bytes[0], GET_PHYSICAL_ADDR);
    }
}
