use super::{Config, ProcFile, Transport};
use crate::mmu::{Frame, Translate, GET_PHYSICAL_ADDR, GET_VIRTUAL_ADDR};
use crate::{Error, Result};

/// Address translation through the kernel's MMU pseudo-file.
///
/// The protocol carries 32-bit addresses. Virtual addresses that don't
/// fit are rejected before anything is sent.
#[derive(Debug)]
pub struct MmuClient<T> {
    transport: T,
}

impl MmuClient<ProcFile> {
    /// Open the MMU pseudo-file named by `config`.
    pub fn open(config: &Config) -> Result<Self> {
        ProcFile::open(config.mmu_path(), config.wait()).map(MmuClient::new)
    }
}

impl<T: Transport> MmuClient<T> {
    pub fn new(transport: T) -> Self {
        MmuClient { transport }
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn call(&mut self, command: u8, address: u32) -> Result<u32> {
        let mut frame = Frame::request(command, address);
        self.transport.exchange(frame.as_bytes_mut())?;
        Ok(frame.address())
    }
}

impl<T: Transport> Translate for MmuClient<T> {
    fn to_physical(&mut self, virt: usize) -> Result<u32> {
        let virt = u32::try_from(virt).map_err(|_| Error::AddressWidth(virt))?;
        self.call(GET_PHYSICAL_ADDR, virt)
    }

    fn to_virtual(&mut self, phys: u32) -> Result<usize> {
        self.call(GET_VIRTUAL_ADDR, phys).map(|virt| virt as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::MmuClient;
    use crate::client::Loopback;
    use crate::mmu::{LinearMap, Server, Translate};
    use crate::Error;

    #[test]
    fn translates_through_the_server() {
        let server = Server::new(LinearMap::new(0x8000, 0xC000_0000, 0x1000));
        let mut mmu = MmuClient::new(Loopback::new(server));
        assert_eq!(mmu.to_physical(0x8010).unwrap(), 0xC000_0010);
        assert_eq!(mmu.to_virtual(0xC000_0FFF).unwrap(), 0x8FFF);
    }

    #[test]
    fn wide_addresses_are_rejected() {
        let server = Server::new(LinearMap::new(0, 0, 0));
        let mut mmu = MmuClient::new(Loopback::new(server));
        if let Ok(virt) = usize::try_from(0x1_0000_0000u64) {
            assert!(matches!(mmu.to_physical(virt), Err(Error::AddressWidth(_))));
        }
    }
}
