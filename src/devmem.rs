//! Map the DMA window from user space.
//!
//! Needs read / write access to `/dev/mem`, usually root. The kernel
//! must allow access to the peripheral range (`iomem=relaxed`, or no
//! `CONFIG_STRICT_DEVMEM`).

use std::fs::OpenOptions;
use std::path::Path;

use memmap::{MmapMut, MmapOptions};

use crate::ral::dma::{DMA_BASE, DMA_WINDOW_SIZE};
use crate::{Dma, Result};

/// Physical memory device.
pub const DEV_MEM: &str = "/dev/mem";

/// A mapped DMA register window.
pub struct Mapping {
    dma: Dma,
    _map: MmapMut,
}

impl Mapping {
    /// Map the BCM2837 DMA window out of `/dev/mem`.
    pub fn open() -> Result<Self> {
        Self::open_at(DEV_MEM, DMA_BASE)
    }

    /// Map [`DMA_WINDOW_SIZE`] bytes of `path`, starting at `base`.
    pub fn open_at(path: impl AsRef<Path>, base: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        // Safety: the mapping is owned by `Mapping` and outlives the `Dma`
        // that points into it.
        let mut map = unsafe {
            MmapOptions::new()
                .offset(base as u64)
                .len(DMA_WINDOW_SIZE)
                .map_mut(&file)?
        };
        log::debug!("mapped {} at {base:#010x}", path.display());

        // Safety: the mapping spans the whole window.
        let dma = unsafe { Dma::new(map.as_mut_ptr() as *const ()) };
        Ok(Mapping { dma, _map: map })
    }

    /// The DMA driver over this mapping.
    pub fn dma(&self) -> &Dma {
        &self.dma
    }
}

#[cfg(test)]
mod tests {
    use super::Mapping;
    use crate::ral::dma::DMA_WINDOW_SIZE;

    #[test]
    fn drives_registers_through_a_mapped_file() {
        let path = std::env::temp_dir().join(format!("bcm2837-dma-window-{}", std::process::id()));
        std::fs::write(&path, vec![0u8; DMA_WINDOW_SIZE]).unwrap();

        let mapping = Mapping::open_at(&path, 0).unwrap();
        let dma = mapping.dma();
        dma.channel(3).unwrap().set_control_block_address(0xC000_0020);
        dma.enable_channel(3, true);
        assert_eq!(dma.channel(3).unwrap().control_block_address(), 0xC000_0020);
        assert!(dma.is_channel_enabled(3));
        drop(mapping);

        let window = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(&window[0x304..0x308], &0xC000_0020u32.to_le_bytes());
        assert_eq!(window[0xFF0], 1 << 3);
    }
}
