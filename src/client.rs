//! User-side DMA and MMU clients
//!
//! The register-side half of the driver lives in the kernel and exposes
//! two pseudo-files: `/proc/DMA_Ctrl` for [DMA commands](crate::protocol)
//! and `/proc/MMU32` for [address translation](crate::mmu). The clients
//! in here write a request frame, wait for the response, and decode it.
//!
//! ```no_run
//! use bcm2837_dma::client::{Config, DmaClient, MmuClient};
//! use bcm2837_dma::ControlBlock;
//!
//! # fn main() -> bcm2837_dma::Result<()> {
//! let config = Config::default();
//! let mut dma = DmaClient::open(&config)?;
//! let mut mmu = MmuClient::open(&config)?;
//!
//! let src = [0u8; 256];
//! let mut dst = [0u8; 256];
//! let mut cb = Box::new(ControlBlock::new());
//! cb.set_src_addr_virt(&mut mmu, src.as_ptr())?;
//! cb.set_dst_addr_virt(&mut mmu, dst.as_mut_ptr())?;
//! cb.enable_src_addr_inc(true);
//! cb.enable_dst_addr_inc(true);
//! cb.set_transfer_length_bytes(256);
//!
//! dma.set_ctrlblock_addr_virt(0, &mut mmu, &*cb)?;
//! dma.set_transfer_active(0, true)?;
//! while !dma.transfer_done(0)? {}
//! # Ok(())
//! # }
//! ```

mod dma;
mod mmu;
mod transport;

pub use dma::DmaClient;
pub use mmu::MmuClient;
pub use transport::{Loopback, ProcFile, Transport};

use std::path::{Path, PathBuf};
use std::time::Duration;

/// How a transport waits for the register side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Re-read the frame until the response sentinel appears.
    ///
    /// `None` waits forever. A stuck register side then blocks the
    /// caller indefinitely.
    Response { timeout: Option<Duration> },
    /// Busy-wait a fixed delay after the write, then read once.
    ///
    /// The frame is returned as read, response or not.
    Delay(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Response { timeout: None }
    }
}

/// Client configuration.
///
/// ```
/// use std::time::Duration;
/// use bcm2837_dma::client::{Config, WaitStrategy};
///
/// let config = Config::default()
///     .with_dma_path("/proc/DMA_Ctrl")
///     .with_wait(WaitStrategy::Response { timeout: Some(Duration::from_millis(10)) });
/// assert_eq!(config.mmu_path().to_str(), Some("/proc/MMU32"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    dma_path: PathBuf,
    mmu_path: PathBuf,
    wait: WaitStrategy,
}

impl Config {
    /// Default path of the DMA pseudo-file.
    pub const DMA_PATH: &'static str = "/proc/DMA_Ctrl";
    /// Default path of the MMU pseudo-file.
    pub const MMU_PATH: &'static str = "/proc/MMU32";

    pub fn with_dma_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dma_path = path.into();
        self
    }

    pub fn with_mmu_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.mmu_path = path.into();
        self
    }

    pub fn with_wait(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    pub fn dma_path(&self) -> &Path {
        &self.dma_path
    }

    pub fn mmu_path(&self) -> &Path {
        &self.mmu_path
    }

    pub fn wait(&self) -> WaitStrategy {
        self.wait
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dma_path: PathBuf::from(Self::DMA_PATH),
            mmu_path: PathBuf::from(Self::MMU_PATH),
            wait: WaitStrategy::default(),
        }
    }
}
