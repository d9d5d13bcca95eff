//! Frame transports

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::WaitStrategy;
use crate::protocol::RESPONSE;
use crate::{Error, Result, Service};

/// Carries a request frame to the register side and brings back the
/// response in the same buffer.
pub trait Transport {
    fn exchange(&mut self, frame: &mut [u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, frame: &mut [u8]) -> Result<()> {
        (**self).exchange(frame)
    }
}

/// A kernel pseudo-file.
///
/// The register side serves the request during the write. The response
/// is read back from the same file.
#[derive(Debug)]
pub struct ProcFile {
    file: File,
    path: PathBuf,
    wait: WaitStrategy,
}

impl ProcFile {
    /// Open the pseudo-file at `path` for reading and writing.
    pub fn open(path: impl AsRef<Path>, wait: WaitStrategy) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        log::debug!("opened {} ({wait:?})", path.display());
        Ok(ProcFile {
            file,
            path: path.to_path_buf(),
            wait,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn wait_for_response(&mut self, frame: &mut [u8], timeout: Option<std::time::Duration>) -> Result<()> {
        let start = Instant::now();
        loop {
            self.file.read_exact(frame)?;
            if frame.first() == Some(&RESPONSE) {
                return Ok(());
            }
            if timeout.is_some_and(|timeout| start.elapsed() >= timeout) {
                log::warn!("{}: no response after {:?}", self.path.display(), start.elapsed());
                return Err(Error::Timeout);
            }
            std::hint::spin_loop();
        }
    }
}

impl Transport for ProcFile {
    fn exchange(&mut self, frame: &mut [u8]) -> Result<()> {
        log::trace!("{}: request {frame:02x?}", self.path.display());
        self.file.write_all(frame)?;
        match self.wait {
            WaitStrategy::Response { timeout } => self.wait_for_response(frame, timeout)?,
            WaitStrategy::Delay(delay) => {
                let start = Instant::now();
                while start.elapsed() < delay {
                    std::hint::spin_loop();
                }
                self.file.read_exact(frame)?;
            }
        }
        log::trace!("{}: response {frame:02x?}", self.path.display());
        Ok(())
    }
}

/// An in-process transport that hands frames straight to a [`Service`].
///
/// Use it to run a client against the [simulator](crate::sim), or
/// against a `Dma` that's mapped into the same process.
#[derive(Debug)]
pub struct Loopback<S> {
    service: S,
}

impl<S: Service> Loopback<S> {
    pub fn new(service: S) -> Self {
        Loopback { service }
    }

    pub fn into_inner(self) -> S {
        self.service
    }
}

impl<S: Service> Transport for Loopback<S> {
    fn exchange(&mut self, frame: &mut [u8]) -> Result<()> {
        log::trace!("loopback: request {frame:02x?}");
        self.service.serve(frame)
    }
}
