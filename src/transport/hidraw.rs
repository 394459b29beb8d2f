/// Linux hidraw transport
///
/// Commands are written as output reports with a leading report id of 0. The
/// node is opened non-blocking and driven by the tokio reactor; closing the
/// transport releases it.
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::io::unix::AsyncFd;

use crate::error::{Result, StationError};
use crate::station::protocol::{COMMAND_SIZE, PRODUCT_ID, VENDOR_ID};
use crate::transport::{device_gone, Transport};

const INPUT_REPORT_SIZE: usize = 8;

pub struct HidrawTransport {
    path: PathBuf,
    device: Option<AsyncFd<File>>,
}

impl HidrawTransport {
    /// Open the hidraw node at `path`
    ///
    /// The node is not searched for; a missing or inaccessible node is
    /// reported as an unavailable transport.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    StationError::TransportUnavailable(format!("{}: {}", path.display(), e))
                }
                _ => StationError::Io(e),
            })?;

        check_device_identity(&path).await;

        let device = AsyncFd::new(file.into_std().await)?;

        info!("Opened weather station at {}", path.display());
        Ok(HidrawTransport {
            path,
            device: Some(device),
        })
    }

    fn device(&self) -> Result<&AsyncFd<File>> {
        self.device.as_ref().ok_or_else(|| {
            StationError::TransportUnavailable(format!("{} is closed", self.path.display()))
        })
    }
}

/// Warn when the node does not belong to the expected station model
async fn check_device_identity(path: &Path) {
    let Some(name) = path.file_name() else {
        return;
    };
    let uevent = Path::new("/sys/class/hidraw")
        .join(name)
        .join("device/uevent");
    let Ok(contents) = tokio::fs::read_to_string(&uevent).await else {
        debug!("No uevent information at {}", uevent.display());
        return;
    };
    match parse_hid_id(&contents) {
        Some((vendor, product)) if vendor == VENDOR_ID && product == PRODUCT_ID => {}
        Some((vendor, product)) => warn!(
            "{} is {:04x}:{:04x}, expected weather station {:04x}:{:04x}",
            path.display(),
            vendor,
            product,
            VENDOR_ID,
            PRODUCT_ID
        ),
        None => debug!("No HID_ID in {}", uevent.display()),
    }
}

/// Extract vendor and product from a `HID_ID=0003:00001941:00008021` line
fn parse_hid_id(uevent: &str) -> Option<(u16, u16)> {
    let value = uevent
        .lines()
        .find_map(|line| line.strip_prefix("HID_ID="))?;
    let mut parts = value.trim().split(':');
    let _bus = parts.next()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;
    Some((u16::try_from(vendor).ok()?, u16::try_from(product).ok()?))
}

fn read_report(mut file: &File) -> io::Result<Vec<u8>> {
    let mut buffer = [0u8; INPUT_REPORT_SIZE];
    let n = file.read(&mut buffer)?;
    Ok(buffer[..n].to_vec())
}

impl Transport for HidrawTransport {
    async fn send_command(&mut self, command: [u8; COMMAND_SIZE]) -> Result<()> {
        let device = self.device()?;
        let mut report = [0u8; COMMAND_SIZE + 1];
        report[1..].copy_from_slice(&command);

        loop {
            let mut guard = device.writable().await?;
            match guard.try_io(|inner| {
                let mut file = inner.get_ref();
                file.write(&report)
            }) {
                Ok(Ok(n)) if n == report.len() => return Ok(()),
                Ok(Ok(n)) => {
                    return Err(StationError::Io(io::Error::new(
                        ErrorKind::WriteZero,
                        format!("short report write, {} of {} bytes", n, report.len()),
                    )))
                }
                Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(StationError::Io(e)),
                Err(_would_block) => continue,
            }
        }
    }

    async fn next_report(&mut self) -> Result<Option<Vec<u8>>> {
        let device = self.device()?;
        loop {
            let mut guard = device.readable().await?;
            match guard.try_io(|inner| read_report(inner.get_ref())) {
                Ok(Ok(report)) if report.is_empty() => return Ok(None),
                Ok(Ok(report)) => return Ok(Some(report)),
                Ok(Err(e)) if e.kind() == ErrorKind::Interrupted => continue,
                Ok(Err(e)) if device_gone(&e) => {
                    debug!("{} went away: {}", self.path.display(), e);
                    return Ok(None);
                }
                Ok(Err(e)) => return Err(StationError::Io(e)),
                Err(_would_block) => continue,
            }
        }
    }

    fn try_next_report(&mut self) -> Option<Vec<u8>> {
        let device = self.device.as_ref()?;
        match read_report(device.get_ref()) {
            Ok(report) if !report.is_empty() => Some(report),
            Ok(_) => None,
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                debug!("Polling {} for stale reports failed: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.device.take().is_some() {
            info!("Closed weather station at {}", self.path.display());
        }
        Ok(())
    }
}
