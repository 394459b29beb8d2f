//! Report transport between the host and the station
//!
//! The station speaks in 8-byte output reports (commands) and answers with a
//! stream of input reports whose boundaries carry no meaning. Only one command
//! may be outstanding at a time.

use std::future::Future;
use std::io;

use log::{debug, warn};

use crate::error::{Result, StationError};
use crate::station::protocol::COMMAND_SIZE;

pub mod hidraw;
pub mod simulated;

pub use hidraw::HidrawTransport;
pub use simulated::SimulatedStation;

pub trait Transport: Send {
    /// Send one command report to the device
    fn send_command(
        &mut self,
        command: [u8; COMMAND_SIZE],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Wait for the next input report, `None` once the device is gone
    fn next_report(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Take an input report that already arrived without waiting
    fn try_next_report(&mut self) -> Option<Vec<u8>>;

    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Send `command` and collect exactly `expected` response bytes
///
/// Reports left over from an earlier, abandoned request are discarded first so
/// the collected bytes always answer this command. Bytes beyond `expected` in
/// the final report are dropped.
pub async fn request<T: Transport>(
    transport: &mut T,
    address: u16,
    command: [u8; COMMAND_SIZE],
    expected: usize,
) -> Result<Vec<u8>> {
    let mut stale = 0;
    while let Some(report) = transport.try_next_report() {
        stale += report.len();
    }
    if stale > 0 {
        warn!("Discarded {} stale bytes before reading {:#06x}", stale, address);
    }

    match transport.send_command(command).await {
        Ok(()) => {}
        Err(StationError::Io(e)) if device_gone(&e) => {
            debug!("Command for {:#06x} not delivered: {}", address, e);
            return Err(StationError::TransportClosed { address });
        }
        Err(e) => return Err(e),
    }

    let mut buffer = Vec::with_capacity(expected);
    while buffer.len() < expected {
        match transport.next_report().await? {
            Some(report) => {
                let wanted = expected - buffer.len();
                buffer.extend(report.into_iter().take(wanted));
            }
            None => return Err(StationError::TransportClosed { address }),
        }
    }
    Ok(buffer)
}

/// Whether an I/O error means the device was unplugged
///
/// Linux reports a removed hidraw device as `ENODEV` on write and `EIO` on
/// read.
pub(crate) fn device_gone(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::BrokenPipe {
        return true;
    }
    matches!(
        err.raw_os_error(),
        Some(libc::ENODEV) | Some(libc::EPIPE) | Some(libc::EIO) | Some(libc::ESHUTDOWN)
    )
}
