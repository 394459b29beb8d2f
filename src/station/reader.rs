/// Chunked reads over the station's 16-bit address space
use log::{debug, warn};
use tokio::time::{timeout, Duration};

use crate::error::{Result, StationError};
use crate::station::protocol::{read_command, DEVICE_READ_SIZE};
use crate::transport::{self, Transport};

/// Largest useful prefix of one device read
pub const CHUNK_SIZE: usize = DEVICE_READ_SIZE;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    pub chunk_size: usize,
    pub read_timeout: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > DEVICE_READ_SIZE {
            return Err(StationError::InvalidConfig(format!(
                "chunk size must be between 1 and {}, got {}",
                DEVICE_READ_SIZE, self.chunk_size
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(StationError::InvalidConfig(
                "read timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Issues one read command at a time and stitches the answers together
pub struct MemoryReader<T> {
    transport: T,
    config: ReaderConfig,
}

impl<T: Transport> MemoryReader<T> {
    pub fn new(transport: T, config: ReaderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { transport, config })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Read `size` bytes starting at `address`, in increasing address order
    ///
    /// Addresses wrap at the end of the 16-bit space. A chunk that does not
    /// complete within the read timeout fails the whole read.
    pub async fn read_range(&mut self, address: u16, size: usize) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(size);
        while data.len() < size {
            let chunk_address = address.wrapping_add(data.len() as u16);
            let chunk_size = (size - data.len()).min(self.config.chunk_size);
            let chunk = self.read_chunk(chunk_address, chunk_size).await?;
            data.extend_from_slice(&chunk);
        }
        Ok(data)
    }

    async fn read_chunk(&mut self, address: u16, size: usize) -> Result<Vec<u8>> {
        debug!("Reading {} bytes at {:#06x}", size, address);
        let waited = self.config.read_timeout;
        let request = transport::request(
            &mut self.transport,
            address,
            read_command(address),
            DEVICE_READ_SIZE,
        );
        let mut response = match timeout(waited, request).await {
            Ok(response) => response?,
            Err(_) => {
                self.discard_late_response(address).await;
                return Err(StationError::TransportTimeout { address, waited });
            }
        };
        response.truncate(size);
        Ok(response)
    }

    /// Swallow whatever is still on its way for a command that timed out
    ///
    /// Stops after a full response's worth of bytes, or once the device has
    /// been quiet for one read timeout.
    async fn discard_late_response(&mut self, address: u16) {
        let quiet = self.config.read_timeout;
        let mut discarded = 0;
        while discarded < DEVICE_READ_SIZE {
            match timeout(quiet, self.transport.next_report()).await {
                Ok(Ok(Some(report))) => discarded += report.len(),
                _ => break,
            }
        }
        if discarded > 0 {
            warn!(
                "Discarded {} late bytes for timed out read at {:#06x}",
                discarded, address
            );
        }
    }

    pub async fn read_u8(&mut self, address: u16) -> Result<u8> {
        Ok(self.read_range(address, 1).await?[0])
    }

    /// Little-endian 16-bit value at `address`
    pub async fn read_u16(&mut self, address: u16) -> Result<u16> {
        let bytes = self.read_range(address, 2).await?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::protocol::parse_read_command;
    use crate::transport::SimulatedStation;

    fn patterned_memory() -> Vec<u8> {
        (0..=u16::MAX).map(|i| (i as u8) ^ ((i >> 8) as u8)).collect()
    }

    #[tokio::test]
    async fn full_block_takes_eight_ordered_chunks() {
        let memory = patterned_memory();
        let station = SimulatedStation::new(memory.clone()).with_report_size(8);
        let mut reader = MemoryReader::new(station, ReaderConfig::default()).unwrap();

        let data = reader.read_range(0, 256).await.unwrap();

        assert_eq!(data, memory[..256]);
        let addresses: Vec<u16> = reader
            .transport()
            .commands()
            .iter()
            .map(|c| parse_read_command(c).unwrap())
            .collect();
        assert_eq!(addresses, (0..8).map(|i| i * 32).collect::<Vec<u16>>());
    }

    #[tokio::test]
    async fn short_read_uses_one_command_and_keeps_prefix() {
        let memory = patterned_memory();
        let mut reader =
            MemoryReader::new(SimulatedStation::new(memory.clone()), ReaderConfig::default())
                .unwrap();
        let data = reader.read_range(0x0123, 20).await.unwrap();
        assert_eq!(data, memory[0x0123..0x0137]);
        assert_eq!(reader.transport().commands().len(), 1);
    }

    #[tokio::test]
    async fn odd_size_gets_exactly_what_was_asked() {
        let memory = patterned_memory();
        let mut reader =
            MemoryReader::new(SimulatedStation::new(memory.clone()), ReaderConfig::default())
                .unwrap();
        let data = reader.read_range(0x200, 40).await.unwrap();
        assert_eq!(data.len(), 40);
        assert_eq!(data, memory[0x200..0x228]);
        let addresses: Vec<u16> = reader
            .transport()
            .commands()
            .iter()
            .map(|c| parse_read_command(c).unwrap())
            .collect();
        assert_eq!(addresses, vec![0x200, 0x220]);
    }

    #[tokio::test]
    async fn smaller_chunk_size_splits_further() {
        let memory = patterned_memory();
        let config = ReaderConfig {
            chunk_size: 16,
            ..ReaderConfig::default()
        };
        let mut reader = MemoryReader::new(SimulatedStation::new(memory.clone()), config).unwrap();
        let data = reader.read_range(0x40, 64).await.unwrap();
        assert_eq!(data, memory[0x40..0x80]);
        assert_eq!(reader.transport().commands().len(), 4);
    }

    #[tokio::test]
    async fn range_wraps_past_end_of_memory() {
        let mut station = SimulatedStation::new(Vec::new());
        station.write(0xFFF0, &[0xAB; 16]);
        station.write(0x0000, &[0xCD; 16]);
        let config = ReaderConfig {
            chunk_size: 16,
            ..ReaderConfig::default()
        };
        let mut reader = MemoryReader::new(station, config).unwrap();
        let data = reader.read_range(0xFFF0, 32).await.unwrap();
        assert_eq!(&data[..16], &[0xAB; 16]);
        assert_eq!(&data[16..], &[0xCD; 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out() {
        let mut reader =
            MemoryReader::new(SimulatedStation::new(Vec::new()).silent(), ReaderConfig::default())
                .unwrap();
        let err = reader.read_range(0x10, 1).await.unwrap_err();
        match err {
            StationError::TransportTimeout { address, waited } => {
                assert_eq!(address, 0x10);
                assert_eq!(waited, DEFAULT_READ_TIMEOUT);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_does_not_leak_into_next_read() {
        let memory = patterned_memory();
        let station = SimulatedStation::new(memory.clone())
            .respond_late(1, DEFAULT_READ_TIMEOUT + Duration::from_millis(400));
        let mut reader = MemoryReader::new(station, ReaderConfig::default()).unwrap();

        let err = reader.read_range(0x10, 1).await.unwrap_err();
        assert!(matches!(err, StationError::TransportTimeout { address: 0x10, .. }));

        let data = reader.read_range(0x0480, 4).await.unwrap();
        assert_eq!(data, memory[0x0480..0x0484]);
    }

    #[tokio::test]
    async fn disconnect_mid_range_is_not_a_short_read() {
        let station = SimulatedStation::new(Vec::new()).disconnect_after(2);
        let mut reader = MemoryReader::new(station, ReaderConfig::default()).unwrap();
        let err = reader.read_range(0, 128).await.unwrap_err();
        assert!(matches!(err, StationError::TransportClosed { address: 0x40 }));
    }

    #[test]
    fn rejects_oversized_chunks() {
        let config = ReaderConfig {
            chunk_size: 33,
            ..ReaderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(StationError::InvalidConfig(_))
        ));
    }
}
