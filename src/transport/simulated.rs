/// In-process stand-in for a station, answering read commands from a memory image
use std::collections::VecDeque;
use std::io;

use log::debug;
use tokio::time::{sleep_until, Duration, Instant};

use crate::error::{Result, StationError};
use crate::station::protocol::{
    parse_read_command, COMMAND_SIZE, CURRENT_POSITION_ADDRESS, DEVICE_READ_SIZE,
    ENTRY_COUNT_ADDRESS, ENTRY_SIZE, PERIOD_ADDRESS,
};
use crate::transport::Transport;

const ADDRESS_SPACE: usize = u16::MAX as usize + 1;
const DEFAULT_REPORT_SIZE: usize = 8;

// Address of the first log entry in the demo image
const DEMO_LOG_START: u16 = 0x0100;

#[derive(Debug)]
pub struct SimulatedStation {
    memory: Vec<u8>,
    report_size: usize,
    // Each report becomes readable at its instant
    pending: VecDeque<(Instant, Vec<u8>)>,
    commands: Vec<[u8; COMMAND_SIZE]>,
    disconnect_after: Option<usize>,
    unplug_after: Option<usize>,
    command_error: Option<io::ErrorKind>,
    unanswered: usize,
    late: Option<(usize, Duration)>,
    closed: bool,
}

impl SimulatedStation {
    /// Memory shorter than the 16-bit address space is zero-padded
    pub fn new(mut memory: Vec<u8>) -> Self {
        memory.resize(ADDRESS_SPACE, 0);
        Self {
            memory,
            report_size: DEFAULT_REPORT_SIZE,
            pending: VecDeque::new(),
            commands: Vec::new(),
            disconnect_after: None,
            unplug_after: None,
            command_error: None,
            unanswered: 0,
            late: None,
            closed: false,
        }
    }

    /// A station with a one-day log sampled every 5 minutes and steady rain
    pub fn demo() -> Self {
        let mut station = Self::new(Vec::new());
        let period = 5u8;
        let entries = 288u16;
        station.write(PERIOD_ADDRESS, &[period]);
        station.write(ENTRY_COUNT_ADDRESS, &entries.to_le_bytes());

        let mut address = DEMO_LOG_START;
        for i in 0..entries {
            let temperature = 120u16 + (i % 40);
            let rain = 1000u16 + i / 3;
            let lux = 5000u32 + i as u32 * 10;
            let record = [
                (i % period as u16) as u8,
                45,
                215u16.to_le_bytes()[0],
                215u16.to_le_bytes()[1],
                78,
                temperature.to_le_bytes()[0],
                temperature.to_le_bytes()[1],
                10132u16.to_le_bytes()[0],
                10132u16.to_le_bytes()[1],
                (i % 30) as u8,
                (i % 30) as u8 + 12,
                0,
                (i % 16) as u8,
                rain.to_le_bytes()[0],
                rain.to_le_bytes()[1],
                0,
                lux.to_le_bytes()[0],
                lux.to_le_bytes()[1],
                lux.to_le_bytes()[2],
                (i % 8) as u8,
            ];
            station.write(address, &record);
            if i + 1 < entries {
                address += ENTRY_SIZE as u16;
            }
        }
        station.write(CURRENT_POSITION_ADDRESS, &address.to_le_bytes());
        station
    }

    /// Split responses into input reports of `size` bytes
    pub fn with_report_size(mut self, size: usize) -> Self {
        self.report_size = size.max(1);
        self
    }

    /// Accept `commands` commands, then behave like an unplugged device
    pub fn disconnect_after(mut self, commands: usize) -> Self {
        self.disconnect_after = Some(commands);
        self
    }

    /// Accept `commands` commands, then fail writes the way a removed hidraw node does
    pub fn unplug_after(mut self, commands: usize) -> Self {
        self.unplug_after = Some(commands);
        self
    }

    /// Reject every command with an I/O error of `kind`
    pub fn fail_commands_with(mut self, kind: io::ErrorKind) -> Self {
        self.command_error = Some(kind);
        self
    }

    /// Accept commands but never answer them
    pub fn silent(self) -> Self {
        self.silent_for(usize::MAX)
    }

    /// Leave the first `commands` commands unanswered
    pub fn silent_for(mut self, commands: usize) -> Self {
        self.unanswered = commands;
        self
    }

    /// Hold back the answers to the first `commands` commands by `delay`
    pub fn respond_late(mut self, commands: usize, delay: Duration) -> Self {
        self.late = Some((commands, delay));
        self
    }

    /// Overwrite memory starting at `address`, wrapping at the end of the address space
    pub fn write(&mut self, address: u16, bytes: &[u8]) {
        for (offset, byte) in bytes.iter().enumerate() {
            let index = (address as usize + offset) % ADDRESS_SPACE;
            self.memory[index] = *byte;
        }
    }

    /// Queue an input report the host did not ask for
    pub fn inject_report(&mut self, report: Vec<u8>) {
        self.pending.push_back((Instant::now(), report));
    }

    /// Every command received so far, in order
    pub fn commands(&self) -> &[[u8; COMMAND_SIZE]] {
        &self.commands
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn respond(&mut self, address: u16) {
        let ready_at = match self.late {
            Some((commands, delay)) if self.commands.len() <= commands => Instant::now() + delay,
            _ => Instant::now(),
        };
        let response: Vec<u8> = (0..DEVICE_READ_SIZE)
            .map(|offset| self.memory[(address as usize + offset) % ADDRESS_SPACE])
            .collect();
        for report in response.chunks(self.report_size) {
            self.pending.push_back((ready_at, report.to_vec()));
        }
    }
}

impl Transport for SimulatedStation {
    async fn send_command(&mut self, command: [u8; COMMAND_SIZE]) -> Result<()> {
        if let Some(kind) = self.command_error {
            return Err(StationError::Io(io::Error::from(kind)));
        }
        if let Some(limit) = self.unplug_after {
            if self.commands.len() >= limit {
                self.closed = true;
                return Err(StationError::Io(io::Error::from_raw_os_error(libc::ENODEV)));
            }
        }
        self.commands.push(command);
        if let Some(limit) = self.disconnect_after {
            if self.commands.len() > limit {
                self.closed = true;
            }
        }
        if self.closed || self.commands.len() <= self.unanswered {
            return Ok(());
        }
        match parse_read_command(&command) {
            Some(address) => self.respond(address),
            None => debug!("Simulated station ignoring command {:02x?}", command),
        }
        Ok(())
    }

    async fn next_report(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(&(ready_at, _)) = self.pending.front() {
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
            return Ok(self.pending.pop_front().map(|(_, report)| report));
        }
        if self.closed {
            return Ok(None);
        }
        // Nothing will ever arrive, like a device that stopped answering
        std::future::pending::<()>().await;
        Ok(None)
    }

    fn try_next_report(&mut self) -> Option<Vec<u8>> {
        match self.pending.front() {
            Some((ready_at, _)) if *ready_at <= Instant::now() => {
                self.pending.pop_front().map(|(_, report)| report)
            }
            _ => None,
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::protocol::read_command;

    #[tokio::test]
    async fn answers_read_commands_in_report_sized_pieces() {
        let mut station = SimulatedStation::new(vec![7; 64]).with_report_size(12);
        station.send_command(read_command(0)).await.unwrap();
        let sizes: Vec<usize> = std::iter::from_fn(|| station.try_next_report())
            .map(|r| r.len())
            .collect();
        assert_eq!(sizes, vec![12, 12, 8]);
    }

    #[tokio::test]
    async fn reads_wrap_at_end_of_address_space() {
        let mut station = SimulatedStation::new(Vec::new());
        station.write(0xFFFF, &[1, 2]);
        station.send_command(read_command(0xFFFF)).await.unwrap();
        let first = station.try_next_report().unwrap();
        assert_eq!(&first[..2], &[1, 2]);
    }

    #[test]
    fn demo_image_points_at_last_entry() {
        let station = SimulatedStation::demo();
        let position = u16::from_le_bytes([station.memory[30], station.memory[31]]);
        assert_eq!(position, DEMO_LOG_START + 287 * ENTRY_SIZE as u16);
        assert_eq!(station.memory[16], 5);
    }

    #[tokio::test]
    async fn silent_for_answers_later_commands() {
        let mut station = SimulatedStation::new(vec![3; 64]).silent_for(1);
        station.send_command(read_command(0)).await.unwrap();
        assert!(station.try_next_report().is_none());
        station.send_command(read_command(0)).await.unwrap();
        assert_eq!(station.try_next_report().unwrap(), vec![3; 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_answers_are_not_ready_early() {
        let mut station =
            SimulatedStation::new(vec![5; 64]).respond_late(1, Duration::from_millis(300));
        station.send_command(read_command(0)).await.unwrap();
        assert!(station.try_next_report().is_none());
        let start = Instant::now();
        let report = station.next_report().await.unwrap().unwrap();
        assert_eq!(report, vec![5; 8]);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn unplugged_station_rejects_commands() {
        let mut station = SimulatedStation::new(Vec::new()).unplug_after(0);
        let err = station.send_command(read_command(0)).await.unwrap_err();
        match err {
            StationError::Io(e) => assert_eq!(e.raw_os_error(), Some(libc::ENODEV)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(station.is_closed());
        assert!(station.commands().is_empty());
    }
}
