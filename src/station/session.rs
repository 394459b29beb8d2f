/// The weather query built on top of raw memory reads
use log::debug;
use time::OffsetDateTime;

use crate::error::{QueryStep, Result};
use crate::models::{LogGeometry, WeatherReport, WeatherSample, RAIN_MM_PER_TICK};
use crate::station::decoder::decode_weather_record;
use crate::station::history::address_one_hour_ago;
use crate::station::protocol::{
    CURRENT_POSITION_ADDRESS, ENTRY_COUNT_ADDRESS, ENTRY_SIZE, FIXED_BLOCK_ADDRESS,
    FIXED_BLOCK_SIZE, PERIOD_ADDRESS,
};
use crate::station::reader::{MemoryReader, ReaderConfig};
use crate::transport::Transport;

/// An open connection to one weather station
///
/// Every query reads the log geometry again, since the device keeps logging
/// while we are connected. Nothing is cached between queries.
pub struct WeatherStation<T> {
    reader: MemoryReader<T>,
}

impl<T: Transport> WeatherStation<T> {
    pub fn open(transport: T, config: ReaderConfig) -> Result<Self> {
        Ok(Self {
            reader: MemoryReader::new(transport, config)?,
        })
    }

    pub fn transport(&self) -> &T {
        self.reader.transport()
    }

    /// Current weather plus rain fallen during the last hour
    ///
    /// Reads, in order: sample period, entry count, current position, the
    /// current entry and the entry about an hour before it. Any failure aborts
    /// the whole query and names the step that failed.
    pub async fn current_report(&mut self) -> Result<WeatherReport> {
        let geometry = self.read_geometry().await?;
        let current = self
            .read_record(geometry.current_address)
            .await
            .map_err(|e| e.at_step(QueryStep::CurrentRecord))?;

        let past_address = address_one_hour_ago(
            geometry.current_address,
            geometry.sample_period_minutes,
            geometry.entry_count,
            current.age_minutes,
        )
        .map_err(|e| e.at_step(QueryStep::SamplePeriod))?;
        let past = self
            .read_record(past_address)
            .await
            .map_err(|e| e.at_step(QueryStep::PastRecord))?;

        debug!(
            "Rain counter {} at {:#06x}, {} at {:#06x}",
            current.rain_ticks, geometry.current_address, past.rain_ticks, past_address
        );
        let rain = rain_delta(current.rain_ticks, past.rain_ticks);
        Ok(WeatherReport::new(current, rain, OffsetDateTime::now_utc()))
    }

    /// The current entry alone, without the hourly rain lookup
    pub async fn current_sample(&mut self) -> Result<WeatherSample> {
        let address = self
            .reader
            .read_u16(CURRENT_POSITION_ADDRESS)
            .await
            .map_err(|e| e.at_first_step(QueryStep::CurrentAddress))?;
        self.read_record(address)
            .await
            .map_err(|e| e.at_step(QueryStep::CurrentRecord))
    }

    pub async fn read_geometry(&mut self) -> Result<LogGeometry> {
        let sample_period_minutes = self
            .reader
            .read_u8(PERIOD_ADDRESS)
            .await
            .map_err(|e| e.at_first_step(QueryStep::SamplePeriod))?;
        let entry_count = self
            .reader
            .read_u16(ENTRY_COUNT_ADDRESS)
            .await
            .map_err(|e| e.at_step(QueryStep::EntryCount))?;
        let current_address = self
            .reader
            .read_u16(CURRENT_POSITION_ADDRESS)
            .await
            .map_err(|e| e.at_step(QueryStep::CurrentAddress))?;

        let geometry = LogGeometry {
            sample_period_minutes,
            entry_count,
            current_address,
        };
        debug!("Log geometry: {:?}", geometry);
        Ok(geometry)
    }

    pub async fn read_record(&mut self, address: u16) -> Result<WeatherSample> {
        let data = self.reader.read_range(address, ENTRY_SIZE).await?;
        decode_weather_record(&data)
    }

    /// The 256-byte settings block at the start of memory
    pub async fn read_fixed_block(&mut self) -> Result<Vec<u8>> {
        self.reader
            .read_range(FIXED_BLOCK_ADDRESS, FIXED_BLOCK_SIZE)
            .await
    }

    pub async fn close(mut self) -> Result<T> {
        self.reader.close().await?;
        Ok(self.reader.into_transport())
    }
}

/// Millimetres of rain between two counter readings
///
/// A counter that wrapped or was reset between the readings gives a
/// negative value, which is passed through unchanged.
pub fn rain_delta(current_ticks: u16, past_ticks: u16) -> f32 {
    (current_ticks as i32 - past_ticks as i32) as f32 * RAIN_MM_PER_TICK
}
