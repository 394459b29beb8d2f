use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use log::info;
use tokio::time::Duration;

use crate::error::{Result, StationError};
use crate::station::reader::{ReaderConfig, CHUNK_SIZE, DEFAULT_READ_TIMEOUT};

const DEFAULT_REFRESH_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Where the station is attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSource {
    Hidraw(PathBuf),
    Simulated,
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub device: DeviceSource,
    pub reader: ReaderConfig,
    pub refresh_interval: Duration,
    pub max_attempts: u32,
    pub rain_1h: bool,
}

impl StationConfig {
    pub fn new() -> Result<Self> {
        // Load environment variables
        dotenv::dotenv().ok();
        let config = Self::from_lookup(|key| env::var(key).ok())?;
        info!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let simulate = parse_or(&lookup, "WEATHER_STATION_SIMULATE", false, parse_bool)?;
        let device = if simulate {
            DeviceSource::Simulated
        } else {
            let path = lookup("WEATHER_STATION_DEVICE")
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .ok_or_else(|| {
                    StationError::InvalidConfig(
                        "WEATHER_STATION_DEVICE environment variable not set".into(),
                    )
                })?;
            DeviceSource::Hidraw(PathBuf::from(path))
        };

        let chunk_size = parse_or(
            &lookup,
            "WEATHER_STATION_CHUNK_SIZE",
            CHUNK_SIZE,
            parse_number,
        )?;
        let timeout_ms = parse_or(
            &lookup,
            "WEATHER_STATION_READ_TIMEOUT_MS",
            DEFAULT_READ_TIMEOUT.as_millis() as u64,
            parse_number,
        )?;
        let reader = ReaderConfig {
            chunk_size,
            read_timeout: Duration::from_millis(timeout_ms),
        };
        reader.validate()?;

        let refresh_secs = parse_or(
            &lookup,
            "WEATHER_STATION_REFRESH_SECS",
            DEFAULT_REFRESH_SECS,
            parse_number,
        )?;
        if refresh_secs == 0 {
            return Err(StationError::InvalidConfig(
                "WEATHER_STATION_REFRESH_SECS must be greater than zero".into(),
            ));
        }

        let max_attempts = parse_or(
            &lookup,
            "WEATHER_STATION_MAX_ATTEMPTS",
            DEFAULT_MAX_ATTEMPTS,
            parse_number,
        )?;
        if max_attempts == 0 {
            return Err(StationError::InvalidConfig(
                "WEATHER_STATION_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        let rain_1h = parse_or(&lookup, "WEATHER_STATION_RAIN_1H", true, parse_bool)?;

        Ok(StationConfig {
            device,
            reader,
            refresh_interval: Duration::from_secs(refresh_secs),
            max_attempts,
            rain_1h,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    key: &str,
    default: T,
    parse: fn(&str) -> Option<T>,
) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).ok_or_else(|| {
            StationError::InvalidConfig(format!("{}: invalid value '{}'", key, raw))
        }),
    }
}

fn parse_number<T: FromStr>(raw: &str) -> Option<T> {
    raw.parse().ok()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
