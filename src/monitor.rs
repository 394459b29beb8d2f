/// Periodic polling of a weather station
use futures_util::stream::{self, Stream};
use log::error;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use crate::config::StationConfig;
use crate::error::{Result, StationError};
use crate::models::{WeatherReport, WeatherSample};
use crate::station::WeatherStation;
use crate::transport::Transport;

const WAIT_BETWEEN_RETRIES: Duration = Duration::from_secs(2);

/// Outcome of one successful poll
#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Report(WeatherReport),
    Current(WeatherSample),
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorOptions {
    pub interval: Duration,
    pub max_attempts: u32,
    pub retry_wait: Duration,
    pub rain_1h: bool,
}

impl From<&StationConfig> for MonitorOptions {
    fn from(config: &StationConfig) -> Self {
        Self {
            interval: config.refresh_interval,
            max_attempts: config.max_attempts,
            retry_wait: WAIT_BETWEEN_RETRIES,
            rain_1h: config.rain_1h,
        }
    }
}

/// Run one query, starting it over from scratch on failure
///
/// The station's log may advance between attempts, so a failed query is
/// never resumed half way; each attempt re-reads everything.
pub async fn query_with_retry<T: Transport>(
    station: &mut WeatherStation<T>,
    options: &MonitorOptions,
) -> Result<Reading> {
    let mut last_error = None;

    for attempt in 0..options.max_attempts {
        let result = if options.rain_1h {
            station.current_report().await.map(Reading::Report)
        } else {
            station.current_sample().await.map(Reading::Current)
        };

        match result {
            Ok(reading) => return Ok(reading),
            Err(e) => {
                error!("Attempt {}: {}", attempt + 1, e);
                last_error = Some(e);
            }
        }

        if attempt + 1 < options.max_attempts {
            sleep(options.retry_wait).await;
        }
    }

    Err(last_error.unwrap_or_else(|| {
        StationError::InvalidConfig("max attempts must be at least 1".into())
    }))
}

/// Poll the station every `options.interval`, first poll immediately
///
/// The stream never ends on its own; failed polls are yielded as errors and
/// polling continues.
pub fn readings<'a, T: Transport + 'a>(
    station: &'a mut WeatherStation<T>,
    options: MonitorOptions,
) -> impl Stream<Item = Result<Reading>> + 'a {
    let mut ticker = interval(options.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    stream::unfold((station, ticker), move |(station, mut ticker)| async move {
        ticker.tick().await;
        let reading = query_with_retry(station, &options).await;
        Some((reading, (station, ticker)))
    })
}
