use time::{Duration, OffsetDateTime};

/// Rain counter resolution in millimetres per tick
pub const RAIN_MM_PER_TICK: f32 = 0.3;

const COMPASS_POINTS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];
const COMPASS_DEGREES: [u16; 16] = [
    0, 23, 45, 68, 90, 113, 135, 158, 180, 203, 225, 248, 270, 293, 315, 338,
];

/// 16-point wind direction as stored by the device
///
/// Indexes outside 0..=15 are treated as north.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindDirection(u8);

impl WindDirection {
    pub fn from_index(index: u8) -> Self {
        if (index as usize) < COMPASS_POINTS.len() {
            Self(index)
        } else {
            Self(0)
        }
    }

    pub fn index(&self) -> u8 {
        self.0
    }

    pub fn compass(&self) -> &'static str {
        COMPASS_POINTS[self.0 as usize]
    }

    pub fn degrees(&self) -> u16 {
        COMPASS_DEGREES[self.0 as usize]
    }
}

/// One decoded 20-byte weather entry
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSample {
    pub age_minutes: u8,
    pub inside_humidity: u8,
    pub inside_temperature: f32,
    pub outside_humidity: u8,
    pub outside_temperature: f32,
    pub air_pressure: f32,
    pub wind_speed: f32,
    pub wind_gust: f32,
    pub wind_direction: WindDirection,
    pub rain_ticks: u16,
    pub illumination: u32,
    pub uv_level: u8,
}

impl WeatherSample {
    /// Total rain since the counter was last reset
    pub fn rain_millimeter(&self) -> f32 {
        self.rain_ticks as f32 * RAIN_MM_PER_TICK
    }
}

/// Circular log position and shape, read fresh for every query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogGeometry {
    pub sample_period_minutes: u8,
    pub entry_count: u16,
    pub current_address: u16,
}

/// Current weather plus rain fallen during the last hour
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub age_minutes: u8,
    pub inside_humidity: u8,
    pub inside_temperature: f32,
    pub outside_humidity: u8,
    pub outside_temperature: f32,
    pub air_pressure: f32,
    pub wind_speed: f32,
    pub wind_gust: f32,
    pub wind_direction: WindDirection,
    pub rain_millimeter_1h: f32,
    pub illumination: u32,
    pub uv_level: u8,
    pub fetched_at: OffsetDateTime,
}

impl WeatherReport {
    pub fn new(
        current: WeatherSample,
        rain_millimeter_1h: f32,
        fetched_at: OffsetDateTime,
    ) -> Self {
        Self {
            age_minutes: current.age_minutes,
            inside_humidity: current.inside_humidity,
            inside_temperature: current.inside_temperature,
            outside_humidity: current.outside_humidity,
            outside_temperature: current.outside_temperature,
            air_pressure: current.air_pressure,
            wind_speed: current.wind_speed,
            wind_gust: current.wind_gust,
            wind_direction: current.wind_direction,
            rain_millimeter_1h,
            illumination: current.illumination,
            uv_level: current.uv_level,
            fetched_at,
        }
    }

    /// When the device logged the entry, derived from its age
    pub fn recorded_at(&self) -> OffsetDateTime {
        self.fetched_at - Duration::minutes(self.age_minutes as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wind_direction_out_of_range_is_north() {
        let dir = WindDirection::from_index(99);
        assert_eq!(dir, WindDirection::from_index(0));
        assert_eq!(dir.compass(), "N");
        assert_eq!(dir.degrees(), 0);
    }

    #[test]
    fn wind_direction_tables_line_up() {
        let dir = WindDirection::from_index(5);
        assert_eq!(dir.compass(), "ESE");
        assert_eq!(dir.degrees(), 113);
        let last = WindDirection::from_index(15);
        assert_eq!(last.compass(), "NNW");
        assert_eq!(last.degrees(), 338);
    }

    #[test]
    fn recorded_at_subtracts_age() {
        let fetched_at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let sample = WeatherSample {
            age_minutes: 7,
            inside_humidity: 40,
            inside_temperature: 21.5,
            outside_humidity: 80,
            outside_temperature: 3.2,
            air_pressure: 1013.2,
            wind_speed: 3.6,
            wind_gust: 7.2,
            wind_direction: WindDirection::from_index(2),
            rain_ticks: 10,
            illumination: 1200,
            uv_level: 1,
        };
        let report = WeatherReport::new(sample, 0.6, fetched_at);
        assert_eq!(
            report.recorded_at().unix_timestamp(),
            1_700_000_000 - 7 * 60
        );
        assert_eq!(report.rain_millimeter_1h, 0.6);
    }
}
