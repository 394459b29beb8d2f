/// Formatting helpers for logging weather data
use log::info;
use time::{format_description, OffsetDateTime};

use crate::models::{WeatherReport, WeatherSample};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]")
        .ok()
        .and_then(|format| dt.format(&format).ok())
        .unwrap_or_else(|| dt.to_string())
}

/// Log a full weather report, one value per line
pub fn log_report(report: &WeatherReport) {
    info!(
        "Weather at {} (entry {} min old):",
        format_datetime(&report.recorded_at()),
        report.age_minutes
    );
    info!("  Inside temperature: {:.1}°C", report.inside_temperature);
    info!("  Inside humidity: {}%", report.inside_humidity);
    info!("  Outside temperature: {:.1}°C", report.outside_temperature);
    info!("  Outside humidity: {}%", report.outside_humidity);
    info!("  Air pressure: {:.1} hPa", report.air_pressure);
    info!(
        "  Wind: {:.1} km/h, gusts {:.1} km/h from {} ({}°)",
        report.wind_speed,
        report.wind_gust,
        report.wind_direction.compass(),
        report.wind_direction.degrees()
    );
    info!("  Rain last hour: {:.1} mm", report.rain_millimeter_1h);
    info!("  Illumination: {} lux", report.illumination);
    info!("  UV level: {}", report.uv_level);
}

/// Log a current-only sample, reporting the total rain counter
pub fn log_sample(sample: &WeatherSample) {
    info!("Current weather (entry {} min old):", sample.age_minutes);
    info!(
        "  Inside: {:.1}°C, {}% / Outside: {:.1}°C, {}%",
        sample.inside_temperature,
        sample.inside_humidity,
        sample.outside_temperature,
        sample.outside_humidity
    );
    info!(
        "  Pressure: {:.1} hPa, wind {:.1} km/h ({:.1} gust) {}",
        sample.air_pressure,
        sample.wind_speed,
        sample.wind_gust,
        sample.wind_direction.compass()
    );
    info!(
        "  Rain total: {:.1} mm, illumination {} lux, UV {}",
        sample.rain_millimeter(),
        sample.illumination,
        sample.uv_level
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_day_first() {
        let dt = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        assert_eq!(format_datetime(&dt), "14.11.2023 - 22:13:20");
    }
}
