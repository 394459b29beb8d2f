/// Lookups in the station's circular history log
use crate::error::{Result, StationError};
use crate::station::protocol::{ENTRY_SIZE, MAX_ENTRY_COUNT};

const LOOKBACK_MINUTES: i64 = 60;
const LOG_SPAN: i64 = (MAX_ENTRY_COUNT * ENTRY_SIZE) as i64;

/// Number of entries to step back from the current one to reach `minutes` ago
///
/// The current entry has already been open for `last_age_minutes`. The result
/// is rounded to the nearest entry (halves round up) and never reaches past
/// the oldest logged entry.
pub fn entries_back(
    minutes: i64,
    sample_period_minutes: u8,
    entry_count: u16,
    last_age_minutes: u8,
) -> Result<u16> {
    if sample_period_minutes == 0 {
        return Err(StationError::InvalidPeriod(sample_period_minutes));
    }
    let period = sample_period_minutes as i64;
    let remaining = (minutes - last_age_minutes as i64).max(0);
    // round(remaining / period) without going through floats
    let steps = (2 * remaining + period) / (2 * period);
    let oldest = (entry_count as i64 - 1).max(0);
    Ok(steps.min(oldest) as u16)
}

/// Address of the entry closest to one hour before the current one
pub fn address_one_hour_ago(
    current_address: u16,
    sample_period_minutes: u8,
    entry_count: u16,
    last_age_minutes: u8,
) -> Result<u16> {
    let steps = entries_back(
        LOOKBACK_MINUTES,
        sample_period_minutes,
        entry_count,
        last_age_minutes,
    )?;
    Ok(step_back(current_address, steps))
}

/// Move `steps` entries back from `address`, wrapping around the log
pub fn step_back(address: u16, steps: u16) -> u16 {
    let mut candidate = address as i64 - steps as i64 * ENTRY_SIZE as i64;
    if candidate < 0 {
        candidate += LOG_SPAN;
    }
    candidate as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_below_zero() {
        // 12 steps of 20 bytes from address 10
        assert_eq!(entries_back(60, 5, 100, 0).unwrap(), 12);
        assert_eq!(address_one_hour_ago(10, 5, 100, 0).unwrap(), 65050);
    }

    #[test]
    fn short_log_clamps_to_oldest_entry() {
        assert_eq!(entries_back(60, 5, 5, 0).unwrap(), 4);
        assert_eq!(address_one_hour_ago(1000, 5, 5, 0).unwrap(), 1000 - 4 * 20);
    }

    #[test]
    fn no_wrap_inside_log() {
        assert_eq!(address_one_hour_ago(2000, 30, 3000, 0).unwrap(), 2000 - 2 * 20);
    }

    #[test]
    fn age_of_current_entry_shortens_lookback() {
        // (60 - 4) / 5 = 11.2 -> 11
        assert_eq!(entries_back(60, 5, 1000, 4).unwrap(), 11);
        // (60 - 2) / 5 = 11.6 -> 12
        assert_eq!(entries_back(60, 5, 1000, 2).unwrap(), 12);
        // (60 - 5) / 10 = 5.5 rounds up
        assert_eq!(entries_back(60, 10, 1000, 5).unwrap(), 6);
    }

    #[test]
    fn stale_current_entry_stays_put() {
        assert_eq!(entries_back(60, 5, 1000, 90).unwrap(), 0);
        assert_eq!(address_one_hour_ago(400, 5, 1000, 90).unwrap(), 400);
    }

    #[test]
    fn empty_log_stays_put() {
        assert_eq!(address_one_hour_ago(400, 5, 0, 0).unwrap(), 400);
    }

    #[test]
    fn zero_period_is_rejected() {
        assert!(matches!(
            address_one_hour_ago(10, 0, 100, 0),
            Err(StationError::InvalidPeriod(0))
        ));
    }

    #[test]
    fn result_stays_in_log_span() {
        for address in [0u16, 19, 20, 1199, 1200, 65279] {
            for period in [1u8, 5, 30, 255] {
                let past = address_one_hour_ago(address, period, u16::MAX, 0).unwrap();
                assert!((past as i64) < LOG_SPAN || past == address);
            }
        }
    }
}
