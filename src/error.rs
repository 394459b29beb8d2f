/// Error taxonomy for talking to the weather station
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Step of the composite weather query that was running when it failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStep {
    SamplePeriod,
    EntryCount,
    CurrentAddress,
    CurrentRecord,
    PastRecord,
}

impl fmt::Display for QueryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SamplePeriod => "reading sample period",
            Self::EntryCount => "reading entry count",
            Self::CurrentAddress => "reading current position",
            Self::CurrentRecord => "reading current record",
            Self::PastRecord => "reading record from one hour ago",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("No complete response for address {address:#06x} within {waited:?}")]
    TransportTimeout { address: u16, waited: Duration },

    #[error("Transport closed while reading address {address:#06x}")]
    TransportClosed { address: u16 },

    #[error("Transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Weather record must be at least {expected} bytes, got {actual}")]
    InvalidRecordLength { expected: usize, actual: usize },

    #[error("Sample period must be greater than zero, device reported {0}")]
    InvalidPeriod(u8),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Device disconnected while {step}")]
    DeviceDisconnectedMidSession { step: QueryStep },

    #[error("Weather query failed while {step}: {source}")]
    QueryFailed {
        step: QueryStep,
        #[source]
        source: Box<StationError>,
    },
}

impl StationError {
    /// Attach a step that follows earlier reads of the same query
    ///
    /// A closed transport here means the device went away between reads,
    /// which is reported as its own variant.
    pub(crate) fn at_step(self, step: QueryStep) -> Self {
        match self {
            Self::TransportClosed { .. } => Self::DeviceDisconnectedMidSession { step },
            other => other.at_first_step(step),
        }
    }

    /// Attach the step that opens a query
    pub(crate) fn at_first_step(self, step: QueryStep) -> Self {
        Self::QueryFailed {
            step,
            source: Box::new(self),
        }
    }

    /// The failed facade step, if the error came out of a composite query
    pub fn step(&self) -> Option<QueryStep> {
        match self {
            Self::DeviceDisconnectedMidSession { step } | Self::QueryFailed { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, StationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_transport_on_first_step_stays_a_query_failure() {
        let err =
            StationError::TransportClosed { address: 16 }.at_first_step(QueryStep::SamplePeriod);
        match err {
            StationError::QueryFailed { step, source } => {
                assert_eq!(step, QueryStep::SamplePeriod);
                assert!(matches!(*source, StationError::TransportClosed { address: 16 }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn closed_transport_later_is_a_mid_session_disconnect() {
        let err = StationError::TransportClosed { address: 30 }.at_step(QueryStep::CurrentAddress);
        assert!(matches!(
            err,
            StationError::DeviceDisconnectedMidSession {
                step: QueryStep::CurrentAddress
            }
        ));
        assert_eq!(err.step(), Some(QueryStep::CurrentAddress));
    }

    #[test]
    fn any_step_can_open_a_query() {
        let err =
            StationError::TransportClosed { address: 30 }.at_first_step(QueryStep::CurrentAddress);
        match err {
            StationError::QueryFailed { step, source } => {
                assert_eq!(step, QueryStep::CurrentAddress);
                assert!(matches!(*source, StationError::TransportClosed { address: 30 }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn message_names_the_failed_step() {
        let err = StationError::TransportTimeout {
            address: 0x1234,
            waited: Duration::from_millis(500),
        }
        .at_step(QueryStep::PastRecord);
        assert_eq!(
            err.to_string(),
            "Weather query failed while reading record from one hour ago: \
             No complete response for address 0x1234 within 500ms"
        );
    }
}
