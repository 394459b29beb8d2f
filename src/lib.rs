//! Reading a USB weather station's memory-mapped records
//!
//! The station exposes its settings block and a circular log of 20-byte
//! weather entries through 32-byte memory reads. [`WeatherStation`] reads the
//! current entry, finds the entry logged about an hour earlier and reports the
//! rain that fell in between.
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod station;
pub mod transport;
pub mod utils;

pub use error::{QueryStep, Result, StationError};
pub use models::{LogGeometry, WeatherReport, WeatherSample, WindDirection};
pub use station::WeatherStation;
pub use transport::Transport;
