use futures_util::{pin_mut, StreamExt};
use log::{error, info, warn};

use ws_station::config::{DeviceSource, StationConfig};
use ws_station::monitor::{readings, MonitorOptions, Reading};
use ws_station::transport::{HidrawTransport, SimulatedStation};
use ws_station::utils::{log_report, log_sample};
use ws_station::{Transport, WeatherStation};

async fn main_loop<T: Transport>(
    station: &mut WeatherStation<T>,
    options: MonitorOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Polling weather station every {} seconds",
        options.interval.as_secs()
    );

    let polls = readings(station, options);
    pin_mut!(polls);

    while let Some(result) = polls.next().await {
        match result {
            Ok(Reading::Report(report)) => log_report(&report),
            Ok(Reading::Current(sample)) => log_sample(&sample),
            // Already logged per attempt; keep polling
            Err(e) => warn!("No data this interval: {}", e),
        }
    }

    Ok(())
}

async fn run<T: Transport>(
    transport: T,
    config: &StationConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut station = WeatherStation::open(transport, config.reader)?;

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        let _ = tx.send(());
    });

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(&mut station, MonitorOptions::from(config)) => {
            match result {
                Ok(_) => info!("Polling stopped"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    station.close().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match &config.device {
        DeviceSource::Hidraw(path) => {
            let transport = match HidrawTransport::open(path).await {
                Ok(transport) => transport,
                Err(e) => {
                    error!("Failed to open weather station: {}", e);
                    return Err(e.into());
                }
            };
            run(transport, &config).await
        }
        DeviceSource::Simulated => {
            info!("Using simulated weather station");
            run(SimulatedStation::demo(), &config).await
        }
    }
}
