//! Console monitor for a WiFi lap timer
//!
//! Usage:
//!   cargo run --example console_monitor -- http://192.168.4.1/
//!   cargo run --example console_monitor -- --config timer.yaml
//!
//! Set `RUST_LOG=lapsync=debug` to see connection details.

use anyhow::Context;
use futures::StreamExt;
use lapsync::{
    ClientConfig, ConnectionState, ModelChange, Notification, RaceClient, UpdateRate,
    format_lap_time,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lapsync=info".into()))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match args.as_slice() {
        [flag, path] if flag == "--config" => {
            ClientConfig::from_path(path).with_context(|| format!("loading {}", path))?
        }
        [origin] => ClientConfig::for_origin(origin).context("deriving socket URL")?,
        [] => ClientConfig::default(),
        _ => anyhow::bail!("usage: console_monitor [ORIGIN | --config FILE]"),
    };

    println!("Connecting to {}", config.endpoint);
    let client = RaceClient::connect(&config)?;

    // Status arrives many times a second; a console only needs a few
    let status_client = client.clone();
    tokio::spawn(async move {
        let mut statuses = status_client.status_updates(UpdateRate::Max(2));
        while let Some(status) = statuses.next().await {
            println!(
                "RSSI {:>3} peak {:>3} [{:<20}]{}",
                status.current_rssi,
                status.peak_rssi,
                "#".repeat((status.rssi_fraction() * 20.0) as usize),
                if status.crossing { " CROSSING" } else { "" }
            );
        }
    });

    let mut notifications = Box::pin(client.notifications());
    while let Some(notification) = notifications.next().await {
        match notification {
            Notification::Connection { state: ConnectionState::Open, session } => {
                println!("Connected (session {:?})", session.map(|id| id.to_string()));
            }
            Notification::Connection { state: ConnectionState::Connecting, .. } => {
                println!("Connecting...");
            }
            Notification::Connection { state: ConnectionState::Closed, .. } => break,
            Notification::Model(ModelChange::Laps) => {
                let model = client.model();
                match model.rows_newest_first().next() {
                    Some(row) => println!(
                        "Lap {:>3}  {}{}",
                        row.number,
                        row.lap.display_time().unwrap_or_else(|| "--:--".to_string()),
                        if row.is_best { "  best" } else { "" }
                    ),
                    None => println!("No laps recorded yet"),
                }
                if let Some((index, best)) = model.best_lap() {
                    println!("Best lap {} in {}", index + 1, format_lap_time(best.lap_time_ms));
                }
            }
            Notification::Model(ModelChange::RaceState) => {
                let active = client.model().race_active();
                println!("Race {}", if active { "started" } else { "stopped" });
            }
            Notification::Model(ModelChange::Status) => {}
        }
    }

    Ok(())
}
