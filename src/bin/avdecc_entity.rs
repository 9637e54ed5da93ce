//! AVDECC Entity Launcher
//!
//! Brings up an AVDECC entity on a raw Ethernet interface, publishes the
//! talker stream, and serves controllers until Ctrl+C.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avdecc_endpoint::{
    config::{load_descriptor_tree, EngineConfig},
    constants::CONNECTION_POLL_INTERVAL_MS,
    Avdecc, Eui64,
};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, source) = load_config()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting AVDECC entity ({})", source);

    let tree = load_descriptor_tree(&config.entity_file)
        .with_context(|| format!("loading descriptor tree {}", config.entity_file.display()))?;

    let avdecc = Avdecc::init_with_options(&tree, &config.interface, config.role, config.to_options())
        .with_context(|| format!("starting entity on {}", config.interface))?;
    let configuration = avdecc.get_current_configuration();

    let stream = config.stream.clone().unwrap_or_default();
    if config.role.is_talker() {
        let stream_id = Eui64::stream_id(avdecc.mac_address(), stream.unique_id);
        avdecc.set_talker_stream_info(configuration, stream.unique_id, stream_id, stream.dest_mac, stream.vlan_id)?;
    }

    avdecc.acmp_start();
    tracing::info!("Waiting for a controller to connect - press Ctrl+C to stop");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Ctrl+C handler failed: {}", e);
        }
    };
    serve_until(shutdown, Duration::from_millis(CONNECTION_POLL_INTERVAL_MS), || {
        connected_stream(&avdecc, &config, configuration, stream.unique_id)
    })
    .await;

    tracing::info!("Shutting down");
    tokio::task::spawn_blocking(move || avdecc.terminate()).await?;
    Ok(())
}

/// Poll for a connection every `interval` until one is reported, and return once `shutdown` resolves
async fn serve_until<S, P>(shutdown: S, interval: Duration, mut poll: P) -> Option<Eui64>
where
    S: Future<Output = ()>,
    P: FnMut() -> Option<Eui64>,
{
    let mut ticker = tokio::time::interval(interval);
    let mut connected = None;
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick(), if connected.is_none() => {
                if let Some(stream_id) = poll() {
                    tracing::info!("Stream connected, stream ID {}", stream_id);
                    connected = Some(stream_id);
                }
            }
        }
    }
    connected
}

/// Config file from argv[1], else the per-user file if present, else defaults
fn load_config() -> Result<(EngineConfig, String)> {
    if let Some(path) = std::env::args().nth(1).map(PathBuf::from) {
        let config = EngineConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
        return Ok((config, path.display().to_string()));
    }

    match EngineConfig::default_path() {
        Ok(path) if path.exists() => {
            let config = EngineConfig::load(&path).with_context(|| format!("loading {}", path.display()))?;
            Ok((config, path.display().to_string()))
        }
        _ => Ok((EngineConfig::default(), "built-in defaults".to_string())),
    }
}

/// Stream ID of the first established connection, if any
fn connected_stream(avdecc: &Avdecc, config: &EngineConfig, configuration: u16, unique_id: u16) -> Option<Eui64> {
    if config.role.is_talker() {
        match avdecc.get_connection_count(configuration, unique_id) {
            Ok(count) if count > 0 => {
                return Some(Eui64::stream_id(avdecc.mac_address(), unique_id));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("{}", e),
        }
    }
    if config.role.is_listener() {
        match avdecc.get_connected_from_listener_stream_info(configuration, unique_id) {
            Ok(true) => return avdecc.get_stream_id_from_listener_stream_info(configuration, unique_id).ok(),
            Ok(false) => {}
            Err(e) => tracing::debug!("{}", e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_serve_until_reports_once_and_stops_on_shutdown() {
        let (stop, stopped) = oneshot::channel::<()>();
        let mut stop = Some(stop);
        let mut polls = 0;

        let connected = serve_until(
            async {
                let _ = stopped.await;
            },
            Duration::from_millis(1),
            || {
                polls += 1;
                if polls < 3 {
                    return None;
                }
                if let Some(stop) = stop.take() {
                    let _ = stop.send(());
                }
                Some(Eui64(0x0102_0304_0506_0001))
            },
        )
        .await;

        assert_eq!(connected, Some(Eui64(0x0102_0304_0506_0001)));
        assert_eq!(polls, 3);
    }

    #[tokio::test]
    async fn test_serve_until_shutdown_before_connection() {
        let connected = serve_until(async {}, Duration::from_millis(1), || None).await;
        assert_eq!(connected, None);
    }
}
