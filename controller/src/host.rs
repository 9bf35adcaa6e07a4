use std::sync::Arc;

use anyhow::Context;
use growbox_common::{PinConfig, RuntimeConfig};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{controller::Controller, gpio::Gpio, store::ConfigStore};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = ConfigStore::new();
    let mut runtime = store.load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config from store: {err:#}");
        RuntimeConfig::default()
    });
    runtime.sanitize();
    runtime.validate().context("invalid pin assignment")?;

    let gpio = open_gpio(&runtime.pins)?;
    let mut controller =
        Controller::new(gpio, &runtime).context("failed to configure controller pins")?;

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    info!(
        "controller started (heat below {}C, light {}-{}h {})",
        runtime.temperature.threshold_c,
        runtime.light.window.on_hour,
        runtime.light.window.off_hour,
        runtime.light.timezone
    );
    controller.run(shutdown).await;
    Ok(())
}

#[cfg(feature = "rpi")]
fn open_gpio(_pins: &PinConfig) -> anyhow::Result<Gpio> {
    let gpio = crate::rpi::RppalGpio::new().context("failed to open gpio")?;
    Ok(Arc::new(gpio))
}

#[cfg(not(feature = "rpi"))]
fn open_gpio(pins: &PinConfig) -> anyhow::Result<Gpio> {
    use growbox_common::Level;

    let power_on = std::env::var("GROWBOX_SIM_POWER")
        .map(|value| !value.eq_ignore_ascii_case("off"))
        .unwrap_or(true);

    let gpio = crate::gpio::SimulatedGpio::new();
    gpio.set_input(pins.power_sense, Level::from(power_on));
    warn!(
        "built without the rpi feature, using simulated gpio (power {})",
        if power_on { "on" } else { "off" }
    );
    Ok(Arc::new(gpio))
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        shutdown.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(err) => {
            warn!("cannot listen for SIGTERM: {err}");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
