use std::time::Duration;

use chrono_tz::Tz;
use growbox_common::{Level, RuntimeConfig, ServiceKind};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    gpio::{Gpio, HardwareError},
    sensor::TemperatureProbe,
    service::{Policy, RelayService},
    supervisor::Supervisor,
};

/// Samples the main power switch and starts or stops the services to match.
pub struct Controller {
    gpio: Gpio,
    main_indicator_pin: u8,
    power_pin: u8,
    poll_interval: Duration,
    supervisor: Supervisor,
    last_power: Option<Level>,
}

impl Controller {
    pub fn new(gpio: Gpio, config: &RuntimeConfig) -> Result<Self, HardwareError> {
        let pins = &config.pins;

        gpio.setup_output(pins.main_indicator, Level::High)?;
        gpio.setup_input(pins.power_sense)?;

        let light = RelayService::new(
            ServiceKind::Light,
            gpio.clone(),
            pins.light_relay,
            pins.light_indicator,
            Policy::Light {
                window: config.light.window,
                timezone: parse_timezone(&config.light.timezone),
            },
            Duration::from_secs(config.light.interval_secs),
        )?;
        let temperature = RelayService::new(
            ServiceKind::Temperature,
            gpio.clone(),
            pins.temperature_relay,
            pins.temperature_indicator,
            Policy::Temperature {
                probe: TemperatureProbe::from(&config.temperature.sensor),
                threshold_c: config.temperature.threshold_c,
            },
            Duration::from_secs(config.temperature.interval_secs),
        )?;

        Ok(Self {
            gpio,
            main_indicator_pin: pins.main_indicator,
            power_pin: pins.power_sense,
            poll_interval: Duration::from_millis(config.supervisor.poll_interval_ms),
            supervisor: Supervisor::new(
                vec![light, temperature],
                Duration::from_millis(config.supervisor.stop_grace_ms),
            ),
            last_power: None,
        })
    }

    #[cfg(test)]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub async fn poll_once(&mut self) -> Result<Level, HardwareError> {
        let power = self.gpio.read(self.power_pin)?;
        let edge = self.last_power != Some(power);
        if edge {
            info!("main power {}", if power.is_high() { "on" } else { "off" });
            self.last_power = Some(power);
        }

        if let Err(err) = self.gpio.write(self.main_indicator_pin, power) {
            warn!("main indicator write failed: {err}");
        }

        for kind in ServiceKind::ALL {
            match power {
                Level::High => {
                    self.supervisor.start(kind);
                }
                Level::Low => {
                    self.supervisor.stop(kind).await;
                }
            }

            if edge {
                let status = self.supervisor.status(kind);
                debug!(
                    "{} service {} after {} spawns",
                    status.kind.as_str(),
                    status.state.as_str(),
                    status.spawns
                );
            }
        }

        Ok(power)
    }

    pub async fn run(&mut self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    if let Err(err) = self.poll_once().await {
                        warn!("power switch poll failed: {err}");
                    }
                }
            }
        }

        info!("controller shutting down");
        self.supervisor.stop_all().await;
        if let Err(err) = self.gpio.write(self.main_indicator_pin, Level::Low) {
            warn!("main indicator write failed: {err}");
        }
    }
}

fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        warn!("unknown timezone {name:?}, using UTC");
        chrono_tz::UTC
    })
}
