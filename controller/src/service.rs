use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use growbox_common::{
    daylight_decision, heating_decision, DaylightWindow, Level, ServiceKind, Switch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    gpio::{Gpio, HardwareError},
    sensor::TemperatureProbe,
};

#[derive(Debug, Clone)]
pub enum Policy {
    Temperature {
        probe: TemperatureProbe,
        threshold_c: f32,
    },
    Light {
        window: DaylightWindow,
        timezone: Tz,
    },
}

impl Policy {
    pub async fn decide(&self) -> Switch {
        match self {
            Self::Temperature { probe, threshold_c } => {
                let reading = probe.read().await;
                debug!("temperature reading {reading:?} against threshold {threshold_c}C");
                heating_decision(reading, *threshold_c)
            }
            Self::Light { window, timezone } => {
                daylight_decision(local_hour(Utc::now(), timezone), window)
            }
        }
    }
}

fn local_hour(now: DateTime<Utc>, timezone: &Tz) -> u32 {
    now.with_timezone(timezone).hour()
}

/// A relay plus its status indicator, driven by one policy.
pub struct RelayService {
    kind: ServiceKind,
    gpio: Gpio,
    relay_pin: u8,
    indicator_pin: u8,
    policy: Policy,
    interval: Duration,
}

impl RelayService {
    pub fn new(
        kind: ServiceKind,
        gpio: Gpio,
        relay_pin: u8,
        indicator_pin: u8,
        policy: Policy,
        interval: Duration,
    ) -> Result<Self, HardwareError> {
        gpio.setup_output(relay_pin, Level::Low)?;
        gpio.setup_output(indicator_pin, Level::Low)?;

        Ok(Self {
            kind,
            gpio,
            relay_pin,
            indicator_pin,
            policy,
            interval,
        })
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn enable(&self) -> Result<(), HardwareError> {
        self.drive(Level::High)
    }

    pub fn disable(&self) -> Result<(), HardwareError> {
        self.drive(Level::Low)
    }

    pub fn power_on_indicator(&self) -> Result<(), HardwareError> {
        self.gpio.write(self.indicator_pin, Level::High)
    }

    pub fn power_off_indicator(&self) -> Result<(), HardwareError> {
        self.gpio.write(self.indicator_pin, Level::Low)
    }

    pub fn apply(&self, decision: Switch) -> Result<(), HardwareError> {
        match decision {
            Switch::On => self.enable(),
            Switch::Off => self.disable(),
        }
    }

    /// Evaluates the policy every interval until `cancel` fires. Returns
    /// early only when the GPIO backend fails.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), HardwareError> {
        info!("{} service started", self.kind.as_str());

        loop {
            let decision = self.policy.decide().await;
            debug!("{} policy decided {}", self.kind.as_str(), decision.as_str());
            self.apply(decision)?;

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("{} service cancelled", self.kind.as_str());
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    // Relay first, then indicator; skipped entirely if the relay already
    // sits at the requested level.
    fn drive(&self, level: Level) -> Result<(), HardwareError> {
        if self.gpio.read(self.relay_pin)? == level {
            return Ok(());
        }

        self.gpio.write(self.relay_pin, level)?;
        match level {
            Level::High => self.power_on_indicator()?,
            Level::Low => self.power_off_indicator()?,
        }
        info!(
            "{} relay {}",
            self.kind.as_str(),
            if level.is_high() { "on" } else { "off" }
        );
        Ok(())
    }
}
