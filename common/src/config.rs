use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::DaylightWindow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("pin {pin} is assigned to both {first} and {second}")]
    PinConflict {
        pin: u8,
        first: &'static str,
        second: &'static str,
    },
}

/// BCM pin numbers for every line the controller touches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinConfig {
    pub main_indicator: u8,
    pub power_sense: u8,
    pub light_relay: u8,
    pub light_indicator: u8,
    pub temperature_relay: u8,
    pub temperature_indicator: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            main_indicator: 2,
            power_sense: 5,
            light_relay: 3,
            light_indicator: 4,
            temperature_relay: 6,
            temperature_indicator: 7,
        }
    }
}

impl PinConfig {
    pub fn assignments(&self) -> [(&'static str, u8); 6] {
        [
            ("main_indicator", self.main_indicator),
            ("power_sense", self.power_sense),
            ("light_relay", self.light_relay),
            ("light_indicator", self.light_indicator),
            ("temperature_relay", self.temperature_relay),
            ("temperature_indicator", self.temperature_indicator),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let assignments = self.assignments();
        for (i, (first, pin)) in assignments.iter().enumerate() {
            if let Some((second, _)) = assignments[i + 1..]
                .iter()
                .find(|(_, other)| other == pin)
            {
                return Err(ConfigError::PinConflict {
                    pin: *pin,
                    first: *first,
                    second: *second,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SensorConfig {
    Ds18b20 {
        #[serde(rename = "deviceGlob")]
        device_glob: String,
    },
    /// Constant reading; `None` behaves like an unplugged probe.
    Fixed { celsius: Option<f32> },
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self::Ds18b20 {
            device_glob: "/sys/bus/w1/devices/28*/w1_slave".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemperatureConfig {
    pub threshold_c: f32,
    pub interval_secs: u64,
    #[serde(default)]
    pub sensor: SensorConfig,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            threshold_c: 28.0,
            interval_secs: 60,
            sensor: SensorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightConfig {
    #[serde(default)]
    pub window: DaylightWindow,
    pub interval_secs: u64,
    pub timezone: String,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            window: DaylightWindow::default(),
            interval_secs: 600,
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SupervisorConfig {
    pub poll_interval_ms: u64,
    pub stop_grace_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            stop_grace_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub pins: PinConfig,
    #[serde(default)]
    pub temperature: TemperatureConfig,
    #[serde(default)]
    pub light: LightConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        if !self.temperature.threshold_c.is_finite() {
            self.temperature.threshold_c = TemperatureConfig::default().threshold_c;
        }
        self.temperature.interval_secs = self.temperature.interval_secs.max(1);
        self.light.interval_secs = self.light.interval_secs.max(1);
        self.light.window.sanitize();
        self.supervisor.poll_interval_ms = self.supervisor.poll_interval_ms.max(50);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pins.validate()
    }
}
