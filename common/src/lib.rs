pub mod config;
pub mod policy;
pub mod types;
pub mod w1;

pub use config::{
    ConfigError, LightConfig, PinConfig, RuntimeConfig, SensorConfig, SupervisorConfig,
    TemperatureConfig,
};
pub use policy::{daylight_decision, heating_decision, DaylightWindow};
pub use types::{Level, ServiceKind, ServiceState, Switch};
pub use w1::{parse_w1_slave, W1_CRC_FAIL_SENTINEL_C, W1_READ_LIMIT};
