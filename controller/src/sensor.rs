use std::path::{Path, PathBuf};

use growbox_common::{parse_w1_slave, SensorConfig, W1_READ_LIMIT};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureProbe {
    Ds18b20 { device_glob: String },
    Fixed(Option<f32>),
}

impl From<&SensorConfig> for TemperatureProbe {
    fn from(config: &SensorConfig) -> Self {
        match config {
            SensorConfig::Ds18b20 { device_glob } => Self::Ds18b20 {
                device_glob: device_glob.clone(),
            },
            SensorConfig::Fixed { celsius } => Self::Fixed(*celsius),
        }
    }
}

impl TemperatureProbe {
    /// Current temperature in Celsius, or `None` if no device could be read.
    pub async fn read(&self) -> Option<f32> {
        match self {
            Self::Fixed(celsius) => *celsius,
            Self::Ds18b20 { device_glob } => {
                let path = first_device(device_glob)?;
                match read_limited(&path).await {
                    Ok(raw) => {
                        let temp_c = parse_w1_slave(&raw);
                        debug!("ds18b20 {} reads {temp_c:.3}C", path.display());
                        Some(temp_c)
                    }
                    Err(err) => {
                        warn!("failed to read {}: {err}", path.display());
                        None
                    }
                }
            }
        }
    }
}

fn first_device(pattern: &str) -> Option<PathBuf> {
    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("invalid sensor device pattern {pattern}: {err}");
            return None;
        }
    };

    let first = entries.filter_map(Result::ok).next();
    if first.is_none() {
        warn!("no sensor device matches {pattern}");
    }
    first
}

async fn read_limited(path: &Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut raw = Vec::with_capacity(W1_READ_LIMIT);
    file.take(W1_READ_LIMIT as u64).read_to_end(&mut raw).await?;
    Ok(raw)
}
