use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};

use growbox_common::Level;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("pin {0} has not been configured")]
    UnknownPin(u8),
    #[error("pin {0} is configured as an input")]
    NotOutput(u8),
    #[error("gpio backend error: {0}")]
    Backend(String),
}

/// Synchronous access to GPIO lines. Every service holds a handle to the
/// same backend; pin ownership is partitioned by configuration.
pub trait GpioBackend: Send + Sync {
    fn setup_output(&self, pin: u8, initial: Level) -> Result<(), HardwareError>;
    fn setup_input(&self, pin: u8) -> Result<(), HardwareError>;
    fn read(&self, pin: u8) -> Result<Level, HardwareError>;
    fn write(&self, pin: u8, level: Level) -> Result<(), HardwareError>;
}

pub type Gpio = Arc<dyn GpioBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Input,
    Output,
}

#[derive(Debug, Default)]
struct SimulatedPins {
    lines: HashMap<u8, (Direction, Level)>,
    failing: HashSet<u8>,
    writes: u64,
}

/// In-memory backend used on development hosts and in tests.
#[cfg_attr(feature = "rpi", allow(dead_code))]
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    pins: Mutex<SimulatedPins>,
}

#[cfg_attr(feature = "rpi", allow(dead_code))]
impl SimulatedGpio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drives an input line, as the power switch would.
    pub fn set_input(&self, pin: u8, level: Level) {
        let mut pins = self.lock();
        let entry = pins.lines.entry(pin).or_insert((Direction::Input, level));
        entry.1 = level;
    }

    #[cfg(test)]
    pub fn level(&self, pin: u8) -> Option<Level> {
        self.lock().lines.get(&pin).map(|(_, level)| *level)
    }

    /// Makes every subsequent write to `pin` fail.
    #[cfg(test)]
    pub fn fail_writes(&self, pin: u8) {
        self.lock().failing.insert(pin);
    }

    #[cfg(test)]
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedPins> {
        // A panic while holding the lock cannot leave the map inconsistent.
        self.pins.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GpioBackend for SimulatedGpio {
    fn setup_output(&self, pin: u8, initial: Level) -> Result<(), HardwareError> {
        self.lock().lines.insert(pin, (Direction::Output, initial));
        Ok(())
    }

    fn setup_input(&self, pin: u8) -> Result<(), HardwareError> {
        let mut pins = self.lock();
        let entry = pins.lines.entry(pin).or_insert((Direction::Input, Level::Low));
        entry.0 = Direction::Input;
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<Level, HardwareError> {
        self.lock()
            .lines
            .get(&pin)
            .map(|(_, level)| *level)
            .ok_or(HardwareError::UnknownPin(pin))
    }

    fn write(&self, pin: u8, level: Level) -> Result<(), HardwareError> {
        let mut pins = self.lock();
        if pins.failing.contains(&pin) {
            return Err(HardwareError::Backend(format!("write to pin {pin} failed")));
        }
        let Some(line) = pins.lines.get_mut(&pin) else {
            return Err(HardwareError::UnknownPin(pin));
        };
        if line.0 != Direction::Output {
            return Err(HardwareError::NotOutput(pin));
        }
        line.1 = level;
        pins.writes += 1;
        Ok(())
    }
}
