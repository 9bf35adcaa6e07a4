use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use growbox_common::Level;
use rppal::gpio::{Gpio as RppalHandle, InputPin, Level as RppalLevel, OutputPin};

use crate::gpio::{GpioBackend, HardwareError};

enum Line {
    Input(InputPin),
    Output(OutputPin),
}

/// BCM-numbered GPIO via `/dev/gpiomem` on a Raspberry Pi.
pub struct RppalGpio {
    handle: RppalHandle,
    lines: Mutex<HashMap<u8, Line>>,
}

impl RppalGpio {
    pub fn new() -> Result<Self, HardwareError> {
        let handle = RppalHandle::new().map_err(backend_error)?;
        Ok(Self {
            handle,
            lines: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u8, Line>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GpioBackend for RppalGpio {
    fn setup_output(&self, pin: u8, initial: Level) -> Result<(), HardwareError> {
        let raw = self.handle.get(pin).map_err(backend_error)?;
        let output = match initial {
            Level::High => raw.into_output_high(),
            Level::Low => raw.into_output_low(),
        };
        self.lock().insert(pin, Line::Output(output));
        Ok(())
    }

    fn setup_input(&self, pin: u8) -> Result<(), HardwareError> {
        let input = self.handle.get(pin).map_err(backend_error)?.into_input();
        self.lock().insert(pin, Line::Input(input));
        Ok(())
    }

    fn read(&self, pin: u8) -> Result<Level, HardwareError> {
        match self.lock().get(&pin) {
            Some(Line::Input(input)) => Ok(from_rppal(input.read())),
            Some(Line::Output(output)) => Ok(Level::from(output.is_set_high())),
            None => Err(HardwareError::UnknownPin(pin)),
        }
    }

    fn write(&self, pin: u8, level: Level) -> Result<(), HardwareError> {
        match self.lock().get_mut(&pin) {
            Some(Line::Output(output)) => {
                match level {
                    Level::High => output.set_high(),
                    Level::Low => output.set_low(),
                }
                Ok(())
            }
            Some(Line::Input(_)) => Err(HardwareError::NotOutput(pin)),
            None => Err(HardwareError::UnknownPin(pin)),
        }
    }
}

fn from_rppal(level: RppalLevel) -> Level {
    match level {
        RppalLevel::High => Level::High,
        RppalLevel::Low => Level::Low,
    }
}

fn backend_error(err: rppal::gpio::Error) -> HardwareError {
    HardwareError::Backend(err.to_string())
}
