use serde::{Deserialize, Serialize};

use crate::types::Switch;

/// Heating stays off whenever the reading is missing or not a number.
pub fn heating_decision(reading: Option<f32>, threshold_c: f32) -> Switch {
    match reading {
        Some(temp_c) if temp_c.is_finite() && temp_c < threshold_c => Switch::On,
        _ => Switch::Off,
    }
}

/// Inclusive range of hours during which the light relay is energized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaylightWindow {
    pub on_hour: u32,
    pub off_hour: u32,
}

impl Default for DaylightWindow {
    fn default() -> Self {
        Self {
            on_hour: 6,
            off_hour: 22,
        }
    }
}

impl DaylightWindow {
    pub fn contains(&self, hour: u32) -> bool {
        (self.on_hour..=self.off_hour).contains(&hour)
    }

    pub fn sanitize(&mut self) {
        self.on_hour = self.on_hour.min(23);
        self.off_hour = self.off_hour.min(23);
        if self.on_hour > self.off_hour {
            std::mem::swap(&mut self.on_hour, &mut self.off_hour);
        }
    }
}

pub fn daylight_decision(hour: u32, window: &DaylightWindow) -> Switch {
    if window.contains(hour) {
        Switch::On
    } else {
        Switch::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn heating_is_off_at_or_above_threshold() {
        assert_eq!(heating_decision(Some(28.0), 28.0), Switch::Off);
        assert_eq!(heating_decision(Some(31.5), 28.0), Switch::Off);
        assert_eq!(heating_decision(Some(27.99), 28.0), Switch::On);
        assert_eq!(heating_decision(Some(-5.0), 28.0), Switch::On);
    }

    #[test]
    fn unreadable_sensor_never_heats() {
        assert_eq!(heating_decision(None, 28.0), Switch::Off);
        assert_eq!(heating_decision(Some(f32::NAN), 28.0), Switch::Off);
        assert_eq!(heating_decision(Some(999.0), 28.0), Switch::Off);
    }

    #[test]
    fn default_window_covers_six_through_twenty_two() {
        let window = DaylightWindow::default();
        let lit: Vec<u32> = (0..24)
            .filter(|hour| daylight_decision(*hour, &window) == Switch::On)
            .collect();

        assert_eq!(lit, (6..=22).collect::<Vec<u32>>());
        assert_eq!(daylight_decision(5, &window), Switch::Off);
        assert_eq!(daylight_decision(23, &window), Switch::Off);
    }

    #[test]
    fn sanitize_orders_and_clamps_bounds() {
        let mut window = DaylightWindow {
            on_hour: 40,
            off_hour: 7,
        };
        window.sanitize();

        assert_eq!(
            window,
            DaylightWindow {
                on_hour: 7,
                off_hour: 23
            }
        );
    }
}
