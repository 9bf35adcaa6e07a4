//! Parsing of the one-wire `w1_slave` text record exposed by the kernel
//! `w1_therm` driver for DS18B20 probes:
//!
//! ```text
//! 73 01 4b 46 7f ff 0d 10 41 : crc=41 YES
//! 73 01 4b 46 7f ff 0d 10 41 t=23187
//! ```

/// Reported when the CRC line is not confirmed. High enough that the
/// heating policy always switches off.
pub const W1_CRC_FAIL_SENTINEL_C: f32 = 999.0;

/// Upper bound on the bytes read from a device file.
pub const W1_READ_LIMIT: usize = 1000;

const CRC_OK_MARKER: &str = "YES";
const TEMPERATURE_FIELD: &str = "t=";

/// Returns degrees Celsius. Records that fail the CRC check, or carry no
/// parseable `t=` field, yield [`W1_CRC_FAIL_SENTINEL_C`].
pub fn parse_w1_slave(raw: &[u8]) -> f32 {
    let raw = &raw[..raw.len().min(W1_READ_LIMIT)];
    let text = String::from_utf8_lossy(raw);

    if !text.contains(CRC_OK_MARKER) {
        return W1_CRC_FAIL_SENTINEL_C;
    }

    let Some((_, tail)) = text.split_once(TEMPERATURE_FIELD) else {
        return W1_CRC_FAIL_SENTINEL_C;
    };

    tail.split_whitespace()
        .next()
        .and_then(|value| value.parse::<i32>().ok())
        .map(|millidegrees| millidegrees as f32 / 1000.0)
        .unwrap_or(W1_CRC_FAIL_SENTINEL_C)
}
