use std::fmt;

use crate::error::DecodeError;

/// Tokens bounding one telemetry record on the wire.
pub const TELEMETRY_BEGIN: &[u8] = b"DBEGIN";
pub const TELEMETRY_END: &[u8] = b"DEND";

/// Field labels in wire order. Each value runs from the end of its label
/// to the start of the next one; the last runs to the end of the payload.
const LABELS: [&str; 9] = [
    "ACCELX", "ACCELY", "ACCELZ", "GYROX", "GYROY", "GYROZ", "TEMP", "VOLT", "ALT",
];

const GRAVITY: f64 = 9.81;

/// One decoded telemetry record. Accelerations in m/s², gyro rates in
/// deg/s, temperature in °C, voltage in V, altitude in m. Never mutated
/// after decode; arrival order is its implicit sequence number, assigned
/// by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gyro_x: f64,
    pub gyro_y: f64,
    pub gyro_z: f64,
    pub temperature: f64,
    pub voltage: f64,
    pub altitude: f64,
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "alt={:.1}m accel=({:.3},{:.3},{:.3})m/s2 gyro=({:.1},{:.1},{:.1})deg/s temp={:.1}C volt={:.2}V",
            self.altitude,
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
            self.temperature,
            self.voltage,
        )
    }
}

/// Decode the ASCII payload between `DBEGIN` and `DEND` into a sample.
///
/// All-or-nothing: a missing label or unparsable number fails the whole
/// record so a partial sample is never published. The rover sends raw
/// milli-units for acceleration and rad/s for gyro rates; both are
/// converted here so everything downstream works in display units.
pub fn decode(raw: &[u8]) -> Result<TelemetrySample, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotText)?;

    // Labels are self-delimiting: locate each one in wire order first.
    let mut starts = [0usize; LABELS.len()];
    let mut from = 0;
    for (i, &label) in LABELS.iter().enumerate() {
        let at = text[from..]
            .find(label)
            .ok_or(DecodeError::MissingLabel(label))?;
        starts[i] = from + at;
        from = starts[i] + label.len();
    }

    let mut values = [0f64; LABELS.len()];
    for i in 0..LABELS.len() {
        let begin = starts[i] + LABELS[i].len();
        let end = if i + 1 < LABELS.len() {
            starts[i + 1]
        } else {
            text.len()
        };
        let field = text[begin..end].trim();
        values[i] = field.parse().map_err(|_| DecodeError::BadNumber {
            label: LABELS[i],
            text: field.to_string(),
        })?;
    }

    let [ax, ay, az, gx, gy, gz, temp, volt, alt] = values;
    Ok(TelemetrySample {
        accel_x: milli_to_ms2(ax),
        accel_y: milli_to_ms2(ay),
        accel_z: milli_to_ms2(az),
        gyro_x: rad_to_deg(gx),
        gyro_y: rad_to_deg(gy),
        gyro_z: rad_to_deg(gz),
        temperature: temp,
        voltage: volt,
        altitude: alt,
    })
}

fn milli_to_ms2(raw: f64) -> f64 {
    raw / 1000.0 * GRAVITY
}

fn rad_to_deg(raw: f64) -> f64 {
    raw * 180.0 / std::f64::consts::PI
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn encode(
        accel_milli: [f64; 3],
        gyro_rad: [f64; 3],
        temp: f64,
        volt: f64,
        alt: f64,
    ) -> String {
        format!(
            "ACCELX{}ACCELY{}ACCELZ{}GYROX{}GYROY{}GYROZ{}TEMP{}VOLT{}ALT{}",
            accel_milli[0],
            accel_milli[1],
            accel_milli[2],
            gyro_rad[0],
            gyro_rad[1],
            gyro_rad[2],
            temp,
            volt,
            alt,
        )
    }

    #[test]
    fn round_trip_with_unit_conversion() {
        let raw = encode(
            [9810.0, -500.0, 0.0],
            [3.14159, -1.5708, 0.0],
            21.5,
            4.97,
            1234.5,
        );
        let s = decode(raw.as_bytes()).unwrap();
        assert_abs_diff_eq!(s.accel_x, 96.2, epsilon = 0.1);
        assert_abs_diff_eq!(s.accel_y, -4.905, epsilon = 0.01);
        assert_abs_diff_eq!(s.accel_z, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(s.gyro_x, 180.0, epsilon = 0.1);
        assert_abs_diff_eq!(s.gyro_y, -90.0, epsilon = 0.1);
        assert_abs_diff_eq!(s.temperature, 21.5, epsilon = 1e-9);
        assert_abs_diff_eq!(s.voltage, 4.97, epsilon = 1e-9);
        assert_abs_diff_eq!(s.altitude, 1234.5, epsilon = 1e-9);
    }

    #[test]
    fn missing_label_fails_whole_record() {
        // TEMP dropped by the remote: nothing may be published.
        let raw = b"ACCELX100ACCELY200ACCELZ300GYROX0GYROY0GYROZ0VOLT5ALT10";
        let err = decode(raw).unwrap_err();
        assert!(matches!(err, DecodeError::MissingLabel("TEMP")));
    }

    #[test]
    fn garbage_number_fails_whole_record() {
        let raw = encode([100.0, 200.0, 300.0], [0.0, 0.0, 0.0], 20.0, 5.0, 10.0)
            .replace("VOLT5", "VOLTx5");
        let err = decode(raw.as_bytes()).unwrap_err();
        assert!(matches!(err, DecodeError::BadNumber { label: "VOLT", .. }));
    }

    #[test]
    fn non_utf8_payload_is_rejected() {
        let err = decode(&[0xFF, 0xFE, 0x00]).unwrap_err();
        assert!(matches!(err, DecodeError::NotText));
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let err = decode(b"ACCELX100ACCELY2").unwrap_err();
        assert!(matches!(err, DecodeError::MissingLabel("ACCELZ")));
    }
}
