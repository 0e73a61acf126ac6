use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::telemetry::TelemetrySample;

/// Flushed field order and names, matching the historical log layout so
/// existing post-flight tooling keeps working.
type FieldGetter = fn(&TelemetrySample) -> f64;
const FIELDS: [(&str, FieldGetter); 9] = [
    ("altitude", |s| s.altitude),
    ("accel-x", |s| s.accel_x),
    ("accel-y", |s| s.accel_y),
    ("accel-z", |s| s.accel_z),
    ("gyro-x", |s| s.gyro_x),
    ("gyro-y", |s| s.gyro_y),
    ("gyro-z", |s| s.gyro_z),
    ("temperature", |s| s.temperature),
    ("voltage", |s| s.voltage),
];

/// Append-only log of decoded samples in arrival order. A sample's index
/// is its sequence number.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    samples: Vec<TelemetrySample>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample, returning its assigned sequence number.
    pub fn push(&mut self, sample: TelemetrySample) -> u64 {
        self.samples.push(sample);
        (self.samples.len() - 1) as u64
    }

    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.last()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Dump every recorded value to a flat text file, one line per field:
    /// `<field>: [v0, v1, ...]`.
    pub fn flush(&self, path: &Path) -> io::Result<()> {
        let mut out = String::new();
        for (name, get) in FIELDS {
            let values: Vec<String> = self.samples.iter().map(|s| get(s).to_string()).collect();
            let _ = writeln!(out, "{}: [{}]", name, values.join(", "));
        }
        fs::write(path, out)?;
        info!(samples = self.samples.len(), path = %path.display(), "telemetry log flushed");
        Ok(())
    }
}
