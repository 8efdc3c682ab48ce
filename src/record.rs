use serde::{Deserialize, Serialize};

/// Field names of the ten-float attitude frame: accelerometer, gyro,
/// integration timestep, then yaw/pitch/roll.
pub const ATTITUDE_FIELDS: [&str; 10] = ["ax", "ay", "az", "gx", "gy", "gz", "dts", "y", "p", "r"];

/// One recovered telemetry record.
///
/// Depending on the framing scheme this is a single float, a fixed-arity
/// binary frame, or however many fields an ascii line carried. Values are
/// emitted exactly as decoded; non-finite floats are left for sinks to
/// filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: Vec<f32>,
}

impl Record {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Number of fields in this record.
    pub fn arity(&self) -> usize {
        self.values.len()
    }

    /// True when every field is a finite float (no NaN, no infinities).
    pub fn all_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}
