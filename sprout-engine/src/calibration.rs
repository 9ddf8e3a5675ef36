//! # Moisture calibration
//!
//! A linear fit maps the averaged sensor voltage onto the scale of a
//! handheld reference moisture meter:
//!
//! ```text
//! score = round(slope * voltage + intercept)
//! ```
//!
//! The score is then cut into three bands with closed lower bounds:
//! `score < dry_below` is DRY, `dry_below <= score < wet_at` is MOIST and
//! `score >= wet_at` is WET.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Discrete soil moisture band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoistureLevel {
    Dry,
    Moist,
    Wet,
}

impl MoistureLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoistureLevel::Dry => "DRY",
            MoistureLevel::Moist => "MOIST",
            MoistureLevel::Wet => "WET",
        }
    }
}

impl fmt::Display for MoistureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MoistureLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRY" => Ok(MoistureLevel::Dry),
            "MOIST" => Ok(MoistureLevel::Moist),
            "WET" => Ok(MoistureLevel::Wet),
            _ => Err(Error::parse_failed(format!("unknown moisture level '{}'", s))),
        }
    }
}

/// Linear calibration from sensor voltage to moisture band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub slope: f64,
    pub intercept: f64,
    /// Lowest score that is no longer DRY
    pub dry_below: i64,
    /// Lowest score that counts as WET
    pub wet_at: i64,
    /// Optional plausibility bound on the raw voltage
    pub min_voltage: Option<f64>,
    pub max_voltage: Option<f64>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            slope: -8.3,
            intercept: 19.84,
            dry_below: 5,
            wet_at: 8,
            min_voltage: None,
            max_voltage: None,
        }
    }
}

impl Calibration {
    pub fn new(slope: f64, intercept: f64) -> Self {
        Self {
            slope,
            intercept,
            ..Self::default()
        }
    }

    /// Reject voltages outside `[min, max]` as out of range.
    pub fn with_voltage_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_voltage = Some(min);
        self.max_voltage = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.slope.is_finite() {
            return Err(Error::config_invalid("calibration.slope", "must be finite"));
        }
        if !self.intercept.is_finite() {
            return Err(Error::config_invalid("calibration.intercept", "must be finite"));
        }
        if self.dry_below > self.wet_at {
            return Err(Error::config_invalid(
                "calibration.dry_below",
                format!("{} is above wet_at {}", self.dry_below, self.wet_at),
            ));
        }
        if self.min_voltage.is_some_and(f64::is_nan) {
            return Err(Error::config_invalid("calibration.min_voltage", "must be a number"));
        }
        if self.max_voltage.is_some_and(f64::is_nan) {
            return Err(Error::config_invalid("calibration.max_voltage", "must be a number"));
        }
        if let (Some(min), Some(max)) = (self.min_voltage, self.max_voltage) {
            if min > max {
                return Err(Error::config_invalid(
                    "calibration.min_voltage",
                    format!("voltage bounds [{}, {}] are inverted", min, max),
                ));
            }
        }
        Ok(())
    }

    /// Reference-meter score for a voltage.
    pub fn score(&self, voltage: f64) -> Result<i64> {
        if !voltage.is_finite() {
            return Err(Error::sensor_out_of_range(voltage, "voltage is not a finite number")
                .with_operation("calibration::score"));
        }
        if let Some(min) = self.min_voltage {
            if voltage < min {
                return Err(Error::sensor_out_of_range(voltage, format!("below minimum {} V", min))
                    .with_operation("calibration::score"));
            }
        }
        if let Some(max) = self.max_voltage {
            if voltage > max {
                return Err(Error::sensor_out_of_range(voltage, format!("above maximum {} V", max))
                    .with_operation("calibration::score"));
            }
        }

        let predicted = self.slope * voltage + self.intercept;
        if !predicted.is_finite() {
            return Err(Error::sensor_out_of_range(voltage, "calibrated score overflowed")
                .with_operation("calibration::score"));
        }
        Ok(predicted.round() as i64)
    }

    /// Band for an already computed score. Total over all integers.
    pub fn band(&self, score: i64) -> MoistureLevel {
        if score < self.dry_below {
            MoistureLevel::Dry
        } else if score < self.wet_at {
            MoistureLevel::Moist
        } else {
            MoistureLevel::Wet
        }
    }

    pub fn classify(&self, voltage: f64) -> Result<MoistureLevel> {
        Ok(self.band(self.score(voltage)?))
    }
}
