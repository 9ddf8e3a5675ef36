//! Engine configuration
//!
//! Everything here deserializes with defaults, so a config file only needs
//! to mention what differs from the stock pothos setup.

use crate::calibration::Calibration;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the sensor is debounced
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamplerConfig {
    /// Raw reads averaged into one reading
    pub samples: usize,
    /// Pause after each raw read, in milliseconds
    pub interval_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            samples: 50,
            interval_ms: 200,
        }
    }
}

impl SamplerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(Error::config_invalid("sampler.samples", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WateringConfig {
    /// How long the pump runs per watering
    pub duration_secs: u64,
}

impl Default for WateringConfig {
    fn default() -> Self {
        Self { duration_secs: 5 }
    }
}

impl WateringConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.duration_secs == 0 {
            return Err(Error::config_invalid(
                "watering.duration_secs",
                "must be at least 1 second",
            ));
        }
        Ok(())
    }
}

/// Identity and tuning of one plant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlantConfig {
    /// Unique name; also keys the persisted watering record
    pub name: String,
    /// Species label, e.g. "pothos" or "snake plant"
    #[serde(rename = "type")]
    pub plant_type: String,
    pub sampler: SamplerConfig,
    pub calibration: Calibration,
    pub watering: WateringConfig,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            name: "MyPothos".to_string(),
            plant_type: "pothos".to_string(),
            sampler: SamplerConfig::default(),
            calibration: Calibration::default(),
            watering: WateringConfig::default(),
        }
    }
}

impl PlantConfig {
    pub fn new(name: impl Into<String>, plant_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plant_type: plant_type.into(),
            ..Self::default()
        }
    }

    pub fn with_sampler(mut self, samples: usize, interval: Duration) -> Self {
        self.sampler = SamplerConfig {
            samples,
            interval_ms: interval.as_millis() as u64,
        };
        self
    }

    pub fn with_calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = calibration;
        self
    }

    pub fn with_watering_duration(mut self, duration: Duration) -> Self {
        self.watering.duration_secs = duration.as_secs();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config_invalid("plant.name", "must not be empty"));
        }
        self.sampler.validate()?;
        self.calibration.validate()?;
        self.watering.validate()
    }
}
