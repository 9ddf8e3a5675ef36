//! # Plant engine
//!
//! Holds one plant's identity, classifies soil moisture, drives the pump and
//! keeps the last-watered date on disk.
//!
//! `moisture_level` blocks for the whole sampling window (about 10 s) and
//! `water` for the pump run (about 5 s). Neither is safe to call
//! concurrently on the same plant; wrap the plant in a mutex (see
//! [`crate::tools::SharedPlant`]) when more than one caller can reach it.

use crate::calibration::{Calibration, MoistureLevel};
use crate::clock::Clock;
use crate::config::PlantConfig;
use crate::error::Result;
use crate::hardware::{Motor, MotorGuard, VoltageSource};
use crate::sampler::VoltageSampler;
use crate::storage::{format_date, parse_date, WateringStore};
use chrono::NaiveDateTime;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// `last_watered` text for a plant with no watering on record
pub const NEVER_WATERED: &str = "NEVER";

pub struct Plant {
    name: String,
    plant_type: String,
    sampler: VoltageSampler,
    motor: Box<dyn Motor>,
    calibration: Calibration,
    store: Box<dyn WateringStore>,
    clock: Arc<dyn Clock>,
    watering_duration: Duration,
    last_watered_at: Option<NaiveDateTime>,
}

impl Plant {
    /// Build a plant and load its last-watered date.
    ///
    /// A missing, unreadable or malformed record is logged and treated as
    /// "never watered"; only invalid configuration fails construction.
    pub fn new(
        config: &PlantConfig,
        sensor: impl VoltageSource + 'static,
        motor: impl Motor + 'static,
        store: impl WateringStore + 'static,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(|e| e.with_operation("plant::new"))?;

        let mut plant = Self {
            name: config.name.clone(),
            plant_type: config.plant_type.clone(),
            sampler: VoltageSampler::new(sensor, &config.sampler, Arc::clone(&clock)),
            motor: Box::new(motor),
            calibration: config.calibration,
            store: Box::new(store),
            clock,
            watering_duration: config.watering.duration(),
            last_watered_at: None,
        };
        plant.last_watered_at = plant.load_last_watered();
        Ok(plant)
    }

    fn load_last_watered(&self) -> Option<NaiveDateTime> {
        let line = match self.store.load(&self.name) {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(
                    plant = %self.name,
                    "no watering record; this plant may never have been watered"
                );
                return None;
            }
            Err(e) => {
                warn!(plant = %self.name, error = %e, "failed to read watering record");
                return None;
            }
        };

        let watered_at = match parse_date(&line) {
            Ok(at) => at,
            Err(e) => {
                warn!(plant = %self.name, error = %e, "watering record format error");
                return None;
            }
        };

        if watered_at > self.clock.now() {
            warn!(
                plant = %self.name,
                record = %line,
                "watering record lies in the future; ignoring it"
            );
            return None;
        }
        Some(watered_at)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plant_type(&self) -> &str {
        &self.plant_type
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn last_watered_at(&self) -> Option<NaiveDateTime> {
        self.last_watered_at
    }

    /// Last watering date as `MM/DD/YYYY`, or `"NEVER"`
    pub fn last_watered(&self) -> String {
        match self.last_watered_at {
            Some(at) => format_date(at),
            None => NEVER_WATERED.to_string(),
        }
    }

    /// Whole days since the last watering, or `-1` if never watered.
    ///
    /// Partial days count as zero. A clock that moved backwards past the
    /// recorded time also yields zero.
    pub fn days_since_last_watered(&self) -> i64 {
        match self.last_watered_at {
            None => -1,
            Some(at) => (self.clock.now() - at).num_days().max(0),
        }
    }

    /// Sample the sensor and classify the averaged voltage.
    pub fn moisture_level(&mut self) -> Result<MoistureLevel> {
        debug!(
            plant = %self.name,
            blocks_for = ?self.sampler.blocking_time(),
            "sampling soil sensor"
        );
        let voltage = self
            .sampler
            .sample()
            .map_err(|e| e.with_operation("plant::moisture_level"))?;
        self.calibration
            .classify(voltage)
            .map_err(|e| e.with_operation("plant::moisture_level"))
    }

    /// Run the pump for the configured duration and record the watering.
    ///
    /// The motor is switched off on every exit path, including an
    /// interrupted wait or a panic inside it. An interrupted run is not
    /// recorded. If the record cannot be saved, the in-memory date is still
    /// updated and a `PersistenceWriteFailed` error is returned.
    pub fn water(&mut self) -> Result<()> {
        info!(plant = %self.name, "starting watering process");

        let guard = MotorGuard::engage(self.motor.as_mut())
            .map_err(|e| e.with_operation("plant::water"))?;
        let held = self.clock.sleep(self.watering_duration);
        guard
            .release()
            .map_err(|e| e.with_operation("plant::water"))?;
        held.map_err(|e| e.with_operation("plant::water"))?;

        let now = self.clock.now();
        let watered_at = match self.last_watered_at {
            Some(previous) if previous > now => previous,
            _ => now,
        };
        self.last_watered_at = Some(watered_at);

        if let Err(e) = self.store.save(&self.name, &format_date(watered_at)) {
            error!(
                plant = %self.name,
                error = %e,
                "watering happened but its date could not be saved"
            );
            return Err(e.with_operation("plant::water"));
        }

        info!(
            plant = %self.name,
            date = %format_date(watered_at),
            "watering complete; last watered date saved"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Plant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plant")
            .field("name", &self.name)
            .field("plant_type", &self.plant_type)
            .field("store", &self.store.name())
            .field("last_watered_at", &self.last_watered_at)
            .finish()
    }
}
