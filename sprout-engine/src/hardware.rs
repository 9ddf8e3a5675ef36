//! # Hardware seams
//!
//! The engine never talks to a bus or a pin. A sensor is anything that can
//! produce one raw voltage reading, a motor is anything that can be switched
//! on and off. Bus drivers live outside this crate and implement these traits.

use crate::error::{Error, Result};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

/// Source of raw soil-sensor voltage readings.
pub trait VoltageSource: Send {
    /// Take a single instantaneous reading, in volts.
    fn read_raw_voltage(&mut self) -> Result<f64>;
}

/// On/off pump motor. Setting the same state twice must be a no-op.
pub trait Motor: Send {
    fn set_motor(&mut self, on: bool) -> Result<()>;

    fn turn_on(&mut self) -> Result<()> {
        self.set_motor(true)
    }

    fn turn_off(&mut self) -> Result<()> {
        self.set_motor(false)
    }
}

impl<T: VoltageSource + ?Sized> VoltageSource for Box<T> {
    fn read_raw_voltage(&mut self) -> Result<f64> {
        (**self).read_raw_voltage()
    }
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn set_motor(&mut self, on: bool) -> Result<()> {
        (**self).set_motor(on)
    }
}

/// Keeps a motor energized for as long as the guard lives.
///
/// `release` switches the motor off and reports the result. If the guard is
/// dropped without being released (early return, panic while waiting), the
/// motor is switched off in `drop` and any failure is logged.
pub struct MotorGuard<'a> {
    motor: &'a mut dyn Motor,
    armed: bool,
}

impl<'a> MotorGuard<'a> {
    /// Switch the motor on and return a guard that will switch it off.
    pub fn engage(motor: &'a mut dyn Motor) -> Result<Self> {
        let mut guard = Self { motor, armed: true };
        // Armed before turn_on: a failed turn-on still gets an off command.
        guard.motor.turn_on()?;
        debug!("motor activated");
        Ok(guard)
    }

    /// Switch the motor off now.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        let result = self.motor.turn_off();
        if result.is_ok() {
            debug!("motor de-activated");
        }
        result
    }
}

impl Drop for MotorGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            match self.motor.turn_off() {
                Ok(()) => debug!("motor de-activated on unwind"),
                Err(e) => error!(error = %e, "failed to switch motor off"),
            }
        }
    }
}

// ============================================================================
// Bench hardware
// ============================================================================

/// Sensor that always reports the same voltage.
#[derive(Debug, Clone, Copy)]
pub struct ConstantVoltage(pub f64);

impl VoltageSource for ConstantVoltage {
    fn read_raw_voltage(&mut self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Sensor that replays a fixed sequence of readings.
///
/// Once the sequence is used up it either starts over (`cycling`) or fails
/// every further read with `SensorReadFailed`.
#[derive(Debug, Clone)]
pub struct ScriptedVoltage {
    readings: Vec<f64>,
    position: usize,
    cycle: bool,
}

impl ScriptedVoltage {
    pub fn new(readings: impl Into<Vec<f64>>) -> Self {
        Self {
            readings: readings.into(),
            position: 0,
            cycle: false,
        }
    }

    pub fn cycling(readings: impl Into<Vec<f64>>) -> Self {
        Self {
            cycle: true,
            ..Self::new(readings)
        }
    }

    /// Number of readings handed out so far
    pub fn reads(&self) -> usize {
        self.position
    }
}

impl VoltageSource for ScriptedVoltage {
    fn read_raw_voltage(&mut self) -> Result<f64> {
        let index = if self.cycle && !self.readings.is_empty() {
            self.position % self.readings.len()
        } else {
            self.position
        };
        let value = self.readings.get(index).copied().ok_or_else(|| {
            Error::sensor_read("no more scripted readings")
                .with_operation("hardware::read_raw_voltage")
                .with_context("reads", self.position.to_string())
        })?;
        self.position += 1;
        Ok(value)
    }
}

/// Shared view of every call a `RecordingMotor` received.
#[derive(Debug, Clone, Default)]
pub struct MotorLog {
    calls: Arc<Mutex<Vec<bool>>>,
}

impl MotorLog {
    /// All `set_motor` arguments, oldest first
    pub fn calls(&self) -> Vec<bool> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Whether the last command left the motor running
    pub fn is_on(&self) -> bool {
        self.calls().last().copied().unwrap_or(false)
    }

    fn push(&self, on: bool) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(on);
        }
    }
}

/// Motor that records every command instead of driving a pin.
#[derive(Debug, Clone, Default)]
pub struct RecordingMotor {
    log: MotorLog,
    fail_on: Option<bool>,
}

impl RecordingMotor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `set_motor(on)` with this value fail (after recording it).
    pub fn failing_when(mut self, on: bool) -> Self {
        self.fail_on = Some(on);
        self
    }

    pub fn log(&self) -> MotorLog {
        self.log.clone()
    }
}

impl Motor for RecordingMotor {
    fn set_motor(&mut self, on: bool) -> Result<()> {
        self.log.push(on);
        if self.fail_on == Some(on) {
            return Err(Error::motor_failed(format!("motor refused to switch {}", on_off(on)))
                .with_operation("hardware::set_motor"));
        }
        debug!(state = on_off(on), "motor command");
        Ok(())
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprout_error::ErrorKind;

    #[test]
    fn test_scripted_voltage_exhausts() {
        let mut sensor = ScriptedVoltage::new(vec![1.0, 2.0]);
        assert_eq!(sensor.read_raw_voltage().unwrap(), 1.0);
        assert_eq!(sensor.read_raw_voltage().unwrap(), 2.0);

        let err = sensor.read_raw_voltage().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SensorReadFailed);
        assert_eq!(sensor.reads(), 2);
    }

    #[test]
    fn test_scripted_voltage_cycles() {
        let mut sensor = ScriptedVoltage::cycling(vec![1.0, 2.0]);
        let reads: Vec<f64> = (0..5).map(|_| sensor.read_raw_voltage().unwrap()).collect();
        assert_eq!(reads, vec![1.0, 2.0, 1.0, 2.0, 1.0]);
    }

    #[test]
    fn test_guard_release_turns_motor_off() {
        let mut motor = RecordingMotor::new();
        let log = motor.log();

        let guard = MotorGuard::engage(&mut motor).unwrap();
        assert!(log.is_on());
        guard.release().unwrap();

        assert_eq!(log.calls(), vec![true, false]);
    }

    #[test]
    fn test_guard_drop_turns_motor_off() {
        let mut motor = RecordingMotor::new();
        let log = motor.log();

        {
            let _guard = MotorGuard::engage(&mut motor).unwrap();
        }

        assert_eq!(log.calls(), vec![true, false]);
        assert!(!log.is_on());
    }

    #[test]
    fn test_failed_engage_still_sends_off() {
        let mut motor = RecordingMotor::new().failing_when(true);
        let log = motor.log();

        let err = MotorGuard::engage(&mut motor).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MotorFailed);
        assert_eq!(log.calls(), vec![true, false]);
    }

    #[test]
    fn test_release_reports_motor_failure() {
        let mut motor = RecordingMotor::new().failing_when(false);
        let log = motor.log();

        let guard = MotorGuard::engage(&mut motor).unwrap();
        let err = guard.release().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MotorFailed);
        // No second off attempt from drop after an explicit release.
        assert_eq!(log.calls(), vec![true, false]);
    }
}
