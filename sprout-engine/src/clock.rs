//! Wall-clock time and blocking waits.
//!
//! Both the sampler and the watering action block for seconds at a time.
//! Routing every wait through `Clock` lets tests run instantly and lets a
//! caller interrupt a wait.

use crate::error::{Error, Result};
use chrono::{Local, NaiveDateTime};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> NaiveDateTime;

    /// Block the calling thread for `duration`.
    ///
    /// Returns `Interrupted` if the wait was cut short.
    fn sleep(&self, duration: Duration) -> Result<()>;
}

/// Real time, real sleeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) -> Result<()> {
        std::thread::sleep(duration);
        Ok(())
    }
}

#[derive(Debug)]
struct ManualState {
    now: NaiveDateTime,
    slept: Vec<Duration>,
    interrupt_next: bool,
}

/// Clock driven by hand. Sleeping returns immediately and advances `now`.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now,
                slept: Vec::new(),
                interrupt_next: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_now(&self, now: NaiveDateTime) {
        self.state().now = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut state = self.state();
        state.now += by;
    }

    /// Every duration passed to `sleep`, oldest first
    pub fn slept(&self) -> Vec<Duration> {
        self.state().slept.clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.state().slept.iter().sum()
    }

    /// Make the next `sleep` fail with `Interrupted` without advancing time.
    pub fn interrupt_next_sleep(&self) {
        self.state().interrupt_next = true;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.state().now
    }

    fn sleep(&self, duration: Duration) -> Result<()> {
        let mut state = self.state();
        if state.interrupt_next {
            state.interrupt_next = false;
            return Err(Error::interrupted("wait interrupted")
                .with_operation("clock::sleep")
                .with_context("duration_ms", duration.as_millis().to_string()));
        }
        state.slept.push(duration);
        state.now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        Ok(())
    }
}
