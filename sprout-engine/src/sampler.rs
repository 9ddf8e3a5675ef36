//! # Voltage sampler
//!
//! One instantaneous read of the soil probe is noisy enough to hop across a
//! band boundary, so a reading is the mean of many raw reads spaced out in
//! time. At the defaults (50 reads, 200 ms apart) a single `sample` blocks
//! for about ten seconds.

use crate::clock::Clock;
use crate::config::SamplerConfig;
use crate::error::Result;
use crate::hardware::VoltageSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct VoltageSampler {
    source: Box<dyn VoltageSource>,
    samples: usize,
    interval: Duration,
    clock: Arc<dyn Clock>,
}

impl VoltageSampler {
    pub fn new(
        source: impl VoltageSource + 'static,
        config: &SamplerConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source: Box::new(source),
            samples: config.samples.max(1),
            interval: config.interval(),
            clock,
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Approximate time one `sample` call blocks for, saturating at `Duration::MAX`
    pub fn blocking_time(&self) -> Duration {
        u32::try_from(self.samples)
            .map(|n| self.interval.saturating_mul(n))
            .unwrap_or(Duration::MAX)
    }

    /// Average of `samples` raw reads.
    ///
    /// A failing raw read aborts the whole sample and its error is returned
    /// as is. There is no retry.
    pub fn sample(&mut self) -> Result<f64> {
        let mut total = 0.0;
        for _ in 0..self.samples {
            total += self.source.read_raw_voltage()?;
            self.clock.sleep(self.interval)?;
        }
        let voltage = total / self.samples as f64;
        info!("soil sensor reading: {:.3} V", voltage);
        Ok(voltage)
    }
}
