//! # Sprout Engine
//!
//! State and decisions for a single watered houseplant.
//!
//! ## Core Concepts
//! - **Sampler**: Debounces the soil sensor by averaging many raw reads
//! - **Calibration**: Maps an averaged voltage to a moisture band (DRY, MOIST, WET)
//! - **Plant**: Identity, watering action, and the persisted last-watered date
//! - **Tools**: Capability table handed to whatever decides when to water
//!
//! Hardware (sensor, motor), time and storage are injected; nothing here
//! touches a bus, a pin, or global state.

pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod hardware;
pub mod plant;
pub mod sampler;
pub mod storage;
pub mod tools;

pub use calibration::{Calibration, MoistureLevel};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PlantConfig, SamplerConfig, WateringConfig};
pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use hardware::{Motor, MotorGuard, VoltageSource};
pub use plant::{Plant, NEVER_WATERED};
pub use sampler::VoltageSampler;
pub use storage::{FileStore, MemoryStore, WateringStore};
pub use tools::{SharedPlant, Tool, ToolTable};
