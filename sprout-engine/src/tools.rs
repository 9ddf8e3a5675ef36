//! # Capability table
//!
//! The decision-making caller never sees a `Plant`. It gets a table of
//! named, zero-argument operations returning JSON values, and picks from
//! those by name. Each call is blocking; async callers should run it on a
//! blocking worker.

use crate::error::{Error, Result};
use crate::plant::Plant;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

pub const GET_PLANT_TYPE: &str = "get_plant_type";
pub const GET_SOIL_MOISTURE: &str = "get_soil_moisture";
pub const WATER_PLANT: &str = "water_plant";
pub const DAYS_SINCE_LAST_WATERED: &str = "days_since_last_watered";

/// Text returned by `water_plant` after a successful run
pub const WATERING_COMPLETE: &str = "Watering Complete";

/// A plant shared between tool closures. The mutex serializes sensor reads
/// and waterings so they never overlap on the same hardware.
pub type SharedPlant = Arc<Mutex<Plant>>;

type ToolFn = Arc<dyn Fn() -> Result<Value> + Send + Sync>;

/// One named operation
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    call: ToolFn,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        call: impl Fn() -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn call(&self) -> Result<Value> {
        (self.call)()
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Ordered name -> operation mapping
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    tools: Vec<Tool>,
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any earlier tool with the same name.
    pub fn register(mut self, tool: Tool) -> Self {
        self.tools.retain(|t| t.name != tool.name);
        self.tools.push(tool);
        self
    }

    /// The four plant operations, backed by one shared plant.
    pub fn for_plant(plant: SharedPlant) -> Self {
        let type_plant = Arc::clone(&plant);
        let moisture_plant = Arc::clone(&plant);
        let water_plant = Arc::clone(&plant);
        let days_plant = plant;

        Self::new()
            .register(Tool::new(
                GET_PLANT_TYPE,
                "Return the type of the plant (e.g., 'pothos', 'snake plant', etc.).",
                move || Ok(json!(lock(&type_plant)?.plant_type())),
            ))
            .register(Tool::new(
                GET_SOIL_MOISTURE,
                "Use the plant's soil sensor to determine the current moisture level. \
                 Possible values: 'DRY', 'MOIST', 'WET'.",
                move || {
                    let level = lock(&moisture_plant)?.moisture_level()?;
                    Ok(json!(level.as_str()))
                },
            ))
            .register(Tool::new(
                WATER_PLANT,
                "Activates the motor to water the plant.",
                move || {
                    lock(&water_plant)?.water()?;
                    Ok(json!(WATERING_COMPLETE))
                },
            ))
            .register(Tool::new(
                DAYS_SINCE_LAST_WATERED,
                "Get the number of days since the plant was last watered. \
                 Returns -1 if the plant has never been watered.",
                move || Ok(json!(lock(&days_plant)?.days_since_last_watered())),
            ))
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the tool called `name`.
    pub fn invoke(&self, name: &str) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::tool_unknown(name).with_operation("tools::invoke"))?;
        tool.call()
            .map_err(|e| e.with_operation("tools::invoke").with_context("tool", name))
    }
}

fn lock(plant: &SharedPlant) -> Result<MutexGuard<'_, Plant>> {
    plant
        .lock()
        .map_err(|_| Error::unexpected("plant lock poisoned by an earlier panic"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::PlantConfig;
    use crate::hardware::{ConstantVoltage, RecordingMotor};
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;
    use sprout_error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shared_plant(voltage: f64) -> SharedPlant {
        let now = NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let plant = Plant::new(
            &PlantConfig::new("MyPothos", "pothos"),
            ConstantVoltage(voltage),
            RecordingMotor::new(),
            MemoryStore::new(),
            Arc::new(ManualClock::new(now)),
        )
        .unwrap();
        Arc::new(Mutex::new(plant))
    }

    #[test]
    fn test_plant_table_exposes_exactly_four_tools() {
        let table = ToolTable::for_plant(shared_plant(3.0));
        assert_eq!(
            table.names(),
            vec![
                GET_PLANT_TYPE,
                GET_SOIL_MOISTURE,
                WATER_PLANT,
                DAYS_SINCE_LAST_WATERED
            ]
        );
        assert!(table.iter().all(|t| !t.description().is_empty()));
    }

    #[test]
    fn test_plant_tools_round_trip() {
        let table = ToolTable::for_plant(shared_plant(3.0));

        assert_eq!(table.invoke(GET_PLANT_TYPE).unwrap(), json!("pothos"));
        assert_eq!(table.invoke(GET_SOIL_MOISTURE).unwrap(), json!("DRY"));
        assert_eq!(table.invoke(DAYS_SINCE_LAST_WATERED).unwrap(), json!(-1));
        assert_eq!(table.invoke(WATER_PLANT).unwrap(), json!("Watering Complete"));
        assert_eq!(table.invoke(DAYS_SINCE_LAST_WATERED).unwrap(), json!(0));
    }

    #[test]
    fn test_unknown_tool() {
        let table = ToolTable::for_plant(shared_plant(3.0));
        let err = table.invoke("prune_plant").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ToolUnknown);
    }

    #[test]
    fn test_tool_errors_surface() {
        let table = ToolTable::for_plant(shared_plant(f64::INFINITY));
        let err = table.invoke(GET_SOIL_MOISTURE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SensorOutOfRange);
        assert!(err.context().contains(&("tool", GET_SOIL_MOISTURE.to_string())));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let table = ToolTable::new()
            .register(Tool::new("ping", "first", || Ok(json!(1))))
            .register(Tool::new("ping", "second", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!(2))
            }));

        assert_eq!(table.len(), 1);
        assert_eq!(table.get("ping").unwrap().description(), "second");
        assert_eq!(table.invoke("ping").unwrap(), json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
