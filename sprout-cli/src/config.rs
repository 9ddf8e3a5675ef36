//! Configuration for the sprout CLI
//!
//! Read from an optional TOML file; every section falls back to defaults.
//! `MODEL`, `API_KEY` and `BASE_URL` from the environment override the
//! provider section when the provider config is built.

use serde::{Deserialize, Serialize};
use sprout_agent::{provider, AgentConfig, ProviderConfig, DEFAULT_PROMPT};
use sprout_engine::{Calibration, PlantConfig, SamplerConfig, WateringConfig};
use sprout_error::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};

/// Main CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SproutConfig {
    pub plant: PlantSection,
    pub sampler: SamplerConfig,
    pub calibration: Calibration,
    pub watering: WateringConfig,
    pub provider: ProviderSection,
    pub agent: AgentSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlantSection {
    pub name: String,
    #[serde(rename = "type")]
    pub plant_type: String,
    /// Directory holding `<name>_water_data.txt`
    pub state_dir: PathBuf,
}

impl Default for PlantSection {
    fn default() -> Self {
        let plant = PlantConfig::default();
        Self {
            name: plant.name,
            plant_type: plant.plant_type,
            state_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: provider::DEFAULT_BASE_URL.to_string(),
            model: provider::DEFAULT_MODEL.to_string(),
            api_key: provider::DEFAULT_API_KEY.to_string(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_turns: usize,
    pub prompt: String,
    /// Where chat transcripts go; empty disables them
    pub transcript_dir: Option<PathBuf>,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_turns: 10,
            prompt: DEFAULT_PROMPT.to_string(),
            transcript_dir: Some(PathBuf::from("transcripts")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl SproutConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::from(e)
                        .with_operation("config::load")
                        .with_context("path", path.display().to_string())
                })?;
                Self::parse(&content)?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            Error::new(ErrorKind::ConfigInvalid, "failed to parse config file")
                .with_operation("config::parse")
                .set_source(e)
        })
    }

    pub fn plant_config(&self) -> PlantConfig {
        PlantConfig {
            name: self.plant.name.clone(),
            plant_type: self.plant.plant_type.clone(),
            sampler: self.sampler.clone(),
            calibration: self.calibration,
            watering: self.watering.clone(),
        }
    }

    /// Provider settings from the file, with environment overrides from `lookup`.
    pub fn provider_config(&self, lookup: impl Fn(&str) -> Option<String>) -> ProviderConfig {
        ProviderConfig::local(&self.provider.base_url, &self.provider.model)
            .with_api_key(&self.provider.api_key)
            .with_timeout(self.provider.timeout_secs)
            .with_env_overrides(lookup)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_turns: self.agent.max_turns,
            transcript_dir: self
                .agent
                .transcript_dir
                .clone()
                .filter(|dir| !dir.as_os_str().is_empty()),
            ..AgentConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.plant_config().validate()?;
        if self.agent.max_turns == 0 {
            return Err(Error::config_invalid("agent.max_turns", "must be at least 1"));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(Error::config_invalid("provider.base_url", "must not be empty"));
        }
        Ok(())
    }
}
