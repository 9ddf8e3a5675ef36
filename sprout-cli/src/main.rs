//! # Sprout CLI
//!
//! Command-line interface for the plant watering engine.
//!
//! Usage:
//!   sprout ask [PROMPT]
//!   sprout status
//!   sprout water
//!   sprout tools
//!
//! Examples:
//!   sprout ask "Does my plant need water?"
//!   sprout --config sprout.toml status
//!   sprout --voltage 3.0 --json-logs water

mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::SproutConfig;
use sprout_agent::{Agent, AgentResult, OpenAIProvider};
use sprout_engine::hardware::{ConstantVoltage, RecordingMotor};
use sprout_engine::{FileStore, Plant, SharedPlant, SystemClock, ToolTable};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sprout")]
#[command(author, version, about = "Sprout - let a model decide when your plant gets water")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "SPROUT_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Voltage reported by the bench sensor
    #[arg(long, global = true, default_value_t = 2.25)]
    voltage: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask the model about the plant and let it use the tools
    Ask {
        /// Question for the model (default: "Does my plant need water?")
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show type, moisture and watering history
    Status,
    /// Water the plant once, without asking the model
    Water,
    /// List the tools exposed to the model
    Tools,
}

fn init_logging(cli: &Cli, config: &SproutConfig) {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    if cli.json_logs || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_plant(config: &SproutConfig, voltage: f64) -> anyhow::Result<SharedPlant> {
    let store = FileStore::new(&config.plant.state_dir)
        .with_context(|| format!("cannot use state dir {}", config.plant.state_dir.display()))?;
    let plant = Plant::new(
        &config.plant_config(),
        ConstantVoltage(voltage),
        RecordingMotor::new(),
        store,
        Arc::new(SystemClock),
    )?;
    info!(
        plant = %plant.name(),
        plant_type = %plant.plant_type(),
        last_watered = %plant.last_watered(),
        "plant ready"
    );
    Ok(Arc::new(Mutex::new(plant)))
}

fn truncate(s: &str, max_len: usize) -> String {
    match s.char_indices().nth(max_len) {
        None => s.to_string(),
        Some((idx, _)) => format!("{}…", &s[..idx]),
    }
}

async fn run_ask(config: &SproutConfig, plant: SharedPlant, prompt: &str) -> anyhow::Result<()> {
    let provider = OpenAIProvider::new(config.provider_config(|key| std::env::var(key).ok()))?;
    let agent = Agent::with_config(provider, ToolTable::for_plant(plant), config.agent_config());

    println!("> {}\n", prompt);
    let result = agent.run(prompt).await?;
    print_session(&result);
    Ok(())
}

fn print_session(result: &AgentResult) {
    for invocation in &result.invocations {
        let marker = if invocation.ok { "ok" } else { "failed" };
        println!(
            "   {} [{}] -> {}",
            invocation.name,
            marker,
            truncate(&invocation.output, 60)
        );
    }
    if !result.invocations.is_empty() {
        println!();
    }

    println!("{}", result.summary);

    if !result.terminated {
        eprintln!("\n(stopped after the turn limit without TERMINATE)");
    }
    if let Some(path) = &result.transcript_path {
        eprintln!("Transcript: {}", path.display());
    }
    eprintln!(
        "Tokens: {} prompt, {} completion over {} calls",
        result.usage.total_prompt_tokens,
        result.usage.total_completion_tokens,
        result.usage.total_calls
    );
}

fn run_status(plant: &SharedPlant) -> anyhow::Result<()> {
    let mut plant = plant
        .lock()
        .map_err(|_| anyhow::anyhow!("plant lock poisoned"))?;
    let moisture = plant.moisture_level()?;

    println!("Plant:         {}", plant.name());
    println!("Type:          {}", plant.plant_type());
    println!("Moisture:      {}", moisture);
    println!("Last watered:  {}", plant.last_watered());
    match plant.days_since_last_watered() {
        -1 => println!("Days since:    never"),
        days => println!("Days since:    {}", days),
    }
    Ok(())
}

fn run_water(plant: &SharedPlant) -> anyhow::Result<()> {
    let mut plant = plant
        .lock()
        .map_err(|_| anyhow::anyhow!("plant lock poisoned"))?;
    plant.water()?;
    println!("Watered {} on {}", plant.name(), plant.last_watered());
    Ok(())
}

fn run_tools(plant: SharedPlant) {
    let tools = ToolTable::for_plant(plant);
    println!("Available tools ({}):\n", tools.len());
    for tool in tools.iter() {
        println!("  {:<26} {}", tool.name(), tool.description());
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SproutConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&cli, &config);
    debug!(config = ?cli.config, voltage = cli.voltage, "configuration loaded");

    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let plant = match build_plant(&config, cli.voltage) {
        Ok(plant) => plant,
        Err(e) => {
            eprintln!("Failed to set up plant: {:#}", e);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Commands::Ask { prompt } => {
            let prompt = if prompt.is_empty() {
                config.agent.prompt.clone()
            } else {
                prompt.join(" ")
            };
            run_ask(&config, plant, &prompt).await
        }
        Commands::Status => run_status(&plant),
        Commands::Water => run_water(&plant),
        Commands::Tools => {
            run_tools(plant);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
