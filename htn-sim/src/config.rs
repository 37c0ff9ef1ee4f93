//! Simulation configuration, loaded from a YAML file.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use htn::DriverConfig;
use htn_core::Vec3;
use serde::{Deserialize, Serialize};

/// Top-level simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of ticks `run` simulates unless overridden on the command line
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Simulated seconds per tick
    #[serde(default = "default_dt")]
    pub dt_seconds: f32,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub player: PlayerConfig,

    /// Initial world facts, keyed by fact name
    #[serde(default)]
    pub facts: FactsConfig,

    /// Destinations handed out for `browse`
    #[serde(default = "default_stacks")]
    pub stacks: Vec<Vec3>,

    /// Destinations handed out for `wander`
    #[serde(default = "default_wander_points")]
    pub wander_points: Vec<Vec3>,

    /// Goal planned for when nothing else is viable
    #[serde(default = "default_fallback_goal")]
    pub fallback_goal: String,

    /// Driver and planner limits
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,

    #[serde(default)]
    pub position: Vec3,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            position: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub position: Vec3,

    /// Whether the agent can see the player at the start
    #[serde(default)]
    pub identified: bool,

    /// Tick at which the agent loses sight of the player, leaving a last-known location behind
    #[serde(default)]
    pub lose_sight_at_tick: Option<u64>,
}

/// Facts by name; names must be known to the domain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactsConfig {
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,

    #[serde(default)]
    pub values: BTreeMap<String, f32>,

    #[serde(default)]
    pub vectors: BTreeMap<String, Vec3>,
}

fn default_ticks() -> u64 {
    300
}
fn default_dt() -> f32 {
    0.1
}
fn default_agent_name() -> String {
    "barker".to_string()
}
fn default_fallback_goal() -> String {
    "idle".to_string()
}
fn default_stacks() -> Vec<Vec3> {
    vec![Vec3::new(400.0, 0.0, 0.0), Vec3::new(400.0, 300.0, 0.0)]
}
fn default_wander_points() -> Vec<Vec3> {
    vec![Vec3::new(-200.0, 100.0, 0.0), Vec3::new(0.0, -250.0, 0.0)]
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            ticks: default_ticks(),
            dt_seconds: default_dt(),
            agent: AgentConfig::default(),
            player: PlayerConfig::default(),
            facts: FactsConfig::default(),
            stacks: default_stacks(),
            wander_points: default_wander_points(),
            fallback_goal: default_fallback_goal(),
            driver: DriverConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load `path` if given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
