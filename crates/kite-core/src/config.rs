use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::state::DEFAULT_LOG_CAPACITY;
use crate::state::DEFAULT_THEME_COLOR;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub display: DisplayConfig,
    pub actions: ActionsConfig,
    pub journal: JournalConfig,
}

impl Config {
    pub fn from_yaml_str(input: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(input)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub agent_name: String,
    pub log_capacity: usize,
    /// How many resolved invocation ids are remembered for duplicate
    /// detection. Once an id is evicted, an agent that re-sends it gets the
    /// invocation dispatched again and a second result relayed.
    pub archive_capacity: usize,
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_name: "my_agent".to_string(),
            log_capacity: DEFAULT_LOG_CAPACITY,
            archive_capacity: 256,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme_color: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme_color: DEFAULT_THEME_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ActionsConfig {
    /// Latent (disabled) capabilities the host enables at session start.
    pub enable: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct JournalConfig {
    pub enabled: bool,
    pub path: Option<PathBuf>,
}
