use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::channels::ChannelDescriptor;
use crate::core_types::Points;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub rewards: RewardConfig,
}

/// Where the three documents live
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    pub data_dir: String,
    pub users_document: String,
    pub orders_document: String,
    pub channels_document: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            users_document: "users".to_string(),
            orders_document: "orders".to_string(),
            channels_document: "channels".to_string(),
        }
    }
}

impl StoreConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RewardConfig {
    /// One-time points credited on a user's first start
    pub welcome_bonus: Points,
    /// Catalog entry seeded when the channels document is absent
    pub default_channel: ChannelDescriptor,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            welcome_bonus: 10,
            default_channel: ChannelDescriptor {
                id: -1001234567890,
                title: "Main Channel".to_string(),
                reward: 5,
                link: "https://t.me/main_channel".to_string(),
            },
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", config_path))
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }
}
