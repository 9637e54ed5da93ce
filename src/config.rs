//! Engine configuration and descriptor tree documents

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{DEFAULT_POLL_INTERVAL_MS, MAX_INFLIGHT_COMMANDS, VALID_TIME};
use crate::engine::{EngineOptions, Role};
use crate::entity::DescriptorTree;
use crate::error::ConfigError;
use crate::protocol::MacAddress;

/// Stream published when the entity acts as a Talker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSection {
    /// Unique ID of the stream output (and low 16 bits of its stream ID)
    pub unique_id: u16,
    pub dest_mac: MacAddress,
    pub vlan_id: u16,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            unique_id: 0,
            dest_mac: MacAddress([0x91, 0xE0, 0xF0, 0x00, 0x0E, 0x80]),
            vlan_id: 2,
        }
    }
}

/// Launcher configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Network interface carrying AVDECC traffic
    pub interface: String,
    pub role: Role,
    /// Descriptor tree document (`.toml` or `.json`)
    pub entity_file: PathBuf,
    pub poll_interval_ms: u64,
    pub valid_time: u8,
    pub inflight_capacity: usize,
    pub log_level: String,
    pub stream: Option<StreamSection>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".into(),
            role: Role::Both,
            entity_file: PathBuf::from("entity.toml"),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            valid_time: VALID_TIME,
            inflight_capacity: MAX_INFLIGHT_COMMANDS,
            log_level: "info".into(),
            stream: None,
        }
    }
}

impl EngineConfig {
    /// Read and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_document(path)?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Per-user configuration file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("org", "avdecc", "avdecc-entity").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "interface",
                reason: "must not be empty".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be at least 1".into(),
            });
        }
        if self.valid_time < 2 || self.valid_time > 62 {
            return Err(ConfigError::InvalidValue {
                field: "valid_time",
                reason: format!("{} is outside 2..=62 seconds", self.valid_time),
            });
        }
        if self.inflight_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "inflight_capacity",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Runtime subset handed to the engine
    pub fn to_options(&self) -> EngineOptions {
        EngineOptions {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            valid_time: self.valid_time,
            inflight_capacity: self.inflight_capacity,
        }
    }
}

/// Load a descriptor tree from a TOML or JSON document, chosen by extension
pub fn load_descriptor_tree(path: impl AsRef<Path>) -> Result<DescriptorTree, ConfigError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let parse_error = |reason: String| ConfigError::Parse {
        path: path.display().to_string(),
        reason,
    };

    let tree: DescriptorTree = match extension.as_str() {
        "toml" => toml::from_str(&read_document(path)?).map_err(|e| parse_error(e.to_string()))?,
        "json" => serde_json::from_str(&read_document(path)?).map_err(|e| parse_error(e.to_string()))?,
        _ => return Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    };

    tracing::debug!(
        "Loaded descriptor tree from {} ({} configuration(s))",
        path.display(),
        tree.configurations.len()
    );
    Ok(tree)
}

fn read_document(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
