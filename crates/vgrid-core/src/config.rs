//! vgrid.toml node configuration parser.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: Option<NodeSection>,
    pub mgmt: Option<MgmtSection>,
    pub dispatch: Option<DispatchSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSection {
    pub private_ip: Option<Ipv4Addr>,
    pub data_dir: Option<PathBuf>,
    /// Whether this coordinator starts as the cluster master.
    pub master: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MgmtSection {
    pub status_interval: Option<String>,
    pub balance_delay: Option<String>,
    pub drop_check_delay: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSection {
    pub mode: Option<DispatchMode>,
    pub queue_capacity: Option<usize>,
}

/// How the coordinator hands control messages to workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Synchronous in-process callback.
    Direct,
    /// Single-consumer work queue.
    #[default]
    Queued,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
}

pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_BALANCE_DELAY: Duration = Duration::from_secs(15);
pub const DEFAULT_DROP_CHECK_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

impl NodeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn private_ip(&self) -> Ipv4Addr {
        self.node
            .as_ref()
            .and_then(|n| n.private_ip)
            .unwrap_or(Ipv4Addr::LOCALHOST)
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.node.as_ref().and_then(|n| n.data_dir.as_deref())
    }

    pub fn is_master(&self) -> bool {
        self.node.as_ref().and_then(|n| n.master).unwrap_or(true)
    }

    pub fn status_interval(&self) -> Result<Duration, ConfigError> {
        self.mgmt_duration(|m| m.status_interval.as_deref(), DEFAULT_STATUS_INTERVAL)
    }

    pub fn balance_delay(&self) -> Result<Duration, ConfigError> {
        self.mgmt_duration(|m| m.balance_delay.as_deref(), DEFAULT_BALANCE_DELAY)
    }

    pub fn drop_check_delay(&self) -> Result<Duration, ConfigError> {
        self.mgmt_duration(|m| m.drop_check_delay.as_deref(), DEFAULT_DROP_CHECK_DELAY)
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.dispatch
            .as_ref()
            .and_then(|d| d.mode)
            .unwrap_or_default()
    }

    pub fn queue_capacity(&self) -> usize {
        self.dispatch
            .as_ref()
            .and_then(|d| d.queue_capacity)
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    fn mgmt_duration(
        &self,
        field: impl Fn(&MgmtSection) -> Option<&str>,
        default: Duration,
    ) -> Result<Duration, ConfigError> {
        match self.mgmt.as_ref().and_then(field) {
            Some(s) => parse_duration(s),
            None => Ok(default),
        }
    }
}

/// Parse a duration string like "5s", "500ms", "1m", or a bare number of seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let t = s.trim();
    let parsed = if let Some(ms) = t.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = t.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = t.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        t.parse::<u64>().ok().map(Duration::from_secs)
    };
    parsed.ok_or_else(|| ConfigError::InvalidDuration(s.to_string()))
}
