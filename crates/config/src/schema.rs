use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub identity: IdentityConfig,
    pub dispatch: DispatchConfig,
    pub adapters: AdaptersConfig,
    pub logging: LoggingConfig,
}

/// Who the bot is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Bot identity assumed for sources that don't carry one per event.
    pub self_id: String,
    /// Actor id treated as owner regardless of source-reported role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            self_id: "switchyard".to_string(),
            owner_id: None,
        }
    }
}

/// Routing-core tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Bound on remembered event ids, per deduplicator.
    pub dedup_capacity: usize,
    /// Claim sweep cadence, seconds.
    pub claim_sweep_interval_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: 1000,
            claim_sweep_interval_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptersConfig {
    pub console: ConsoleSection,
    pub wire: WireSection,
    pub device: DeviceSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSection {
    pub enabled: bool,
    /// Actor id attributed to console input.
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Default for ConsoleSection {
    fn default() -> Self {
        Self {
            enabled: true,
            user_id: "1".to_string(),
            display_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireSection {
    pub enabled: bool,
    pub queue_capacity: usize,
}

impl Default for WireSection {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub enabled: bool,
    pub queue_capacity: usize,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            enabled: false,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error).
    pub level: String,
    /// Emit JSON logs instead of human-readable output.
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
