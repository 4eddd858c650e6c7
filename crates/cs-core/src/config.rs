//! Configuration management
//!
//! Settings are resolved in this order of precedence:
//! 1. Environment variables (`CS_*`)
//! 2. `cs-mesh.toml` configuration file
//! 3. Built-in defaults
//!
//! `${VAR_NAME}` references inside the configuration file are expanded from
//! the environment before parsing.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::Error;

/// Default configuration file name
pub const CONFIG_FILE: &str = "cs-mesh.toml";

/// Main configuration for the mesh
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub delegation: DelegationConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Reset the database and load demo data at startup
    #[serde(default = "default_seed")]
    pub seed: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            seed: default_seed(),
        }
    }
}

/// Tool gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Per-call timeout for specialist → gateway requests
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Listen addresses of the agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_customer_info_port")]
    pub customer_info_port: u16,

    #[serde(default = "default_support_port")]
    pub support_port: u16,

    #[serde(default = "default_orchestrator_port")]
    pub orchestrator_port: u16,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            customer_info_port: default_customer_info_port(),
            support_port: default_support_port(),
            orchestrator_port: default_orchestrator_port(),
        }
    }
}

impl AgentsConfig {
    pub fn customer_info_url(&self) -> String {
        format!("http://{}:{}", self.host, self.customer_info_port)
    }

    pub fn support_url(&self) -> String {
        format!("http://{}:{}", self.host, self.support_port)
    }

    pub fn orchestrator_url(&self) -> String {
        format!("http://{}:{}", self.host, self.orchestrator_port)
    }
}

/// Orchestrator → specialist delegation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    /// Per-step timeout for inter-agent calls
    #[serde(default = "default_delegation_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff between retries; attempt `n` waits `n * retry_backoff_ms`
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound on planning rounds per workflow
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Whether a step without an explicit flag aborts the workflow on failure
    #[serde(default = "default_load_bearing")]
    pub load_bearing_by_default: bool,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_delegation_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_rounds: default_max_rounds(),
            load_bearing_by_default: default_load_bearing(),
        }
    }
}

impl DelegationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn default_db_path() -> String {
    "data/cs-mesh.db".to_string()
}

fn default_seed() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_customer_info_port() -> u16 {
    9300
}

fn default_support_port() -> u16 {
    9301
}

fn default_orchestrator_port() -> u16 {
    9400
}

fn default_delegation_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_max_rounds() -> usize {
    8
}

fn default_load_bearing() -> bool {
    true
}

impl Config {
    /// Expand `${VAR_NAME}` references from the environment.
    ///
    /// Unset variables expand to an empty string.
    fn expand_env_vars(value: &str) -> String {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Ok(env_value) = std::env::var(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();

        let toml_content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let mut cfg = Self::from_toml_str(&toml_content)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Parse TOML content (after `${VAR}` expansion) without env overrides
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let expanded = Self::expand_env_vars(content);
        let toml: TomlConfig = toml::from_str(&expanded)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        Ok(Self::from_toml_config(toml))
    }

    /// Load from `./cs-mesh.toml` if present, otherwise from the environment
    pub fn load() -> crate::Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Load configuration from defaults plus environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn from_toml_config(toml: TomlConfig) -> Self {
        let store = toml.store.unwrap_or_default();
        let gateway = toml.gateway.unwrap_or_default();
        let agents = toml.agents.unwrap_or_default();
        let delegation = toml.delegation.unwrap_or_default();

        Config {
            store: StoreConfig {
                db_path: store.db_path.unwrap_or_else(default_db_path),
                seed: store.seed.unwrap_or_else(default_seed),
            },
            gateway: GatewayConfig {
                host: gateway.host.unwrap_or_else(default_host),
                port: gateway.port.unwrap_or_else(default_gateway_port),
                call_timeout_secs: gateway
                    .call_timeout_secs
                    .unwrap_or_else(default_call_timeout_secs),
            },
            agents: AgentsConfig {
                host: agents.host.unwrap_or_else(default_host),
                customer_info_port: agents
                    .customer_info_port
                    .unwrap_or_else(default_customer_info_port),
                support_port: agents.support_port.unwrap_or_else(default_support_port),
                orchestrator_port: agents
                    .orchestrator_port
                    .unwrap_or_else(default_orchestrator_port),
            },
            delegation: DelegationConfig {
                timeout_secs: delegation
                    .timeout_secs
                    .unwrap_or_else(default_delegation_timeout_secs),
                max_retries: delegation.max_retries.unwrap_or_else(default_max_retries),
                retry_backoff_ms: delegation
                    .retry_backoff_ms
                    .unwrap_or_else(default_retry_backoff_ms),
                max_rounds: delegation.max_rounds.unwrap_or_else(default_max_rounds),
                load_bearing_by_default: delegation
                    .load_bearing_by_default
                    .unwrap_or_else(default_load_bearing),
            },
        }
    }

    /// Environment variables take precedence over file values
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("CS_DB_PATH") {
            if !path.is_empty() {
                self.store.db_path = path;
            }
        }
        if let Ok(seed) = std::env::var("CS_SEED") {
            self.store.seed = seed.to_lowercase() != "false";
        }

        if let Ok(host) = std::env::var("CS_GATEWAY_HOST") {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }
        if let Some(port) = env_parse("CS_GATEWAY_PORT") {
            self.gateway.port = port;
        }
        if let Some(secs) = env_parse("CS_GATEWAY_TIMEOUT_SECS") {
            self.gateway.call_timeout_secs = secs;
        }

        if let Ok(host) = std::env::var("CS_AGENT_HOST") {
            if !host.is_empty() {
                self.agents.host = host;
            }
        }
        if let Some(port) = env_parse("CS_CUSTOMER_INFO_PORT") {
            self.agents.customer_info_port = port;
        }
        if let Some(port) = env_parse("CS_SUPPORT_PORT") {
            self.agents.support_port = port;
        }
        if let Some(port) = env_parse("CS_ORCHESTRATOR_PORT") {
            self.agents.orchestrator_port = port;
        }

        if let Some(secs) = env_parse("CS_DELEGATION_TIMEOUT_SECS") {
            self.delegation.timeout_secs = secs;
        }
        if let Some(retries) = env_parse("CS_MAX_RETRIES") {
            self.delegation.max_retries = retries;
        }
        if let Some(ms) = env_parse("CS_RETRY_BACKOFF_MS") {
            self.delegation.retry_backoff_ms = ms;
        }
        if let Some(rounds) = env_parse("CS_MAX_ROUNDS") {
            self.delegation.max_rounds = rounds;
        }
        if let Ok(flag) = std::env::var("CS_LOAD_BEARING_BY_DEFAULT") {
            self.delegation.load_bearing_by_default = flag.to_lowercase() != "false";
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

// ============================================================================
// TOML file structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TomlConfig {
    store: Option<TomlStoreConfig>,
    gateway: Option<TomlGatewayConfig>,
    agents: Option<TomlAgentsConfig>,
    delegation: Option<TomlDelegationConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlStoreConfig {
    db_path: Option<String>,
    seed: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlGatewayConfig {
    host: Option<String>,
    port: Option<u16>,
    call_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlAgentsConfig {
    host: Option<String>,
    customer_info_port: Option<u16>,
    support_port: Option<u16>,
    orchestrator_port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct TomlDelegationConfig {
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
    max_rounds: Option<usize>,
    load_bearing_by_default: Option<bool>,
}
