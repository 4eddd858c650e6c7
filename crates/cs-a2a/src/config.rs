//! Peer configuration
//!
//! The agents whose capability cards make up the directory. Derived from
//! `[agents]` by default, or read from a JSON/TOML peers file.

use serde::{Deserialize, Serialize};

use cs_core::agents::{CUSTOMER_INFO_AGENT, SUPPORT_AGENT};
use cs_core::{AgentsConfig, Error, Result};

/// One agent the orchestrator may delegate to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Agent name expected on the fetched card
    pub name: String,

    /// Base URL of the agent
    pub url: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PeerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
        }
    }
}

/// All configured peers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeersConfig {
    #[serde(default)]
    pub peers: Vec<PeerConfig>,
}

impl PeersConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The two specialists at their configured addresses
    pub fn from_agents_config(agents: &AgentsConfig) -> Self {
        Self {
            peers: vec![
                PeerConfig::new(CUSTOMER_INFO_AGENT, agents.customer_info_url()),
                PeerConfig::new(SUPPORT_AGENT, agents.support_url()),
            ],
        }
    }

    /// Load peers from a JSON file
    pub fn from_json_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read peers file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid peers JSON: {}", e)))
    }

    /// Load peers from a TOML file
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read peers file: {}", e)))?;

        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid peers TOML: {}", e)))
    }

    /// Load from the file named by `CS_PEERS_FILE`, else derive from `[agents]`
    pub fn load(agents: &AgentsConfig) -> Result<Self> {
        match std::env::var("CS_PEERS_FILE") {
            Ok(path) if path.ends_with(".json") => Self::from_json_file(&path),
            Ok(path) => Self::from_toml_file(&path),
            Err(_) => Ok(Self::from_agents_config(agents)),
        }
    }

    pub fn enabled_peers(&self) -> Vec<&PeerConfig> {
        self.peers.iter().filter(|p| p.enabled).collect()
    }

    pub fn add_peer(&mut self, peer: PeerConfig) {
        self.peers.push(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_agents_config() {
        let peers = PeersConfig::from_agents_config(&AgentsConfig::default());
        assert_eq!(peers.peers.len(), 2);
        assert_eq!(peers.peers[0].name, CUSTOMER_INFO_AGENT);
        assert_eq!(peers.peers[0].url, "http://127.0.0.1:9300");
        assert_eq!(peers.peers[1].url, "http://127.0.0.1:9301");
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "peers": [
                {"name": "support", "url": "http://support:9301"},
                {"name": "billing", "url": "http://billing:9302", "enabled": false}
            ]
        }"#;
        let config: PeersConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.peers.len(), 2);
        assert!(config.peers[0].enabled);
        assert_eq!(config.enabled_peers().len(), 1);
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[[peers]]
name = "customer_info"
url = "http://10.0.0.5:9300"
"#
        )
        .unwrap();

        let config = PeersConfig::from_toml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.peers, vec![PeerConfig::new("customer_info", "http://10.0.0.5:9300")]);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = PeersConfig::from_json_file("/nonexistent/peers.json").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
