//! Node configuration: an immutable value built once at startup and passed
//! explicitly to the node, scanner, and mempool tracker — no global
//! singleton (spec §9 calls this out directly).
//!
//! Loadable from a TOML file via `Config::from_file`, or assembled from CLI
//! flags via `Config::from_args`. The CLI front-end itself is out of scope;
//! this only exposes the library surface a CLI would need.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::types::{hash_from_hex, Hash};

/// The three Elements-family networks this client recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    /// Maps the configuration-facing network name table from spec §6.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "liquid" => Some(Network::Mainnet),
            "liquid-testnet" => Some(Network::Testnet),
            "nigiri" => Some(Network::Regtest),
            _ => None,
        }
    }

    /// Wire-order magic bytes for this network (spec §6).
    pub fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => [0xfa, 0xbf, 0xb5, 0xda],
            Network::Testnet => [0x41, 0x0e, 0xdd, 0x62],
            Network::Regtest => [0x12, 0x34, 0x56, 0x78],
        }
    }

    /// Checkpoint genesis hash, as displayed (big-endian hex, per spec §6).
    pub fn genesis_hash_hex(self) -> &'static str {
        match self {
            Network::Mainnet => {
                "1466275836220db2944ca059a3a10ef6fd2ea684b0688d2c379296888a206003"
            }
            Network::Testnet => {
                "a771da8e52ee6ad581ed1e9a99825e5b3b7992225534eaa2ae23244fe26ab1c1"
            }
            Network::Regtest => {
                "00902a6b70c2ca83b5d9c815d96a0e2f4202179316970d14ea1847dae5b1ca21"
            }
        }
    }

    pub fn genesis_hash(self) -> Hash {
        hash_from_hex(self.genesis_hash_hex())
            .expect("checkpoint genesis hash hex is a valid fixed constant")
    }
}

/// Logging configuration, consumed by `utils::init_logging_from_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` spec, e.g. "info" or
    /// "elements_spv=debug,elements_spv::network=trace". `RUST_LOG` always
    /// takes precedence when set.
    pub filter: Option<String>,
    /// Emit structured JSON log lines instead of the human-readable
    /// default (requires the `json-logging` feature).
    #[serde(default)]
    pub json_format: bool,
}

/// Keepalive and timeout knobs (spec §5): ping interval, pong deadline,
/// block-service HTTP timeout, mempool TTL and sweep interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    pub ping_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub block_service_timeout_secs: u64,
    pub mempool_ttl_secs: u64,
    pub mempool_sweep_interval_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 120,
            pong_timeout_secs: 60,
            block_service_timeout_secs: 15,
            mempool_ttl_secs: 300,
            mempool_sweep_interval_secs: 60,
        }
    }
}

/// Top-level, immutable node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    /// `host:port` of the initial peer to dial.
    pub peer_addr: String,
    /// Base URL of the out-of-band block-fetch HTTP service, e.g.
    /// `http://localhost:3001`. `GET {base}/block/{hex_hash}/raw`.
    pub block_service_url: String,
    /// `user_agent` advertised in the outbound `version` message.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    /// Directory for any local state this client keeps (unused by the
    /// in-memory storage backend; carried for future persistent backends).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_user_agent() -> String {
    "/elements-spv:0.1/".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown network {0:?}; expected one of liquid, liquid-testnet, nigiri")]
    UnknownNetwork(String),
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),
}

impl Config {
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let contents =
            std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse(path, e))
    }

    /// Thin CLI scaffolding: the CLI front-end itself is out of scope, but
    /// a library consumer assembling one can lean on this.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        let network = Network::from_name(&args.network)
            .ok_or_else(|| ConfigError::UnknownNetwork(args.network.clone()))?;
        Ok(Config {
            network,
            peer_addr: args.peer_addr,
            block_service_url: args.block_service_url,
            user_agent: default_user_agent(),
            logging: LoggingConfig {
                filter: args.log_filter,
                json_format: args.json_logging,
            },
            timeouts: TimeoutsConfig::default(),
            data_dir: args.data_dir,
        })
    }
}

#[derive(Parser, Debug)]
#[command(name = "elements-spv", about = "Neutrino-style SPV client for Elements sidechains")]
struct CliArgs {
    /// One of: liquid, liquid-testnet, nigiri
    #[arg(long, default_value = "nigiri")]
    network: String,
    #[arg(long)]
    peer_addr: String,
    #[arg(long)]
    block_service_url: String,
    #[arg(long)]
    log_filter: Option<String>,
    #[arg(long, default_value_t = false)]
    json_logging: bool,
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_name_table_matches_spec() {
        assert_eq!(Network::from_name("liquid"), Some(Network::Mainnet));
        assert_eq!(Network::from_name("liquid-testnet"), Some(Network::Testnet));
        assert_eq!(Network::from_name("nigiri"), Some(Network::Regtest));
        assert_eq!(Network::from_name("mainnet"), None);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config {
            network: Network::Regtest,
            peer_addr: "127.0.0.1:18886".to_string(),
            block_service_url: "http://localhost:3001".to_string(),
            user_agent: default_user_agent(),
            logging: LoggingConfig {
                filter: Some("debug".to_string()),
                json_format: false,
            },
            timeouts: TimeoutsConfig::default(),
            data_dir: PathBuf::from("data"),
        };
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.peer_addr, config.peer_addr);
        assert_eq!(deserialized.network, config.network);
    }

    #[test]
    fn genesis_hash_hex_round_trips_to_wire_order() {
        for network in [Network::Mainnet, Network::Testnet, Network::Regtest] {
            let hash = network.genesis_hash();
            assert_eq!(crate::types::hash_to_hex(&hash), network.genesis_hash_hex());
        }
    }
}
