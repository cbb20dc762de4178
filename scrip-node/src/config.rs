//! Node configuration: a TOML file plus per-network consensus presets.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("bad api listen address: {0}")]
    BadListenAddr(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub testnet: bool,
    /// Seconds between tip polls once caught up.
    pub poll_interval: u64,

    /// Chain full-node JSON-RPC endpoint.
    pub backend_url: String,
    pub backend_user: String,
    pub backend_password: String,

    /// Our own JSON-RPC surface.
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: String,
    pub rpc_password: String,

    /// Compose payloads as bare multisig rather than OP_RETURN.
    pub multisig: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("scrip-data"),
            testnet: false,
            poll_interval: 2,
            backend_url: "http://localhost:8332".into(),
            backend_user: "rpc".into(),
            backend_password: "rpc".into(),
            rpc_host: "127.0.0.1".into(),
            rpc_port: 4000,
            rpc_user: "rpc".into(),
            rpc_password: "rpc".into(),
            multisig: true,
        }
    }
}

/// Consensus constants fixed per network.
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub block_first: u32,
    pub burn_start: u32,
    pub burn_end: u32,
    pub prefix: Vec<u8>,
    pub address_version: u8,
    pub unspendable: String,
}

/// Magic bytes every non-burn payload must start with.
pub const PREFIX: &[u8] = b"SCRIPTAG";

impl NetworkParams {
    pub fn mainnet() -> Self {
        NetworkParams {
            block_first: 278_270,
            burn_start: 278_310,
            burn_end: 283_810,
            prefix: PREFIX.to_vec(),
            address_version: 0x00,
            // Pay-to-zero-hash; provably unspendable.
            unspendable: "1111111111111111111114oLvT2".into(),
        }
    }

    pub fn testnet() -> Self {
        NetworkParams {
            block_first: 150_000,
            burn_start: 150_000,
            burn_end: 4_017_708,
            prefix: PREFIX.to_vec(),
            address_version: 0x6f,
            unspendable: "mfWxJ45yp2SFn7UciZyNpvDKrzbhyfKrY8".into(),
        }
    }
}

impl Config {
    /// Loads the file when given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            None => Ok(Config::default()),
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                Ok(toml::from_str(&raw)?)
            }
        }
    }

    pub fn network(&self) -> NetworkParams {
        if self.testnet {
            NetworkParams::testnet()
        } else {
            NetworkParams::mainnet()
        }
    }

    /// Database file, versioned by major schema number so incompatible
    /// stores never mix.
    pub fn db_path(&self) -> PathBuf {
        let net = if self.testnet { ".testnet" } else { "" };
        self.data_dir
            .join(format!("scrip{net}.{}.db", scrip_ledger::DB_VERSION_MAJOR))
    }

    pub fn api_addr(&self) -> Result<SocketAddr, Error> {
        format!("{}:{}", self.rpc_host, self.rpc_port)
            .parse()
            .map_err(|_| Error::BadListenAddr(format!("{}:{}", self.rpc_host, self.rpc_port)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str("testnet = true\nrpc_port = 14000\n").unwrap();
        assert!(config.testnet);
        assert_eq!(config.rpc_port, 14_000);
        assert_eq!(config.poll_interval, 2);
    }

    #[test]
    fn db_path_carries_network_and_major_version() {
        let mut config = Config::default();
        assert!(config.db_path().to_string_lossy().ends_with("scrip.1.db"));
        config.testnet = true;
        assert!(config
            .db_path()
            .to_string_lossy()
            .ends_with("scrip.testnet.1.db"));
    }

    #[test]
    fn networks_use_distinct_address_versions() {
        assert_ne!(
            NetworkParams::mainnet().address_version,
            NetworkParams::testnet().address_version
        );
    }
}
