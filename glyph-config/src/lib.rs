use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILENAME: &str = "glyph.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub listen_addr: String,
    pub ledger_path: String,
    pub identity_path: String,
    pub peers: Vec<String>,
    pub dht_ttl_secs: u64,
    pub quorum_threshold_default: u32,
    pub token_ticker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub listen_addr: String,
    pub identity_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinterConfig {
    pub rpc_url: String,
    pub contract_address: String,
    pub gateway_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlyphConfig {
    pub gateway: GatewayConfig,
    pub node: NodeConfig,
    pub minter: MinterConfig,
}

impl GlyphConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("GLYPH").separator("__"));
        let cfg = builder.build()?;
        Ok(cfg.try_deserialize()?)
    }

    pub fn example() -> Self {
        Self {
            gateway: GatewayConfig {
                listen_addr: "0.0.0.0:8000".into(),
                ledger_path: "./data/ledger".into(),
                identity_path: "./data/gateway_identity.key".into(),
                peers: vec![],
                dht_ttl_secs: 300,
                quorum_threshold_default: 1,
                token_ticker: "GLYPH".into(),
            },
            node: NodeConfig {
                listen_addr: "0.0.0.0:9000".into(),
                identity_path: "./data/node_identity.key".into(),
            },
            minter: MinterConfig {
                rpc_url: "https://rpc.example.invalid".into(),
                contract_address: "0x0000000000000000000000000000000000000000".into(),
                gateway_url: "http://127.0.0.1:8000".into(),
            },
        }
    }
}
