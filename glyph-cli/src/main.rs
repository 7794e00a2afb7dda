use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use glyph_config::GlyphConfig;
use glyph_crypto::Identity;

#[derive(Parser)]
#[command(name = "glyph", version, about = "Glyph gateway/node/client CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the metering gateway
    Gateway {
        #[arg(long, default_value = glyph_config::DEFAULT_CONFIG_FILENAME)]
        config: PathBuf,
    },
    /// Run a synthetic inference node
    Node {
        #[arg(long, default_value = glyph_config::DEFAULT_CONFIG_FILENAME)]
        config: PathBuf,
    },
    /// Submit one inference request to a gateway
    Client {
        #[arg(long, env = "GLYPH_GATEWAY_URL", default_value = "http://127.0.0.1:8000")]
        gateway_url: String,
        /// Account to bill; omit for a best-effort, unbilled request.
        #[arg(long)]
        user_pubkey: Option<String>,
        #[arg(long)]
        prompt: String,
    },
    /// Anchor or execute an epoch's on-chain mint
    Minter {
        #[command(subcommand)]
        cmd: MinterCmd,
    },
    /// Set the gateway's configured mint token
    ConfigureToken {
        #[arg(long, env = "GLYPH_GATEWAY_URL", default_value = "http://127.0.0.1:8000")]
        gateway_url: String,
        #[arg(long)]
        token_address: String,
        #[arg(long)]
        token_network: String,
        #[arg(long)]
        rpc_url: Option<String>,
    },
}

#[derive(Subcommand)]
enum MinterCmd {
    Anchor {
        #[arg(long, env = "GLYPH_GATEWAY_URL", default_value = "http://127.0.0.1:8000")]
        gateway_url: String,
        #[arg(long)]
        epoch_id: String,
    },
    Execute {
        #[arg(long, env = "GLYPH_GATEWAY_URL", default_value = "http://127.0.0.1:8000")]
        gateway_url: String,
        #[arg(long)]
        epoch_id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    if let Err(err) = run() {
        eprintln!("\u{274c} {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Gateway { config } => rt.block_on(run_gateway(config)),
        Commands::Node { config } => rt.block_on(run_node(config)),
        Commands::Client {
            gateway_url,
            user_pubkey,
            prompt,
        } => rt.block_on(run_client(gateway_url, user_pubkey, prompt)),
        Commands::Minter { cmd } => rt.block_on(run_minter(cmd)),
        Commands::ConfigureToken {
            gateway_url,
            token_address,
            token_network,
            rpc_url,
        } => rt.block_on(configure_token(gateway_url, token_address, token_network, rpc_url)),
    }
}

async fn run_gateway(config_path: PathBuf) -> Result<()> {
    let cfg = GlyphConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let identity = Identity::load_or_create(std::path::Path::new(&cfg.gateway.identity_path))?;
    let state = glyph_gateway::build_state(&cfg.gateway, identity)?;
    glyph_gateway::serve(&cfg.gateway.listen_addr, state).await
}

async fn run_node(config_path: PathBuf) -> Result<()> {
    let cfg = GlyphConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let identity = Identity::load_or_create(std::path::Path::new(&cfg.node.identity_path))?;
    let state = glyph_node::NodeState {
        identity: std::sync::Arc::new(identity),
    };
    glyph_node::serve(&cfg.node.listen_addr, state).await
}

async fn run_client(gateway_url: String, user_pubkey: Option<String>, prompt: String) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/inference", gateway_url.trim_end_matches('/')))
        .json(&serde_json::json!({ "user_pubkey": user_pubkey, "prompt": prompt }))
        .send()
        .await?
        .error_for_status()?
        .json::<serde_json::Value>()
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_minter(cmd: MinterCmd) -> Result<()> {
    let client = reqwest::Client::new();
    let (gateway_url, route, epoch_id) = match cmd {
        MinterCmd::Anchor { gateway_url, epoch_id } => (gateway_url, "mint/anchor", epoch_id),
        MinterCmd::Execute { gateway_url, epoch_id } => (gateway_url, "mint/execute", epoch_id),
    };
    let response = client
        .post(format!("{}/{route}", gateway_url.trim_end_matches('/')))
        .json(&serde_json::json!({ "epoch_id": epoch_id }))
        .send()
        .await?
        .error_for_status()?
        .json::<serde_json::Value>()
        .await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn configure_token(
    gateway_url: String,
    token_address: String,
    token_network: String,
    rpc_url: Option<String>,
) -> Result<()> {
    let client = reqwest::Client::new();
    client
        .post(format!("{}/config/token", gateway_url.trim_end_matches('/')))
        .json(&serde_json::json!({
            "token_address": token_address,
            "token_network": token_network,
            "rpc_url": rpc_url,
        }))
        .send()
        .await?
        .error_for_status()?;
    println!("token address set to {token_address} on {token_network}");
    Ok(())
}
