//! ChainWatch CLI: stream decoded contract events and query chain nodes.
//!
//! # Commands
//! ```text
//! chainwatch run          --endpoint <url>... [--abi <path>] [--contract <addr>...]
//! chainwatch decode-log   --topics <hex>... --data <hex> [--abi <path>]
//! chainwatch signature    "Transfer(address,address,uint256)"
//! chainwatch block-number --endpoint <url>...
//! chainwatch call         --endpoint <url>... --to <addr> --function <name> [--args <value>...]
//! chainwatch receipt      --endpoint <url>... --hash <tx>
//! chainwatch send-raw     --endpoint <url>... --tx <hex>
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256};
use anyhow::{anyhow, bail, Context, Result};
use chainwatch_abi::{LogDecoder, ParamValue};
use chainwatch_core::{NodePool, RawLog};
use chainwatch_stream::Subsystem;
use clap::{Args, Parser, Subcommand};
use tokio::signal;

mod config;
mod dialer;
mod logging;

use config::{FileConfig, Overrides};
use dialer::SchemeDialer;

#[derive(Parser)]
#[command(
    name = "chainwatch",
    about = "Resilient EVM event streaming with a local query surface",
    long_about = "
ChainWatch: subscribe to contract events over a pool of EVM nodes, decode
them against a contract ABI and serve the most recent ones over HTTP.

ENVIRONMENT VARIABLES:
  CHAINWATCH_CONFIG      Path to a YAML config file
  CHAINWATCH_ENDPOINTS   Comma-separated node URLs (ws://, wss://, http://, https://)
  CHAINWATCH_LISTEN      Query surface bind address
  RUST_LOG               Log filter, overrides --log-level
",
    version
)]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true, env = "CHAINWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Default log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit JSON logs
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct NodeArgs {
    /// Node endpoint, in failover order (repeatable)
    #[arg(short, long = "endpoint", env = "CHAINWATCH_ENDPOINTS", value_delimiter = ',')]
    endpoints: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream, decode and serve events until Ctrl+C / SIGTERM
    Run {
        #[command(flatten)]
        nodes: NodeArgs,
        /// Query surface bind address
        #[arg(long, env = "CHAINWATCH_LISTEN")]
        listen: Option<SocketAddr>,
        /// Number of decoded events to keep
        #[arg(long)]
        capacity: Option<usize>,
        /// Contract to watch (repeatable)
        #[arg(long = "contract")]
        contracts: Vec<Address>,
        /// Contract ABI JSON (default: built-in ERC-20)
        #[arg(long)]
        abi: Option<PathBuf>,
        /// Do not subscribe to new block headers
        #[arg(long)]
        no_headers: bool,
    },

    /// Decode one raw log against an ABI
    #[command(name = "decode-log")]
    DecodeLog {
        /// topics[0] = event signature hash, topics[1..] = indexed params
        #[arg(long, num_args = 1..)]
        topics: Vec<B256>,
        /// Non-indexed params (hex, 0x-prefixed)
        #[arg(long, default_value = "0x")]
        data: Bytes,
        /// Emitting contract
        #[arg(long, default_value_t = Address::ZERO)]
        address: Address,
        /// Contract ABI JSON (default: built-in ERC-20)
        #[arg(long)]
        abi: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the topic hash and selector of a canonical signature
    Signature {
        /// e.g. "Transfer(address,address,uint256)"
        signature: String,
    },

    /// Latest block number from the first live node
    #[command(name = "block-number")]
    BlockNumber {
        #[command(flatten)]
        nodes: NodeArgs,
    },

    /// eth_call a read-only function and decode its outputs
    Call {
        #[command(flatten)]
        nodes: NodeArgs,
        /// Contract address
        #[arg(long)]
        to: Address,
        /// Function name in the ABI
        #[arg(long)]
        function: String,
        /// Arguments in declaration order
        #[arg(long, num_args = 0..)]
        args: Vec<String>,
        /// Contract ABI JSON (default: built-in ERC-20)
        #[arg(long)]
        abi: Option<PathBuf>,
    },

    /// Fetch a transaction receipt
    Receipt {
        #[command(flatten)]
        nodes: NodeArgs,
        /// Transaction hash
        #[arg(long)]
        hash: B256,
    },

    /// Broadcast a signed raw transaction through the primary node
    #[command(name = "send-raw")]
    SendRaw {
        #[command(flatten)]
        nodes: NodeArgs,
        /// Signed transaction (hex, 0x-prefixed)
        #[arg(long)]
        tx: Bytes,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut file = FileConfig::load(cli.config.as_deref())?;
    file.apply(Overrides {
        log_level: cli.log_level,
        log_json: cli.log_json,
        ..Overrides::default()
    });

    match cli.command {
        Commands::Run { nodes, listen, capacity, contracts, abi, no_headers } => {
            file.apply(Overrides {
                endpoints: nodes.endpoints,
                listen,
                capacity,
                contracts,
                abi,
                no_headers,
                ..Overrides::default()
            });
            logging::init_tracing(&file.log)?;
            cmd_run(file).await
        }

        Commands::DecodeLog { topics, data, address, abi, json } => {
            logging::init_tracing(&file.log)?;
            cmd_decode_log(topics, data, address, abi.or(file.abi), json)
        }

        Commands::Signature { signature } => cmd_signature(&signature),

        Commands::BlockNumber { nodes } => {
            logging::init_tracing(&file.log)?;
            let pool = connect(&nodes, &file).await?;
            let result = pool.block_number().await;
            pool.close().await;
            println!("{}", result?);
            Ok(())
        }

        Commands::Call { nodes, to, function, args, abi } => {
            logging::init_tracing(&file.log)?;
            let pool = connect(&nodes, &file).await?;
            let result = cmd_call(&pool, to, &function, &args, abi.or(file.abi)).await;
            pool.close().await;
            result
        }

        Commands::Receipt { nodes, hash } => {
            logging::init_tracing(&file.log)?;
            let pool = connect(&nodes, &file).await?;
            let result = pool.transaction_receipt(hash).await;
            pool.close().await;
            match result? {
                Some(receipt) => println!("{}", serde_json::to_string_pretty(&receipt)?),
                None => bail!("no receipt for {hash} (pending or unknown)"),
            }
            Ok(())
        }

        Commands::SendRaw { nodes, tx } => {
            logging::init_tracing(&file.log)?;
            let pool = connect(&nodes, &file).await?;
            let result = pool.send_raw_transaction(tx).await;
            pool.close().await;
            println!("{}", result?);
            Ok(())
        }
    }
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_run(file: FileConfig) -> Result<()> {
    let interface = file.interface()?;
    let grace = file.subsystem.shutdown_grace();
    let dialer = Arc::new(SchemeDialer::default());

    let subsystem = Subsystem::start(file.subsystem, interface, dialer)
        .await
        .context("failed to start chainwatch")?;
    println!("chainwatch listening on http://{}", subsystem.local_addr());

    let stop = subsystem.shutdown_handle();
    tokio::select! {
        _ = shutdown_signal() => tracing::info!("shutdown signal received"),
        _ = stop.wait() => {}
    }
    subsystem.shutdown(grace).await;
    Ok(())
}

fn cmd_decode_log(topics: Vec<B256>, data: Bytes, address: Address, abi: Option<PathBuf>, as_json: bool) -> Result<()> {
    let interface = config::load_interface(abi.as_deref())?;
    let decoder = LogDecoder::new(Arc::new(interface));
    let topic0 = topics.first().copied();

    let log = RawLog {
        address,
        topics,
        data,
        block_number: 0,
        transaction_hash: B256::ZERO,
        log_index: 0,
        removed: false,
    };
    let decoded = decoder
        .decode(&log)?
        .ok_or_else(|| match topic0 {
            Some(topic) => anyhow!("no event in the interface has signature hash {topic}"),
            None => anyhow!("log has no topics"),
        })?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
    } else {
        println!("Event:     {}", decoded.name);
        println!("Signature: {}", decoded.signature);
        println!("Parameters:");
        for (name, value) in &decoded.parameters {
            println!("  {name}: {} = {value}", value.kind());
        }
    }
    Ok(())
}

fn cmd_signature(signature: &str) -> Result<()> {
    let signature = signature.trim();
    if !signature.contains('(') || !signature.ends_with(')') {
        bail!("expected a canonical signature like 'Transfer(address,address,uint256)'");
    }
    println!("topic0:   {}", chainwatch_abi::signature::signature_hash(signature));
    println!("selector: 0x{}", hex::encode(chainwatch_abi::signature::selector(signature)));
    Ok(())
}

async fn cmd_call(pool: &NodePool, to: Address, function: &str, args: &[String], abi: Option<PathBuf>) -> Result<()> {
    let interface = config::load_interface(abi.as_deref())?;
    let spec = interface.function(function)?;
    if args.len() != spec.inputs.len() {
        bail!("{} takes {} arguments, got {}", spec.signature(), spec.inputs.len(), args.len());
    }
    let values = spec
        .inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| ParamValue::parse(param.ty, arg))
        .collect::<Result<Vec<_>, _>>()?;

    let output = pool.call(to, spec.encode_input(&values)?).await?;
    let decoded = spec.decode_output(&output)?;
    println!("{}", serde_json::to_string_pretty(&decoded)?);
    Ok(())
}

/// Connect a pool from `--endpoint` flags, falling back to the config file.
async fn connect(nodes: &NodeArgs, file: &FileConfig) -> Result<NodePool> {
    let endpoints = if nodes.endpoints.is_empty() {
        &file.subsystem.endpoints
    } else {
        &nodes.endpoints
    };
    if endpoints.is_empty() {
        bail!("no endpoints given (use --endpoint or CHAINWATCH_ENDPOINTS)");
    }
    Ok(NodePool::connect(&SchemeDialer::default(), endpoints).await?)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_accepts_repeated_and_comma_separated_endpoints() {
        let cli = Cli::try_parse_from([
            "chainwatch",
            "run",
            "--endpoint",
            "wss://a.example/ws,wss://b.example/ws",
            "-e",
            "https://c.example",
            "--contract",
            "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            "--no-headers",
        ])
        .unwrap();
        let Commands::Run { nodes, contracts, no_headers, .. } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(nodes.endpoints, ["wss://a.example/ws", "wss://b.example/ws", "https://c.example"]);
        assert_eq!(contracts.len(), 1);
        assert!(no_headers);
    }

    #[test]
    fn decode_log_prints_builtin_transfer() {
        let sig = chainwatch_abi::signature::signature_hash("Transfer(address,address,uint256)");
        let from = Address::repeat_byte(1).into_word();
        let to = Address::repeat_byte(2).into_word();
        let data = Bytes::from(alloy_primitives::U256::from(10).to_be_bytes::<32>().to_vec());
        cmd_decode_log(vec![sig, from, to], data, Address::ZERO, None, true).unwrap();
    }

    #[test]
    fn decode_log_rejects_unknown_signature() {
        let err = cmd_decode_log(vec![B256::repeat_byte(9)], Bytes::new(), Address::ZERO, None, false).unwrap_err();
        assert!(err.to_string().contains("no event"));
    }

    #[test]
    fn signature_requires_parentheses() {
        assert!(cmd_signature("Transfer").is_err());
        assert!(cmd_signature("Transfer(address,address,uint256)").is_ok());
    }
}
