use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, U256};
use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};

use evm_gateway::config::{load_config, GatewayConfig};
use evm_gateway::contracts::{sol_value_to_json, ContractRegistry};
use evm_gateway::lifecycle::Gateway;
use evm_gateway::observability::logging;
use evm_gateway::transactions::CallRequest;
use evm_gateway::ChainClient;

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the EVM gateway", long_about = None)]
struct Cli {
    /// Config file (defaults to $GATEWAY_CONFIG, then config/gateway.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Target contract and method with string arguments.
#[derive(Args)]
struct CallTarget {
    /// Catalog alias or contract address
    target: String,
    method: String,
    /// Arguments, parsed using the method's ABI input types
    args: Vec<String>,
    /// ABI signature overriding the catalog (repeatable)
    #[arg(long = "abi")]
    abi: Vec<String>,
}

impl CallTarget {
    fn abi(&self) -> Option<&[String]> {
        (!self.abi.is_empty()).then_some(self.abi.as_slice())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show chain id, head block and gas price
    Status,
    /// Native balance of an address or catalog alias
    Balance { account: String },
    /// Call a view/pure method
    Call(CallTarget),
    /// Estimate the cost of a write without sending it
    Estimate {
        #[command(flatten)]
        call: CallTarget,
        /// Wei attached to the call
        #[arg(long, default_value = "0")]
        value: String,
    },
    /// Submit a contract write
    Send {
        #[command(flatten)]
        call: CallTarget,
        #[arg(long, default_value = "0")]
        value: String,
        #[arg(long)]
        gas_limit: Option<u64>,
        /// Legacy gas price in wei
        #[arg(long)]
        gas_price: Option<u128>,
        /// Wait for confirmation after sending
        #[arg(long)]
        wait: bool,
    },
    /// On-chain status of a transaction
    TxStatus { hash: TxHash },
    /// Wait for a transaction to confirm
    Wait {
        hash: TxHash,
        #[arg(long)]
        confirmations: Option<u64>,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Resend a pending transaction at a higher price
    SpeedUp {
        hash: TxHash,
        #[arg(long)]
        gas_price: Option<u128>,
    },
    /// Replace a pending transaction with a zero-value self-transfer
    Cancel {
        hash: TxHash,
        #[arg(long)]
        gas_price: Option<u128>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let path = cli
        .config
        .or_else(|| std::env::var("GATEWAY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("config/gateway.toml"));
    let config = load_config(&path)?;
    logging::init_logging("warn");

    let output = run(cli.command, config).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(command: Commands, config: GatewayConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let output = match command {
        Commands::Status => {
            let client = ChainClient::connect(&config.chain).await?;
            json!({
                "chain_id": client.chain_id(),
                "block_number": client.block_number().await?,
                "gas_price": client.fee_quote().await?,
                "healthy": client.is_healthy().await,
            })
        }
        Commands::Balance { account } => {
            let (client, contracts) = read_only(&config).await?;
            let address = match contracts.get_by_alias(&account) {
                Ok(binding) => binding.address,
                Err(_) => account.parse::<Address>()?,
            };
            let balance = client.balance(address).await?;
            json!({
                "address": address,
                "wei": balance.to_string(),
                "ether": alloy::primitives::utils::format_ether(balance),
            })
        }
        Commands::Call(call) => {
            let (_, contracts) = read_only(&config).await?;
            let args = contracts.coerce_args(&call.target, call.abi(), &call.method, &call.args)?;
            let values = contracts
                .call_read(&call.target, call.abi(), &call.method, &args)
                .await?;
            Value::Array(values.iter().map(sol_value_to_json).collect())
        }
        Commands::Estimate { call, value } => {
            let gateway = Gateway::start(config).await?;
            let request = build_request(&gateway, &call, &value)?;
            serde_json::to_value(gateway.transactions.estimate_cost(&request).await?)?
        }
        Commands::Send {
            call,
            value,
            gas_limit,
            gas_price,
            wait,
        } => {
            let gateway = Gateway::start(config).await?;
            let mut request = build_request(&gateway, &call, &value)?;
            request.gas.gas_limit = gas_limit;
            request.gas.gas_price = gas_price;

            let result = gateway
                .contracts
                .call_write(&gateway.transactions, request)
                .await?;
            if wait {
                let receipt = gateway
                    .transactions
                    .wait_for_confirmation(result.hash, None, None)
                    .await?;
                json!({ "transaction": result, "receipt": receipt })
            } else {
                serde_json::to_value(result)?
            }
        }
        Commands::TxStatus { hash } => {
            let gateway = Gateway::start(config).await?;
            serde_json::to_value(gateway.transactions.get_status(hash).await?)?
        }
        Commands::Wait {
            hash,
            confirmations,
            timeout_ms,
        } => {
            let gateway = Gateway::start(config).await?;
            serde_json::to_value(
                gateway
                    .transactions
                    .wait_for_confirmation(hash, confirmations, timeout_ms)
                    .await?,
            )?
        }
        Commands::SpeedUp { hash, gas_price } => {
            let gateway = Gateway::start(config).await?;
            serde_json::to_value(gateway.transactions.speed_up(hash, gas_price).await?)?
        }
        Commands::Cancel { hash, gas_price } => {
            let gateway = Gateway::start(config).await?;
            serde_json::to_value(gateway.transactions.cancel(hash, gas_price).await?)?
        }
    };

    Ok(output)
}

/// Client and registry for commands that never sign.
async fn read_only(
    config: &GatewayConfig,
) -> Result<(Arc<ChainClient>, ContractRegistry), Box<dyn std::error::Error>> {
    let client = Arc::new(ChainClient::connect(&config.chain).await?);
    let mut contracts = ContractRegistry::new(client.clone());
    contracts.register_static(&config.contracts)?;
    Ok((client, contracts))
}

fn build_request(
    gateway: &Gateway,
    call: &CallTarget,
    value: &str,
) -> Result<CallRequest, Box<dyn std::error::Error>> {
    let args = gateway
        .contracts
        .coerce_args(&call.target, call.abi(), &call.method, &call.args)?;
    let mut request = CallRequest::new(call.target.clone(), call.method.clone())
        .with_args(args)
        .with_value(value.parse::<U256>()?);
    if let Some(abi) = call.abi() {
        request = request.with_abi(abi.iter().cloned());
    }
    Ok(request)
}
