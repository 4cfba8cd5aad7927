//! walletdash CLI - portfolio dashboard and cross-chain route explorer
//!
//! Every command talks to the walletdash REST backend through the rate-limited
//! request queue, so expect a few seconds between requests.
//!
//! # Quick Start
//!
//! ```bash
//! walletdash dashboard
//! walletdash dashboard --watch --interval 120
//! walletdash bridges --from solana --to ethereum
//! walletdash validate --from solana --to ethereum --from-token SOL --to-token USDC
//! walletdash quote --from solana --to ethereum --from-token SOL --to-token USDC \
//!     --amount 1.5 --recipient 0x52908400098527886E0F7030069857D2E4169EE7
//! walletdash quote --from solana --to ethereum --max \
//!     --recipient 0x52908400098527886E0F7030069857D2E4169EE7
//! walletdash ask "What are my recent transactions?"
//! ```

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use walletdash_client::{Chain, ClientConfig, RouteSort};

mod commands;
mod display;

/// walletdash - wallet portfolio dashboard and cross-chain swap routes
#[derive(Parser)]
#[command(name = "walletdash")]
#[command(version)]
#[command(about = "Rate-limited portfolio dashboard and cross-chain swap explorer", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Wallet address to inspect
    #[arg(long, global = true)]
    address: Option<String>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and show the portfolio dashboard
    Dashboard {
        /// Reload periodically until interrupted
        #[arg(short, long)]
        watch: bool,

        /// Seconds between reloads (defaults to the configured refresh interval)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// List bridges, supported pairs and tokens for two chains
    Bridges {
        #[command(flatten)]
        route: RouteArgs,
    },

    /// Check whether a token pair can be bridged
    Validate {
        #[command(flatten)]
        route: RouteArgs,

        #[command(flatten)]
        tokens: TokenArgs,

        /// Also check this recipient address against the destination chain
        #[arg(long)]
        recipient: Option<String>,
    },

    /// Request an unsigned cross-chain swap route
    Quote {
        #[command(flatten)]
        route: RouteArgs,

        #[command(flatten)]
        tokens: TokenArgs,

        /// Amount of the source token
        #[arg(long, required_unless_present = "max", conflicts_with = "max")]
        amount: Option<String>,

        /// Send the whole wallet balance of the source token, minus the fee reserve
        #[arg(long)]
        max: bool,

        /// Recipient on the destination chain
        #[arg(long)]
        recipient: String,

        /// Slippage tolerance as a fraction
        #[arg(long, default_value = "0.01")]
        slippage: String,

        /// Fee percent
        #[arg(long, default_value = "0.1")]
        fee: String,

        /// Route preference: optimal, most-tokens or fastest
        #[arg(long, default_value = "optimal", value_parser = parse_sort)]
        sort: RouteSort,
    },

    /// List supported chains and route preferences
    Chains,

    /// Ask the assistant about the wallet or a token
    Ask {
        /// Question, e.g. "Show me my token balance"
        message: String,

        /// Answer a model's JSON reply instead of reading the message locally
        #[arg(long)]
        intent: Option<String>,

        /// Print the reply as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RouteArgs {
    /// Source chain (name or index)
    #[arg(long, default_value = "solana", value_parser = parse_chain)]
    from: Chain,

    /// Destination chain (name or index)
    #[arg(long, default_value = "ethereum", value_parser = parse_chain)]
    to: Chain,
}

#[derive(Args)]
struct TokenArgs {
    /// Source token symbol (defaults to SOL or the first listed token)
    #[arg(long)]
    from_token: Option<String>,

    /// Destination token symbol (defaults to USDC or the first listed token)
    #[arg(long)]
    to_token: Option<String>,
}

fn parse_chain(value: &str) -> Result<Chain, String> {
    Chain::find(value).ok_or_else(|| {
        let known: Vec<&str> = walletdash_client::CHAINS.iter().map(|c| c.name).collect();
        format!("unknown chain '{value}' (known: {})", known.join(", "))
    })
}

fn parse_sort(value: &str) -> Result<RouteSort, String> {
    value.parse().map_err(|e: walletdash_client::ClientError| e.to_string())
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    // stderr keeps stdout clean for --json
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.api_url {
        config.base_url = url.clone();
    }
    if let Some(address) = &cli.address {
        config.wallet_address = address.clone();
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config first: it reads .env, which may carry RUST_LOG
    let config = load_config(&cli)?;
    init_logging(cli.verbose);
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    match cli.command {
        Commands::Dashboard {
            watch,
            interval,
            json,
        } => {
            let interval = interval
                .map(std::time::Duration::from_secs)
                .unwrap_or(config.refresh_interval);
            commands::dashboard::run(&config, watch, interval, json).await?;
        }

        Commands::Bridges { route } => {
            commands::cross_chain::bridges(&config, route.from, route.to).await?;
        }

        Commands::Validate {
            route,
            tokens,
            recipient,
        } => {
            commands::cross_chain::validate(
                &config,
                route.from,
                route.to,
                tokens.from_token.as_deref(),
                tokens.to_token.as_deref(),
                recipient.as_deref(),
            )
            .await?;
        }

        Commands::Quote {
            route,
            tokens,
            amount,
            max,
            recipient,
            slippage,
            fee,
            sort,
        } => {
            let request = commands::cross_chain::QuoteArgs {
                from: route.from,
                to: route.to,
                from_token: tokens.from_token,
                to_token: tokens.to_token,
                amount,
                max,
                recipient,
                slippage,
                fee_percent: fee,
                sort,
            };
            commands::cross_chain::quote(&config, request).await?;
        }

        Commands::Chains => commands::cross_chain::chains(),

        Commands::Ask {
            message,
            intent,
            json,
        } => {
            commands::assistant::run(&config, &message, intent.as_deref(), json).await?;
        }
    }

    Ok(())
}
