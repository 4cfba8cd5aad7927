//! walletdash client - data loaders for the wallet dashboard
//!
//! Every remote read goes through a [`walletdash_queue::RequestQueue`] so the
//! upstream portfolio, market-data and bridge APIs see a strictly serial,
//! spaced stream of requests. On a terminal queue failure each loader swaps
//! in an empty payload of the right shape, so a load cycle always produces a
//! renderable result.
//!
//! - [`dashboard::DashboardLoader`]: balances, history, value, chart, price
//! - [`cross_chain::CrossChainLoader`]: bridges, pairs, per-chain tokens,
//!   wallet balances, pair validation and route quotes
//! - [`assistant::Assistant`]: answers chat messages by dispatching the
//!   intent a model (or [`assistant::KeywordParser`]) reads from them
//!
//! The remote side is abstracted by [`api::WalletApi`]; [`api::HttpWalletApi`]
//! is the reqwest implementation.

pub mod api;
pub mod assistant;
mod busy;
pub mod config;
pub mod cross_chain;
pub mod dashboard;
pub mod error;
pub mod format;
mod json;

pub use api::{HttpWalletApi, MarketQuery, MarketRequest, MarketTarget, WalletApi};
pub use assistant::{
    Assistant, AssistantReply, Candle, Intent, IntentKind, IntentParser, KeywordParser,
    KnownToken, KNOWN_TOKENS,
};
pub use config::ClientConfig;
pub use cross_chain::{
    Bridge, Chain, CrossChainCatalog, CrossChainLoader, HeldToken, LoadingState, PairValidation,
    RouteSort, SwapParams, SwapQuote, SwapRequest, Token, TokenBalance, TokenPair, WalletBalances,
    CHAINS, ETH_FEE_RESERVE, SOL_FEE_RESERVE, validate_pair, validate_recipient,
};
pub use dashboard::{
    DashboardLoader, DashboardResponses, DashboardSnapshot, DashboardStats, DashboardStep,
    PricePoint, TokenHolding, TransactionRecord,
};
pub use error::{ClientError, ClientResult};

/// Wrapped SOL mint, used for SOL price lookups
pub const SOL_TOKEN_ADDRESS: &str = "So11111111111111111111111111111111111111112";

/// Solana's chain index in the upstream APIs
pub const SOLANA_CHAIN_INDEX: &str = "501";
