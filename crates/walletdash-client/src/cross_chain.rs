//! Cross-chain swap wizard data
//!
//! [`CrossChainLoader`] pulls the bridge catalogue, supported token pairs and
//! the token lists of the two selected chains through a cross-chain-preset
//! [`RequestQueue`], four sequential steps per load. Failed steps leave an
//! empty list behind. The loaded [`CrossChainCatalog`] answers pair
//! validation, and [`CrossChainLoader::quote`] asks the aggregator for an
//! unsigned route.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walletdash_queue::{NoProgress, ProgressSink, RateLimitInfo, RequestQueue};

use crate::api::WalletApi;
use crate::busy::BusyGuard;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::format;
use crate::json::{first_entry, number_field, string_field, string_lenient, u32_lenient};
use crate::SOLANA_CHAIN_INDEX;

/// Steps in one full load
const TOTAL_STEPS: u32 = 4;

/// Step name of a route quote
const QUOTE_STEP: &str = "Building swap route";

/// Step name of the wallet balance lookup
const BALANCE_STEP: &str = "Loading wallet balances";

// ============================================================================
// Chains and routes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Chain {
    pub name: &'static str,
    pub index: &'static str,
    pub id: &'static str,
}

impl Chain {
    const fn new(name: &'static str, index: &'static str) -> Self {
        Self {
            name,
            index,
            id: index,
        }
    }

    pub fn is_solana(&self) -> bool {
        self.index == SOLANA_CHAIN_INDEX
    }

    /// Look a chain up by index or by name (case-insensitive)
    pub fn find(key: &str) -> Option<Self> {
        let key = key.trim();
        CHAINS
            .iter()
            .find(|c| c.index == key || c.name.eq_ignore_ascii_case(key))
            .copied()
    }

    pub fn solana() -> Self {
        CHAINS[0]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Chains the wizard offers
pub const CHAINS: [Chain; 8] = [
    Chain::new("Solana", "501"),
    Chain::new("Ethereum", "1"),
    Chain::new("BNB Chain", "56"),
    Chain::new("Polygon", "137"),
    Chain::new("Arbitrum", "42161"),
    Chain::new("Optimism", "10"),
    Chain::new("Avalanche", "43114"),
    Chain::new("Fantom", "250"),
];

/// Route preference sent to the aggregator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RouteSort {
    #[default]
    Optimal,
    MostTokens,
    Fastest,
}

impl RouteSort {
    pub const ALL: [Self; 3] = [Self::Optimal, Self::MostTokens, Self::Fastest];

    /// Wire value of the `sort` field
    pub fn code(self) -> &'static str {
        match self {
            Self::Optimal => "1",
            Self::MostTokens => "0",
            Self::Fastest => "2",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Optimal => "Optimal Route",
            Self::MostTokens => "Most Tokens",
            Self::Fastest => "Fastest Route",
        }
    }
}

impl FromStr for RouteSort {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "optimal" => Ok(Self::Optimal),
            "0" | "most-tokens" | "most_tokens" => Ok(Self::MostTokens),
            "2" | "fastest" => Ok(Self::Fastest),
            other => Err(ClientError::validation(format!("Unknown route preference: {other}"))),
        }
    }
}

impl Serialize for RouteSort {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

// ============================================================================
// Catalogue data
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub address: String,
    #[serde(deserialize_with = "u32_lenient")]
    pub decimals: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "string_lenient")]
    pub chain_index: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub chain_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(deserialize_with = "string_lenient")]
    pub from_chain_index: String,
    #[serde(deserialize_with = "string_lenient")]
    pub to_chain_index: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub from_chain_id: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub to_chain_id: String,
    #[serde(default)]
    pub from_token_address: String,
    #[serde(default)]
    pub to_token_address: String,
    pub from_token_symbol: String,
    pub to_token_symbol: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub pair_id: String,
}

impl TokenPair {
    fn connects(&self, from: &Chain, to: &Chain) -> bool {
        self.from_chain_index == from.index && self.to_chain_index == to.index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bridge {
    #[serde(deserialize_with = "u32_lenient")]
    pub bridge_id: u32,
    pub bridge_name: String,
    #[serde(default)]
    pub require_other_native_fee: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub supported_chains: Vec<String>,
    #[serde(default)]
    pub supports_solana: bool,
}

impl Bridge {
    fn serves(&self, from: &Chain, to: &Chain) -> bool {
        let has = |index: &str| self.supported_chains.iter().any(|c| c == index);
        has(from.index) && has(to.index)
    }
}

/// Outcome of checking the selected token pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairValidation {
    pub is_valid: bool,
    pub message: String,
    pub available_bridges: Vec<Bridge>,
}

impl PairValidation {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: message.into(),
            available_bridges: Vec::new(),
        }
    }
}

/// Check a token selection against the supported pairs of a chain combination
pub fn validate_pair(
    pairs: &[TokenPair],
    bridges: &[Bridge],
    from_chain: &Chain,
    to_chain: &Chain,
    from_token: Option<&Token>,
    to_token: Option<&Token>,
) -> PairValidation {
    let (Some(from_token), Some(to_token)) = (from_token, to_token) else {
        return PairValidation::invalid("Please select both tokens");
    };

    let supported = pairs.iter().any(|pair| {
        pair.connects(from_chain, to_chain)
            && pair.from_token_symbol == from_token.symbol
            && pair.to_token_symbol == to_token.symbol
    });

    if supported {
        let available_bridges: Vec<Bridge> = bridges
            .iter()
            .filter(|b| b.serves(from_chain, to_chain))
            .cloned()
            .collect();
        return PairValidation {
            is_valid: true,
            message: format!(
                "Supported pair with {} available bridge(s)",
                available_bridges.len()
            ),
            available_bridges,
        };
    }

    let alternatives: Vec<String> = pairs
        .iter()
        .filter(|pair| pair.connects(from_chain, to_chain))
        .map(|pair| format!("{} → {}", pair.from_token_symbol, pair.to_token_symbol))
        .collect();

    if alternatives.is_empty() {
        PairValidation::invalid(format!(
            "No supported pairs between {} and {}",
            from_chain.name, to_chain.name
        ))
    } else {
        PairValidation::invalid(format!(
            "This token pair is not supported. Available pairs: {}",
            alternatives.join(", ")
        ))
    }
}

/// Check a recipient address against the destination chain's format.
///
/// Solana: base58, 32 to 44 characters. EVM chains: `0x` and 40 hex digits.
pub fn validate_recipient(address: &str, chain: &Chain) -> bool {
    let address = address.trim();
    if address.is_empty() {
        return false;
    }

    if chain.is_solana() {
        const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
        (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58.contains(c))
    } else {
        match address.strip_prefix("0x") {
            Some(digits) => digits.len() == 40 && hex::decode(digits).is_ok(),
            None => false,
        }
    }
}

/// Everything one load cycle produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrossChainCatalog {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub bridges: Vec<Bridge>,
    pub pairs: Vec<TokenPair>,
    pub from_tokens: Vec<Token>,
    pub to_tokens: Vec<Token>,
    pub from_token: Option<Token>,
    pub to_token: Option<Token>,
}

impl Default for CrossChainCatalog {
    fn default() -> Self {
        Self {
            from_chain: Chain::solana(),
            to_chain: CHAINS[1],
            bridges: Vec::new(),
            pairs: Vec::new(),
            from_tokens: Vec::new(),
            to_tokens: Vec::new(),
            from_token: None,
            to_token: None,
        }
    }
}

impl CrossChainCatalog {
    /// Validate the currently selected tokens
    pub fn validation(&self) -> PairValidation {
        validate_pair(
            &self.pairs,
            &self.bridges,
            &self.from_chain,
            &self.to_chain,
            self.from_token.as_ref(),
            self.to_token.as_ref(),
        )
    }

    /// Pairs offered between the selected chains
    pub fn chain_pairs(&self) -> Vec<&TokenPair> {
        self.pairs
            .iter()
            .filter(|p| p.connects(&self.from_chain, &self.to_chain))
            .collect()
    }

    /// Supported pairs grouped by known chain combination, in first-seen order
    pub fn chain_combinations(&self) -> Vec<(Chain, Chain, Vec<&TokenPair>)> {
        let mut combos: Vec<(Chain, Chain, Vec<&TokenPair>)> = Vec::new();
        for pair in &self.pairs {
            let (Some(from), Some(to)) =
                (Chain::find(&pair.from_chain_index), Chain::find(&pair.to_chain_index))
            else {
                continue;
            };
            match combos.iter_mut().find(|(f, t, _)| *f == from && *t == to) {
                Some((_, _, pairs)) => pairs.push(pair),
                None => combos.push((from, to, vec![pair])),
            }
        }
        combos
    }

    /// Select tokens by symbol from the loaded lists
    pub fn select(&mut self, from_symbol: &str, to_symbol: &str) -> ClientResult<()> {
        let from = find_symbol(&self.from_tokens, from_symbol).ok_or_else(|| {
            ClientError::validation(format!("{from_symbol} is not listed on {}", self.from_chain))
        })?;
        let to = find_symbol(&self.to_tokens, to_symbol).ok_or_else(|| {
            ClientError::validation(format!("{to_symbol} is not listed on {}", self.to_chain))
        })?;
        self.from_token = Some(from.clone());
        self.to_token = Some(to.clone());
        Ok(())
    }
}

fn find_symbol<'a>(tokens: &'a [Token], symbol: &str) -> Option<&'a Token> {
    tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(symbol))
}

/// Keep a selection that still belongs to `tokens`, else the preferred symbol, else the first
fn default_token(tokens: &[Token], current: Option<Token>, preferred: &str) -> Option<Token> {
    current
        .filter(|c| tokens.iter().any(|t| t.address == c.address))
        .or_else(|| tokens.iter().find(|t| t.symbol == preferred).cloned())
        .or_else(|| tokens.first().cloned())
}

/// Per-step loading flags and overall progress of a load
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadingState {
    pub bridges: bool,
    pub pairs: bool,
    pub from_tokens: bool,
    pub to_tokens: bool,
    pub current_step: String,
    /// Percent of steps started, 0 to 100
    pub progress: u8,
    pub total_steps: u32,
    pub current_step_index: u32,
}

impl LoadingState {
    fn starting() -> Self {
        Self {
            current_step: "Starting data load...".to_string(),
            total_steps: TOTAL_STEPS,
            ..Self::default()
        }
    }

    fn advance(&mut self, index: u32, step: &str) {
        self.current_step_index = index;
        self.current_step = format!("{step}...");
        let total = self.total_steps.max(1) as f64;
        self.progress = ((index as f64 / total) * 100.0).round().min(100.0) as u8;
    }

    pub fn is_loading(&self) -> bool {
        self.bridges || self.pairs || self.from_tokens || self.to_tokens
    }
}

// ============================================================================
// Swap requests
// ============================================================================

/// User input for a route quote
#[derive(Debug, Clone, PartialEq)]
pub struct SwapParams {
    pub from_chain: Chain,
    pub to_chain: Chain,
    pub from_token: Option<Token>,
    pub to_token: Option<Token>,
    /// Human amount of the source token, as typed
    pub amount: String,
    pub user_wallet: String,
    pub recipient: String,
    pub slippage: String,
    pub fee_percent: String,
    pub sort: RouteSort,
}

impl SwapParams {
    pub fn new(from_chain: Chain, to_chain: Chain) -> Self {
        Self {
            from_chain,
            to_chain,
            from_token: None,
            to_token: None,
            amount: String::new(),
            user_wallet: String::new(),
            recipient: String::new(),
            slippage: "0.01".to_string(),
            fee_percent: "0.1".to_string(),
            sort: RouteSort::default(),
        }
    }
}

/// Body of a `build-tx` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub action: &'static str,
    pub from_chain_index: String,
    pub to_chain_index: String,
    pub from_chain_id: String,
    pub to_chain_id: String,
    pub from_token_address: String,
    pub to_token_address: String,
    /// Integer amount in the source token's base units
    pub amount: String,
    pub slippage: String,
    pub user_wallet_address: String,
    pub receive_address: String,
    pub sort: RouteSort,
    pub fee_percent: String,
    pub price_impact_protection_percentage: &'static str,
    #[serde(skip)]
    pub to_decimals: u32,
}

impl SwapRequest {
    /// Validate `params` and convert the amount to base units
    pub fn build(params: &SwapParams, validation: &PairValidation) -> ClientResult<Self> {
        let amount = params.amount.trim().parse::<f64>().unwrap_or(0.0);
        if !amount.is_finite() || amount <= 0.0 {
            return Err(ClientError::validation("Please enter a valid amount"));
        }

        let (Some(from_token), Some(to_token)) = (&params.from_token, &params.to_token) else {
            return Err(ClientError::validation("Please select both tokens"));
        };

        let recipient = params.recipient.trim();
        if recipient.is_empty() {
            return Err(ClientError::validation("Please enter a recipient address"));
        }
        if !validate_recipient(recipient, &params.to_chain) {
            return Err(ClientError::validation(format!(
                "Invalid recipient address format for {}",
                params.to_chain.name
            )));
        }

        if !params.from_chain.is_solana() && !params.to_chain.is_solana() {
            return Err(ClientError::validation(
                "At least one chain must be Solana for cross-chain swaps",
            ));
        }

        if !validation.is_valid {
            return Err(ClientError::validation(format!(
                "Invalid token pair: {}",
                validation.message
            )));
        }

        Ok(Self {
            action: "build-tx",
            from_chain_index: params.from_chain.index.to_string(),
            to_chain_index: params.to_chain.index.to_string(),
            from_chain_id: params.from_chain.id.to_string(),
            to_chain_id: params.to_chain.id.to_string(),
            from_token_address: from_token.address.clone(),
            to_token_address: to_token.address.clone(),
            amount: format::to_base_units(amount, from_token.decimals).to_string(),
            slippage: params.slippage.clone(),
            user_wallet_address: params.user_wallet.clone(),
            receive_address: recipient.to_string(),
            sort: params.sort,
            fee_percent: params.fee_percent.clone(),
            price_impact_protection_percentage: "0.25",
            to_decimals: to_token.decimals,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRouter {
    #[serde(default, deserialize_with = "u32_lenient")]
    pub bridge_id: u32,
    #[serde(default)]
    pub bridge_name: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub other_native_fee: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub cross_chain_fee: String,
    #[serde(default)]
    pub cross_chain_fee_token_address: String,
}

/// Unsigned transaction returned with a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapTx {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub value: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub gas_limit: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub gas_price: String,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRoute {
    #[serde(default, deserialize_with = "string_lenient")]
    pub from_token_amount: String,
    #[serde(default, deserialize_with = "string_lenient")]
    pub to_token_amount: String,
    // upstream spelling
    #[serde(rename = "minmumReceive", default, deserialize_with = "string_lenient")]
    pub minimum_receive: String,
    pub router: SwapRouter,
    #[serde(default)]
    pub tx: Option<SwapTx>,
}

/// Best route for a swap request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapQuote {
    pub route: SwapRoute,
    /// Destination amount in whole tokens, six decimals
    pub estimated_receive: String,
}

impl SwapQuote {
    /// Interpret a `build-tx` response
    pub fn from_response(body: &Value, to_decimals: u32) -> ClientResult<Self> {
        if let Some(error) = body.get("error").and_then(Value::as_str) {
            if !error.is_empty() {
                return Err(ClientError::SwapRejected(error.to_string()));
            }
        }

        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        let entry = body.get("data").and_then(|data| data.get(0));

        match entry {
            Some(entry) if success => {
                let route: SwapRoute = serde_json::from_value(entry.clone()).map_err(|e| {
                    ClientError::SwapRejected(format!("unexpected route format: {e}"))
                })?;
                let estimated_receive = format::from_base_units(&route.to_token_amount, to_decimals);
                Ok(Self {
                    route,
                    estimated_receive,
                })
            }
            _ => {
                let message = body
                    .get("msg")
                    .and_then(Value::as_str)
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Failed to build cross-chain transaction");
                Err(ClientError::SwapRejected(message.to_string()))
            }
        }
    }
}

// ============================================================================
// Wallet balances
// ============================================================================

/// Native SOL kept back for fees when sending the whole balance
pub const SOL_FEE_RESERVE: f64 = 0.01;

/// Native ETH kept back for fees when sending the whole balance
pub const ETH_FEE_RESERVE: f64 = 0.005;

/// Raw balance and unit price of one held token
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct HeldToken {
    pub balance: f64,
    pub price: f64,
}

/// Portfolio balances of the wallet, indexed by contract address and symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WalletBalances {
    entries: HashMap<String, HeldToken>,
}

impl WalletBalances {
    /// Read a `total_token_balances` response
    pub fn from_response(body: &Value) -> ClientResult<Self> {
        let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
        let assets = first_entry(body)
            .and_then(|entry| entry.get("tokenAssets"))
            .and_then(Value::as_array)
            .filter(|_| success)
            .ok_or_else(|| ClientError::upstream("Invalid balance data received"))?;

        let mut entries = HashMap::new();
        for asset in assets {
            let held = HeldToken {
                balance: number_field(asset, "balance"),
                price: number_field(asset, "tokenPrice"),
            };
            if let Some(address) = string_field(asset, "tokenContractAddress") {
                entries.insert(address, held);
            }
            if let Some(symbol) = string_field(asset, "symbol") {
                entries.insert(symbol, held);
            }
        }
        Ok(Self { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Balance of `token`, by address first and symbol second, scaled down
    /// by the token's decimals. Unknown tokens read as zero.
    pub fn balance_of(&self, token: &Token) -> TokenBalance {
        let held = self
            .entries
            .get(&token.address)
            .or_else(|| self.entries.get(&token.symbol))
            .copied()
            .unwrap_or_default();
        let balance = held.balance / 10f64.powi(token.decimals as i32);
        TokenBalance {
            balance,
            price: held.price,
            usd_value: balance * held.price,
        }
    }
}

/// Spendable balance of the source token
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TokenBalance {
    pub balance: f64,
    pub price: f64,
    pub usd_value: f64,
}

impl TokenBalance {
    /// The whole balance as an amount string, minus the fee reserve for
    /// native SOL and ETH when the balance exceeds it
    pub fn max_amount(&self, symbol: &str) -> String {
        let reserve = match symbol {
            "SOL" => SOL_FEE_RESERVE,
            "ETH" => ETH_FEE_RESERVE,
            _ => 0.0,
        };
        let mut max = self.balance;
        if reserve > 0.0 && max > reserve {
            max -= reserve;
        }
        format!("{:.6}", max.max(0.0))
    }
}

// ============================================================================
// Loader
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Bridges,
    Pairs,
    Tokens(String),
}

#[derive(Debug, Default)]
struct LoaderState {
    catalog: CrossChainCatalog,
    loading: LoadingState,
    rate_limit: RateLimitInfo,
    balances: Option<WalletBalances>,
}

/// Loads and holds the data behind the cross-chain swap wizard
#[derive(Clone)]
pub struct CrossChainLoader {
    api: Arc<dyn WalletApi>,
    queue: RequestQueue,
    /// Wallet whose balances fund the swap
    address: String,
    state: Arc<Mutex<LoaderState>>,
    busy: Arc<AtomicBool>,
}

impl fmt::Debug for CrossChainLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossChainLoader")
            .field("queue", &self.queue)
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl CrossChainLoader {
    pub fn new(api: Arc<dyn WalletApi>, config: &ClientConfig) -> Self {
        Self::with_observer(api, config, NoProgress)
    }

    /// Loader whose queue reports every step transition to `observer`
    pub fn with_observer(
        api: Arc<dyn WalletApi>,
        config: &ClientConfig,
        observer: impl ProgressSink + 'static,
    ) -> Self {
        let queue = RequestQueue::builder()
            .config(config.cross_chain_queue.clone())
            .progress(observer)
            .build();

        Self {
            api,
            queue,
            address: config.wallet_address.clone(),
            state: Arc::new(Mutex::new(LoaderState::default())),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn catalog(&self) -> CrossChainCatalog {
        self.state.lock().catalog.clone()
    }

    pub fn loading_state(&self) -> LoadingState {
        self.state.lock().loading.clone()
    }

    pub fn rate_limit(&self) -> RateLimitInfo {
        self.state.lock().rate_limit.clone()
    }

    /// Seconds until refresh is allowed again
    pub fn rate_limit_countdown(&self) -> u64 {
        self.state.lock().rate_limit.countdown(Utc::now())
    }

    pub fn is_loading(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Select tokens by symbol in the loaded catalogue
    pub fn select_tokens(&self, from_symbol: &str, to_symbol: &str) -> ClientResult<()> {
        self.state.lock().catalog.select(from_symbol, to_symbol)
    }

    /// Reload everything unless a load is running or the rate-limit window is open
    pub async fn refresh(&self, from_chain: Chain, to_chain: Chain) -> ClientResult<CrossChainCatalog> {
        self.refresh_at(from_chain, to_chain, Utc::now()).await
    }

    /// [`CrossChainLoader::refresh`] with the rate-limit window judged at `now`
    pub async fn refresh_at(
        &self,
        from_chain: Chain,
        to_chain: Chain,
        now: DateTime<Utc>,
    ) -> ClientResult<CrossChainCatalog> {
        if self.is_loading() {
            return Err(ClientError::RefreshBlocked("data is still loading".into()));
        }
        let rate_limit = self.rate_limit();
        if rate_limit.is_active(now) {
            return Err(ClientError::RefreshBlocked(format!(
                "rate limited, try again in {}s",
                rate_limit.countdown(now)
            )));
        }
        self.load_all(from_chain, to_chain).await
    }

    /// Fetch the wallet's portfolio balances through the queue
    pub async fn load_balances(&self) -> ClientResult<WalletBalances> {
        let api = self.api.clone();
        let address = self.address.clone();
        let body = self
            .queue
            .enqueue(BALANCE_STEP, move || {
                let api = api.clone();
                let address = address.clone();
                async move { api.total_token_balances(&address).await }
            })
            .await?;

        let balances = WalletBalances::from_response(&body)?;
        tracing::debug!(address = %self.address, empty = balances.is_empty(), "Wallet balances loaded");
        self.state.lock().balances = Some(balances.clone());
        Ok(balances)
    }

    /// Balance of the selected source token. Only Solana source tokens have
    /// one, and only after [`CrossChainLoader::load_balances`].
    pub fn source_balance(&self) -> Option<TokenBalance> {
        let state = self.state.lock();
        let balances = state.balances.as_ref()?;
        let token = state.catalog.from_token.as_ref()?;
        state
            .catalog
            .from_chain
            .is_solana()
            .then(|| balances.balance_of(token))
    }

    /// Amount that spends the whole source balance, keeping the fee reserve
    pub fn max_amount(&self) -> Option<String> {
        let balance = self.source_balance()?;
        let symbol = self.state.lock().catalog.from_token.as_ref()?.symbol.clone();
        Some(balance.max_amount(&symbol))
    }

    /// Load bridges, pairs and both chains' tokens, in that order
    pub async fn load_all(&self, from_chain: Chain, to_chain: Chain) -> ClientResult<CrossChainCatalog> {
        let _busy = self.claim()?;

        {
            let mut state = self.state.lock();
            state.rate_limit.reset();
            state.loading = LoadingState::starting();
            state.catalog.from_chain = from_chain;
            state.catalog.to_chain = to_chain;
        }
        tracing::info!(from = from_chain.name, to = to_chain.name, "Loading cross-chain data");

        self.state.lock().loading.bridges = true;
        let bridges: Vec<Bridge> = self
            .fetch_list(Source::Bridges, "Loading bridges", 1, "bridges")
            .await;
        {
            let mut state = self.state.lock();
            state.catalog.bridges = bridges;
            state.loading.bridges = false;
            state.loading.pairs = true;
        }

        let pairs: Vec<TokenPair> = self
            .fetch_list(Source::Pairs, "Loading token pairs", 2, "pairs")
            .await;
        {
            let mut state = self.state.lock();
            state.catalog.pairs = pairs;
            state.loading.pairs = false;
        }

        self.load_chain_tokens(from_chain, to_chain).await;
        Ok(self.catalog())
    }

    /// Reload only the two token lists, e.g. after the chains changed
    pub async fn load_tokens(&self, from_chain: Chain, to_chain: Chain) -> ClientResult<CrossChainCatalog> {
        let _busy = self.claim()?;
        {
            let mut state = self.state.lock();
            state.loading = LoadingState::starting();
            state.catalog.from_chain = from_chain;
            state.catalog.to_chain = to_chain;
        }
        self.load_chain_tokens(from_chain, to_chain).await;
        Ok(self.catalog())
    }

    /// Ask the aggregator for a route for `params`
    pub async fn quote(&self, params: &SwapParams) -> ClientResult<SwapQuote> {
        let validation = {
            let state = self.state.lock();
            validate_pair(
                &state.catalog.pairs,
                &state.catalog.bridges,
                &params.from_chain,
                &params.to_chain,
                params.from_token.as_ref(),
                params.to_token.as_ref(),
            )
        };
        let request = Arc::new(SwapRequest::build(params, &validation)?);
        let to_decimals = request.to_decimals;
        tracing::info!(
            from = %request.from_chain_index,
            to = %request.to_chain_index,
            amount = %request.amount,
            "Requesting swap route"
        );

        let api = self.api.clone();
        let body = self
            .queue
            .enqueue(QUOTE_STEP, move || {
                let api = api.clone();
                let request = request.clone();
                async move { api.cross_chain_swap(&request).await }
            })
            .await?;

        SwapQuote::from_response(&body, to_decimals)
    }

    fn claim(&self) -> ClientResult<BusyGuard> {
        BusyGuard::claim(&self.busy)
            .ok_or_else(|| ClientError::RefreshBlocked("data is still loading".into()))
    }

    async fn load_chain_tokens(&self, from_chain: Chain, to_chain: Chain) {
        self.state.lock().loading.from_tokens = true;
        let from_tokens: Vec<Token> = self
            .fetch_list(
                Source::Tokens(from_chain.index.to_string()),
                &format!("Loading {} tokens", from_chain.name),
                3,
                "tokens",
            )
            .await;
        {
            let mut state = self.state.lock();
            let current = state.catalog.from_token.take();
            state.catalog.from_token = default_token(&from_tokens, current, "SOL");
            state.catalog.from_tokens = from_tokens;
            state.loading.from_tokens = false;
            state.loading.to_tokens = true;
        }

        let to_tokens: Vec<Token> = self
            .fetch_list(
                Source::Tokens(to_chain.index.to_string()),
                &format!("Loading {} tokens", to_chain.name),
                4,
                "tokens",
            )
            .await;
        {
            let mut state = self.state.lock();
            let current = state.catalog.to_token.take();
            state.catalog.to_token = default_token(&to_tokens, current, "USDC");
            state.catalog.to_tokens = to_tokens;
            state.loading.to_tokens = false;
            state.loading.current_step = "All data loaded successfully!".to_string();
            state.loading.current_step_index = TOTAL_STEPS;
            state.loading.progress = 100;
        }
    }

    /// Fetch one step and read `key` as a list, or an empty list on any failure
    async fn fetch_list<T: DeserializeOwned>(
        &self,
        source: Source,
        step: &str,
        index: u32,
        key: &str,
    ) -> Vec<T> {
        let body = match self.fetch_checked(source, step, index).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(step, error = %e, "Step failed, continuing with an empty list");
                return Vec::new();
            }
        };

        let Some(items) = body.get(key).cloned() else {
            return Vec::new();
        };
        match serde_json::from_value::<Vec<T>>(items) {
            Ok(items) => {
                tracing::debug!(step, count = items.len(), "Step loaded");
                items
            }
            Err(e) => {
                tracing::warn!(step, error = %e, "Unexpected list format");
                Vec::new()
            }
        }
    }

    /// Run one step through the queue and check the response envelope
    async fn fetch_checked(&self, source: Source, step: &str, index: u32) -> ClientResult<Value> {
        self.state.lock().loading.advance(index, step);

        let api = self.api.clone();
        let result = self
            .queue
            .enqueue(step, move || {
                let api = api.clone();
                let source = source.clone();
                async move {
                    match source {
                        Source::Bridges => api.cross_chain_bridges().await,
                        Source::Pairs => api.cross_chain_pairs().await,
                        Source::Tokens(chain_index) => api.chain_tokens(&chain_index).await,
                    }
                }
            })
            .await
            .map_err(ClientError::from)
            .and_then(|body| {
                if is_accepted(&body) {
                    Ok(body)
                } else {
                    let message = body
                        .get("error")
                        .and_then(Value::as_str)
                        .filter(|e| !e.is_empty())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Failed to fetch {step}"));
                    Err(ClientError::upstream(message))
                }
            });

        let mut state = self.state.lock();
        match &result {
            Ok(_) => state.rate_limit.record_success(),
            Err(e) if e.is_rate_limited() => state.rate_limit.record_rate_limited(Utc::now()),
            Err(_) => {}
        }
        result
    }
}

/// `success` must be true and the body must carry one of the catalogue lists
fn is_accepted(body: &Value) -> bool {
    let success = body.get("success").and_then(Value::as_bool).unwrap_or(false);
    success && ["bridges", "pairs", "tokens"].iter().any(|key| body.get(key).is_some())
}
