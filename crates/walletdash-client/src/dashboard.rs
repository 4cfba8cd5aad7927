//! Portfolio dashboard loader
//!
//! One load cycle fetches five data sources through a dashboard-preset
//! [`RequestQueue`], in order, and folds the responses into a
//! [`DashboardSnapshot`]. A step that fails terminally contributes its empty
//! fallback payload instead, so a cycle always yields a snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use walletdash_queue::{
    Fanout, LoadingStep, NoProgress, ProgressSink, QueueResult, RequestQueue, SharedSteps,
    StepTracker,
};

use crate::api::{MarketQuery, WalletApi};
use crate::busy::BusyGuard;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::format;
use crate::json::{entry_array, first_entry, number, number_field, string_field};
use crate::SOL_TOKEN_ADDRESS;

/// Tokens worth less than this are hidden
const DUST_THRESHOLD_USD: f64 = 0.01;

/// Points kept for the price chart
const CHART_POINTS: usize = 24;

// ============================================================================
// Steps
// ============================================================================

/// The data sources of one dashboard load, in fetch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DashboardStep {
    TokenBalances,
    TransactionHistory,
    PortfolioValue,
    MarketData,
    CurrentPrice,
}

impl DashboardStep {
    pub const ALL: [Self; 5] = [
        Self::TokenBalances,
        Self::TransactionHistory,
        Self::PortfolioValue,
        Self::MarketData,
        Self::CurrentPrice,
    ];

    /// Step name as reported to progress sinks
    pub fn label(self) -> &'static str {
        match self {
            Self::TokenBalances => "Token Balances",
            Self::TransactionHistory => "Transaction History",
            Self::PortfolioValue => "Portfolio Value",
            Self::MarketData => "Market Data",
            Self::CurrentPrice => "Current Price",
        }
    }

    /// Empty payload of the right shape, used when the step fails
    pub fn fallback(self) -> Value {
        match self {
            Self::TokenBalances => json!({"data": [{"tokenAssets": []}]}),
            Self::TransactionHistory => {
                json!({"data": [{"transactions": [], "transactionList": []}]})
            }
            Self::PortfolioValue => json!({"data": [{"totalValue": "0"}]}),
            Self::MarketData => json!({"data": [{"prices": []}]}),
            Self::CurrentPrice => json!({"data": [{"price": "0"}]}),
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// A token balance worth displaying
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    pub symbol: String,
    pub token_address: Option<String>,
    pub balance: f64,
    pub price: f64,
}

impl TokenHolding {
    pub(crate) fn from_json(value: &Value) -> Self {
        Self {
            symbol: string_field(value, "symbol").unwrap_or_else(|| "Unknown".to_string()),
            token_address: string_field(value, "tokenAddress")
                .or_else(|| string_field(value, "tokenContractAddress")),
            balance: number_field(value, "balance"),
            price: number_field(value, "tokenPrice"),
        }
    }

    /// USD value of the balance
    pub fn value(&self) -> f64 {
        self.balance * self.price
    }

    fn is_sol(&self) -> bool {
        self.symbol == "SOL" || self.token_address.as_deref() == Some(SOL_TOKEN_ADDRESS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_hash: Option<String>,
    pub symbol: String,
    pub amount: f64,
    pub tx_time: Option<DateTime<Utc>>,
    /// `success`, `fail` or `pending`, when reported
    pub status: Option<String>,
}

impl TransactionRecord {
    pub(crate) fn from_json(value: &Value) -> Self {
        let tx_time = value
            .get("txTime")
            .map(number)
            .and_then(|t| format::epoch_to_datetime(t as i64));

        Self {
            tx_hash: string_field(value, "txHash"),
            symbol: string_field(value, "symbol").unwrap_or_else(|| "SOL".to_string()),
            amount: number_field(value, "amount"),
            tx_time,
            status: string_field(value, "txStatus"),
        }
    }

    /// Shortened hash for display
    pub fn display_hash(&self) -> String {
        self.tx_hash
            .as_deref()
            .map(format::short_hash)
            .unwrap_or_else(|| "Transaction".to_string())
    }
}

/// One point of the price chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Unix time in milliseconds
    pub time: i64,
    pub price: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub token_holdings: usize,
    pub total_transactions: usize,
    pub active_chains: usize,
    pub total_tokens: usize,
}

/// Raw payloads of one load cycle, one per [`DashboardStep`]
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardResponses {
    pub token_balances: Value,
    pub transaction_history: Value,
    pub portfolio_value: Value,
    pub market_data: Value,
    pub current_price: Value,
}

impl Default for DashboardResponses {
    fn default() -> Self {
        Self {
            token_balances: DashboardStep::TokenBalances.fallback(),
            transaction_history: DashboardStep::TransactionHistory.fallback(),
            portfolio_value: DashboardStep::PortfolioValue.fallback(),
            market_data: DashboardStep::MarketData.fallback(),
            current_price: DashboardStep::CurrentPrice.fallback(),
        }
    }
}

impl DashboardResponses {
    pub fn get(&self, step: DashboardStep) -> &Value {
        match step {
            DashboardStep::TokenBalances => &self.token_balances,
            DashboardStep::TransactionHistory => &self.transaction_history,
            DashboardStep::PortfolioValue => &self.portfolio_value,
            DashboardStep::MarketData => &self.market_data,
            DashboardStep::CurrentPrice => &self.current_price,
        }
    }

    pub fn set(&mut self, step: DashboardStep, value: Value) {
        let slot = match step {
            DashboardStep::TokenBalances => &mut self.token_balances,
            DashboardStep::TransactionHistory => &mut self.transaction_history,
            DashboardStep::PortfolioValue => &mut self.portfolio_value,
            DashboardStep::MarketData => &mut self.market_data,
            DashboardStep::CurrentPrice => &mut self.current_price,
        };
        *slot = value;
    }
}

/// Everything the dashboard renders after one load cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub tokens: Vec<TokenHolding>,
    pub transactions: Vec<TransactionRecord>,
    pub portfolio_value: f64,
    pub current_price: f64,
    pub price_history: Vec<PricePoint>,
    pub stats: DashboardStats,
    /// Steps that fell back to their empty payload
    pub failed_steps: Vec<DashboardStep>,
    pub last_updated: DateTime<Utc>,
}

impl DashboardSnapshot {
    /// Fold raw responses into display data
    pub fn from_responses(responses: &DashboardResponses, now: DateTime<Utc>) -> Self {
        let tokens: Vec<TokenHolding> = entry_array(&responses.token_balances, "tokenAssets")
            .iter()
            .map(TokenHolding::from_json)
            .filter(|t| t.balance > 0.0 && t.value() > DUST_THRESHOLD_USD)
            .collect();

        let transactions: Vec<TransactionRecord> = transaction_entries(&responses.transaction_history)
            .iter()
            .map(TransactionRecord::from_json)
            .filter(|tx| tx.amount.abs() > 0.0)
            .collect();

        let mut portfolio_value = first_entry(&responses.portfolio_value)
            .map(|entry| number_field(entry, "totalValue"))
            .unwrap_or(0.0);
        if portfolio_value == 0.0 {
            portfolio_value = tokens.iter().map(TokenHolding::value).sum();
        }

        let mut current_price = first_entry(&responses.current_price)
            .map(|entry| number_field(entry, "price"))
            .unwrap_or(0.0);
        if current_price == 0.0 {
            if let Some(sol) = tokens.iter().find(|t| t.is_sol()) {
                current_price = sol.price;
            }
        }

        let price_history = price_points(&responses.market_data);

        let stats = DashboardStats {
            token_holdings: tokens.len(),
            total_transactions: transactions.len(),
            active_chains: 1,
            total_tokens: tokens.len(),
        };

        Self {
            tokens,
            transactions,
            portfolio_value,
            current_price,
            price_history,
            stats,
            failed_steps: Vec::new(),
            last_updated: now,
        }
    }

    /// Latest chart price minus the one before it. Missing points count as 0.
    pub fn price_change(&self) -> f64 {
        last_change(self.price_history.iter().map(|p| p.price))
    }

    pub fn is_complete(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

fn transaction_entries(response: &Value) -> &[Value] {
    let has_primary = first_entry(response)
        .and_then(|entry| entry.get("transactions"))
        .is_some_and(Value::is_array);
    if has_primary {
        entry_array(response, "transactions")
    } else {
        entry_array(response, "transactionList")
    }
}

/// Keep the last points of the chronological series
fn price_points(response: &Value) -> Vec<PricePoint> {
    let points = price_series(response);
    let skip = points.len().saturating_sub(CHART_POINTS);
    points.into_iter().skip(skip).collect()
}

/// `data[0].prices` in chronological order (the API sends newest first)
pub(crate) fn price_series(response: &Value) -> Vec<PricePoint> {
    entry_array(response, "prices")
        .iter()
        .rev()
        .map(|item| PricePoint {
            time: number_field(item, "time") as i64,
            price: number_field(item, "price"),
        })
        .collect()
}

/// Latest price minus the one before it. Missing points count as 0.
pub(crate) fn last_change(prices: impl DoubleEndedIterator<Item = f64>) -> f64 {
    let mut recent = prices.rev();
    let current = recent.next().unwrap_or(0.0);
    let previous = recent.next().unwrap_or(0.0);
    current - previous
}

// ============================================================================
// Loader
// ============================================================================

/// Runs dashboard load cycles against a [`WalletApi`]
#[derive(Clone)]
pub struct DashboardLoader {
    api: Arc<dyn WalletApi>,
    queue: RequestQueue,
    steps: SharedSteps,
    address: String,
    chain_index: String,
    transaction_limit: u32,
    warmup_delay: Duration,
    busy: Arc<AtomicBool>,
}

impl std::fmt::Debug for DashboardLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardLoader")
            .field("address", &self.address)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl DashboardLoader {
    pub fn new(api: Arc<dyn WalletApi>, config: &ClientConfig) -> Self {
        Self::with_observer(api, config, NoProgress)
    }

    /// Loader that also forwards every step report to `observer`
    pub fn with_observer(
        api: Arc<dyn WalletApi>,
        config: &ClientConfig,
        observer: impl ProgressSink + 'static,
    ) -> Self {
        let steps = SharedSteps::new(StepTracker::new(
            DashboardStep::ALL.iter().map(|step| step.label()),
        ));
        let progress = Fanout::new()
            .with(Arc::new(steps.clone()))
            .with(Arc::new(observer));
        let queue = RequestQueue::builder()
            .config(config.dashboard_queue.clone())
            .progress(progress)
            .build();

        Self {
            api,
            queue,
            steps,
            address: config.wallet_address.clone(),
            chain_index: config.chain_index.clone(),
            transaction_limit: config.transaction_limit,
            warmup_delay: config.warmup_delay,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current state of every step
    pub fn steps(&self) -> Vec<LoadingStep> {
        self.steps.snapshot()
    }

    /// Percentage of steps completed in the current cycle
    pub fn progress(&self) -> f64 {
        self.steps.progress()
    }

    pub fn is_loading(&self) -> bool {
        self.busy.load(std::sync::atomic::Ordering::Acquire)
    }

    /// Run one full load cycle.
    ///
    /// Fails only when another cycle is already running on this loader.
    pub async fn load(&self) -> ClientResult<DashboardSnapshot> {
        let _busy = BusyGuard::claim(&self.busy)
            .ok_or_else(|| ClientError::RefreshBlocked("dashboard load already in progress".into()))?;

        self.steps.reset();
        tracing::info!(address = %self.address, "Loading dashboard");

        tokio::time::sleep(self.warmup_delay).await;

        let mut responses = DashboardResponses::default();
        let mut failed_steps = Vec::new();

        for step in DashboardStep::ALL {
            match self.fetch(step).await {
                Ok(body) => responses.set(step, body),
                Err(e) => {
                    tracing::warn!(step = step.label(), error = %e, "Step failed, using fallback");
                    failed_steps.push(step);
                }
            }
        }

        let mut snapshot = DashboardSnapshot::from_responses(&responses, Utc::now());
        snapshot.failed_steps = failed_steps;

        tracing::info!(
            tokens = snapshot.tokens.len(),
            transactions = snapshot.transactions.len(),
            portfolio_value = snapshot.portfolio_value,
            failed = snapshot.failed_steps.len(),
            "Dashboard loaded"
        );
        Ok(snapshot)
    }

    async fn fetch(&self, step: DashboardStep) -> QueueResult<Value> {
        let api = self.api.clone();
        let address = self.address.clone();
        let chain_index = self.chain_index.clone();
        let limit = self.transaction_limit;

        self.queue
            .enqueue(step.label(), move || {
                let api = api.clone();
                let address = address.clone();
                let chain_index = chain_index.clone();
                async move {
                    match step {
                        DashboardStep::TokenBalances => api.total_token_balances(&address).await,
                        DashboardStep::TransactionHistory => {
                            api.transaction_history(&address, &chain_index, limit).await
                        }
                        DashboardStep::PortfolioValue => api.token_value(&address).await,
                        DashboardStep::MarketData => {
                            api.market_data(MarketQuery::HistoricalPrice, SOL_TOKEN_ADDRESS)
                                .await
                        }
                        DashboardStep::CurrentPrice => {
                            api.market_data(MarketQuery::Price, SOL_TOKEN_ADDRESS).await
                        }
                    }
                }
            })
            .await
    }
}
