//! Chat assistant intent dispatch
//!
//! A language model reads the user's message and answers with an [`Intent`]:
//! a request type, a token name and, for lookups by hash, a transaction hash.
//! [`Assistant`] resolves the token to a contract address and chain, runs the
//! matching portfolio or market-data request through its own
//! [`RequestQueue`], and shapes the response into an [`AssistantReply`].
//!
//! The model sits behind [`IntentParser`]. [`KeywordParser`] is the
//! deterministic fallback used when no model is configured.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use walletdash_queue::{NoProgress, ProgressSink, RequestQueue};

use crate::api::{MarketRequest, WalletApi};
use crate::config::ClientConfig;
use crate::dashboard::{last_change, price_series, PricePoint, TokenHolding, TransactionRecord};
use crate::error::{ClientError, ClientResult};
use crate::json::{entry_array, first_entry, number, number_field};

/// Transactions shown in a history reply
const HISTORY_ROWS: usize = 5;

/// Holdings shown in a balance reply
const BALANCE_ROWS: usize = 10;

/// Holdings worth less than this are left out of a balance reply
const DUST_THRESHOLD_USD: f64 = 0.01;

/// Entries requested from the history endpoint
const HISTORY_LIMIT: u32 = 20;

/// Placeholder for chains whose native token has no contract
const NATIVE_EVM: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

// ============================================================================
// Tokens
// ============================================================================

/// Token names the assistant understands, with the address and chain used
/// to query them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KnownToken {
    pub name: &'static str,
    pub address: &'static str,
    pub chain_index: &'static str,
}

const fn known(name: &'static str, address: &'static str, chain_index: &'static str) -> KnownToken {
    KnownToken {
        name,
        address,
        chain_index,
    }
}

pub const KNOWN_TOKENS: [KnownToken; 28] = [
    known("ETH", NATIVE_EVM, "1"),
    known("OP", "0x4200000000000000000000000000000000000042", "10"),
    known("BSC", NATIVE_EVM, "56"),
    known("OKT", NATIVE_EVM, "66"),
    known("SONIC", NATIVE_EVM, "146"),
    known("XLAYER", NATIVE_EVM, "196"),
    known("POLYGON", NATIVE_EVM, "137"),
    known("ARB", "0x912CE59144191C1204E64559FE8253a0e49E6548", "42161"),
    known("AVAX", NATIVE_EVM, "43114"),
    known("ZKSYNC", "0x5A7d6b2F92C77FAD6CCaBd7EE0624E64907Eaf3E", "324"),
    known("POLYZKEVM", NATIVE_EVM, "1101"),
    known("BASE", NATIVE_EVM, "8453"),
    known("LINEA", NATIVE_EVM, "59144"),
    known("FTM", NATIVE_EVM, "250"),
    known("MANTLE", NATIVE_EVM, "5000"),
    known("CFX", NATIVE_EVM, "1030"),
    known("METIS", NATIVE_EVM, "1088"),
    known("MERLIN", NATIVE_EVM, "4200"),
    known("BLAST", NATIVE_EVM, "81457"),
    known("MANTA", NATIVE_EVM, "169"),
    known("SCROLL", NATIVE_EVM, "534352"),
    known("CRO", NATIVE_EVM, "25"),
    known("ZETA", NATIVE_EVM, "7000"),
    known("TRON", "TRX", "195"),
    known("SOL", crate::SOL_TOKEN_ADDRESS, crate::SOLANA_CHAIN_INDEX),
    known("SUI", "0x2::sui::SUI", "784"),
    known("TON", "0x582d872a1b094fc48f5de31d3b73f2d9be47def1", "607"),
    known("MYS", "3", "3"),
];

impl KnownToken {
    /// Look a token up by name, ignoring case
    pub fn find(name: &str) -> Option<Self> {
        let name = name.trim();
        KNOWN_TOKENS
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .copied()
    }
}

// ============================================================================
// Intents
// ============================================================================

/// What the user asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    TokenBalance,
    TotalTokenBalance,
    TotalValue,
    SpecificTokenBalance,
    TransactionHistory,
    TransactionByHash,
    TransactionDetail,
    Price,
    Trades,
    Candlestick,
    CandlestickHistory,
    HistoricalPrice,
    HistoricalIndexPrice,
    BatchPrice,
    TokenIndexPrice,
}

/// How a market-data intent is forwarded through the proxy
struct MarketRoute {
    method: &'static str,
    path: &'static str,
    /// Whether the wallet address goes into the request
    scoped: bool,
}

impl IntentKind {
    pub const ALL: [Self; 15] = [
        Self::TokenBalance,
        Self::TotalTokenBalance,
        Self::TotalValue,
        Self::SpecificTokenBalance,
        Self::TransactionHistory,
        Self::TransactionByHash,
        Self::TransactionDetail,
        Self::Price,
        Self::Trades,
        Self::Candlestick,
        Self::CandlestickHistory,
        Self::HistoricalPrice,
        Self::HistoricalIndexPrice,
        Self::BatchPrice,
        Self::TokenIndexPrice,
    ];

    /// The `type` value a model answers with
    pub fn code(self) -> &'static str {
        match self {
            Self::TokenBalance => "token_balance",
            Self::TotalTokenBalance => "total_token_balance",
            Self::TotalValue => "total_value",
            Self::SpecificTokenBalance => "specific_token_balance",
            Self::TransactionHistory => "transaction_history",
            Self::TransactionByHash => "tx_by_hash",
            Self::TransactionDetail => "spe_transaction",
            Self::Price => "price",
            Self::Trades => "trades",
            Self::Candlestick => "candlestick",
            Self::CandlestickHistory => "candlestick_history",
            Self::HistoricalPrice => "hist_data",
            Self::HistoricalIndexPrice => "historical_index_price",
            Self::BatchPrice => "batch_price",
            Self::TokenIndexPrice => "token_index_price",
        }
    }

    /// Step name used for queue progress
    pub fn label(self) -> &'static str {
        match self {
            Self::TokenBalance | Self::TotalTokenBalance => "Token Balances",
            Self::TotalValue => "Portfolio Value",
            Self::SpecificTokenBalance => "Token Balance",
            Self::TransactionHistory => "Transaction History",
            Self::TransactionByHash | Self::TransactionDetail => "Transaction Details",
            Self::Price => "Current Price",
            Self::Trades => "Recent Trades",
            Self::Candlestick => "Current Candlestick Chart",
            Self::CandlestickHistory => "Historical Candlestick Chart",
            Self::HistoricalPrice => "Historical Price Data",
            Self::HistoricalIndexPrice => "Historical Index Price",
            Self::BatchPrice => "Price Info",
            Self::TokenIndexPrice => "Index Price",
        }
    }

    fn market_route(self) -> Option<MarketRoute> {
        let route = |method, path, scoped| {
            Some(MarketRoute {
                method,
                path,
                scoped,
            })
        };
        match self {
            Self::Price => route("POST", "/api/v5/dex/market/price", true),
            Self::Trades => route("GET", "/api/v5/dex/market/trades", true),
            Self::Candlestick => route("GET", "/api/v5/dex/market/candles", false),
            Self::CandlestickHistory => route("GET", "/api/v5/dex/market/historical-candles", false),
            Self::HistoricalPrice => route("GET", "/api/v5/dex/index/historical-price", true),
            Self::HistoricalIndexPrice => {
                route("GET", "/api/v5/dex/index/historical-price", false)
            }
            Self::BatchPrice => route("POST", "/api/v5/dex/market/price-info", true),
            Self::TokenIndexPrice => route("POST", "/api/dex/index/current-price", false),
            Self::TransactionDetail => route(
                "GET",
                "/api/v5/dex/post-transaction/transaction-detail-by-txhash",
                true,
            ),
            _ => None,
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for IntentKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| ClientError::validation(format!("Unknown request type: {code}")))
    }
}

/// A model's reading of one chat message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Request type, see [`IntentKind::code`]
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(default, alias = "txHash", skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    /// Free-form answer when no data is needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Intent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn request(kind: IntentKind, token_name: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.code().to_string()),
            token_name: Some(token_name.into()),
            ..Self::default()
        }
    }

    /// Read a model reply. JSON, optionally inside a ```json fence, becomes
    /// an intent; anything else is kept as plain text.
    pub fn from_reply(reply: &str) -> Self {
        let trimmed = reply.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();
        serde_json::from_str(body).unwrap_or_else(|_| Self::text(trimmed))
    }

    /// The data request this intent asks for: a known type and a token name
    pub fn action(&self) -> Option<(IntentKind, &str)> {
        let kind = self.kind.as_deref()?.parse().ok()?;
        let token = self.token_name.as_deref().filter(|t| !t.trim().is_empty())?;
        Some((kind, token))
    }
}

// ============================================================================
// Intent parsers
// ============================================================================

/// Turns a chat message into an [`Intent`]
#[async_trait]
pub trait IntentParser: Send + Sync {
    fn name(&self) -> &'static str;

    async fn parse(&self, message: &str) -> ClientResult<Intent>;
}

/// Deterministic fallback when no model is available: matches a few
/// keywords and a token name, defaulting to SOL
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordParser;

impl KeywordParser {
    pub fn new() -> Self {
        Self
    }

    fn classify(message: &str) -> Intent {
        let lower = message.to_lowercase();
        let words: Vec<&str> = message
            .split(|c: char| !c.is_ascii_alphanumeric() && c != ':')
            .filter(|w| !w.is_empty())
            .collect();
        let token = words
            .iter()
            .find_map(|w| KnownToken::find(w))
            .map(|t| t.name)
            .unwrap_or("SOL");
        if let Some(hash) = words.iter().find(|w| looks_like_tx_hash(w)) {
            return Intent {
                transaction_hash: Some(hash.to_string()),
                ..Intent::request(IntentKind::TransactionByHash, token)
            };
        }

        let has = |needle: &str| lower.contains(needle);
        let kind = if has("transaction") || has("activity") {
            IntentKind::TransactionHistory
        } else if has("balance") || has("holding") || has("portfolio") {
            if token == "SOL" {
                IntentKind::TokenBalance
            } else {
                IntentKind::SpecificTokenBalance
            }
        } else if has("candle") {
            IntentKind::Candlestick
        } else if has("trade") {
            IntentKind::Trades
        } else if has("chart") || has("history") || has("historical") {
            IntentKind::HistoricalPrice
        } else if has("price") || has("worth") {
            IntentKind::Price
        } else {
            return Intent::text(
                "I can show your balances, recent transactions, prices, trades and price \
                 charts. Try \"Show me my token balance\" or \"SOL price chart\".",
            );
        };
        Intent::request(kind, token)
    }
}

#[async_trait]
impl IntentParser for KeywordParser {
    fn name(&self) -> &'static str {
        "Keyword"
    }

    async fn parse(&self, message: &str) -> ClientResult<Intent> {
        Ok(Self::classify(message))
    }
}

/// Solana signatures (base58, 64 to 88 chars) or EVM hashes (`0x` + 64 hex)
fn looks_like_tx_hash(word: &str) -> bool {
    if let Some(digits) = word.strip_prefix("0x") {
        return digits.len() == 64 && hex::decode(digits).is_ok();
    }
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (64..=88).contains(&word.len()) && word.chars().all(|c| BASE58.contains(c))
}

// ============================================================================
// Replies
// ============================================================================

/// One OHLCV candle, oldest first in a reply
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Candle {
    /// Unix time in milliseconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Either `[ts, open, high, low, close, volume]` or an object with those fields
    fn from_json(item: &Value) -> Option<Self> {
        match item {
            Value::Array(fields) => {
                let at = |i: usize| fields.get(i).map(number).unwrap_or(0.0);
                Some(Self {
                    time: at(0) as i64,
                    open: at(1),
                    high: at(2),
                    low: at(3),
                    close: at(4),
                    volume: at(5),
                })
            }
            Value::Object(_) => {
                let time = item.get("timestamp").or_else(|| item.get("time")).map(number);
                Some(Self {
                    time: time.unwrap_or(0.0) as i64,
                    open: number_field(item, "open"),
                    high: number_field(item, "high"),
                    low: number_field(item, "low"),
                    close: number_field(item, "close"),
                    volume: number_field(item, "volume"),
                })
            }
            _ => None,
        }
    }
}

/// What the assistant answers with
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssistantReply {
    /// Plain answer, also used for failed lookups
    Text { text: String },
    /// Most recent non-zero transactions
    Transactions {
        title: String,
        transactions: Vec<TransactionRecord>,
    },
    /// Holdings above the dust threshold, most valuable first
    Balances {
        title: String,
        holdings: Vec<TokenHolding>,
        total_value: f64,
    },
    /// Price series, oldest first
    PriceChart {
        title: String,
        points: Vec<PricePoint>,
        current: f64,
        change: f64,
    },
    /// Candles, oldest first
    Candles {
        title: String,
        candles: Vec<Candle>,
        current: f64,
        change: f64,
    },
    /// Any other lookup, passed through
    Data { title: String, body: Value },
}

impl AssistantReply {
    fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Shape a successful response for `kind`
    pub fn from_response(kind: IntentKind, token: &str, body: Value) -> Self {
        match kind {
            IntentKind::TransactionHistory => {
                let transactions = history_entries(&body)
                    .iter()
                    .map(TransactionRecord::from_json)
                    .filter(|tx| tx.amount.abs() > 0.0)
                    .take(HISTORY_ROWS)
                    .collect();
                Self::Transactions {
                    title: "Recent Transaction History".to_string(),
                    transactions,
                }
            }
            IntentKind::TokenBalance => {
                let mut holdings: Vec<TokenHolding> = entry_array(&body, "tokenAssets")
                    .iter()
                    .map(TokenHolding::from_json)
                    .filter(|t| t.value() > DUST_THRESHOLD_USD)
                    .collect();
                holdings.sort_by(|a, b| b.value().total_cmp(&a.value()));
                holdings.truncate(BALANCE_ROWS);
                let total_value = holdings.iter().map(TokenHolding::value).sum();
                Self::Balances {
                    title: "Token Balances".to_string(),
                    holdings,
                    total_value,
                }
            }
            IntentKind::HistoricalPrice | IntentKind::HistoricalIndexPrice => {
                let points = price_series(&body);
                let current = points.last().map(|p| p.price).unwrap_or(0.0);
                let change = last_change(points.iter().map(|p| p.price));
                Self::PriceChart {
                    title: format!("{} - {token}", kind.label()),
                    points,
                    current,
                    change,
                }
            }
            IntentKind::Candlestick | IntentKind::CandlestickHistory => {
                let candles: Vec<Candle> = body
                    .get("data")
                    .and_then(Value::as_array)
                    .map(|items| items.iter().rev().filter_map(Candle::from_json).collect())
                    .unwrap_or_default();
                let current = candles.last().map(|c| c.close).unwrap_or(0.0);
                let change = last_change(candles.iter().map(|c| c.close));
                Self::Candles {
                    title: format!("{} - {token}", kind.label()),
                    candles,
                    current,
                    change,
                }
            }
            _ => Self::Data {
                title: format!("{} - {token}", kind.label()),
                body,
            },
        }
    }
}

/// `transactionList` when present, else `transactions`
fn history_entries(body: &Value) -> &[Value] {
    let has_list = first_entry(body)
        .and_then(|entry| entry.get("transactionList"))
        .is_some_and(Value::is_array);
    if has_list {
        entry_array(body, "transactionList")
    } else {
        entry_array(body, "transactions")
    }
}

// ============================================================================
// Assistant
// ============================================================================

/// Answers chat messages with wallet and market data
#[derive(Clone)]
pub struct Assistant {
    api: Arc<dyn WalletApi>,
    parser: Arc<dyn IntentParser>,
    queue: RequestQueue,
    address: String,
}

impl fmt::Debug for Assistant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Assistant")
            .field("parser", &self.parser.name())
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl Assistant {
    pub fn new(api: Arc<dyn WalletApi>, parser: Arc<dyn IntentParser>, config: &ClientConfig) -> Self {
        Self::with_observer(api, parser, config, NoProgress)
    }

    /// Assistant whose queue reports every step transition to `observer`
    pub fn with_observer(
        api: Arc<dyn WalletApi>,
        parser: Arc<dyn IntentParser>,
        config: &ClientConfig,
        observer: impl ProgressSink + 'static,
    ) -> Self {
        let queue = RequestQueue::builder()
            .config(config.dashboard_queue.clone())
            .progress(observer)
            .build();
        Self {
            api,
            parser,
            queue,
            address: config.wallet_address.clone(),
        }
    }

    /// Interpret `message` and answer it.
    ///
    /// Fails only when the parser does; failed lookups become text replies.
    pub async fn ask(&self, message: &str) -> ClientResult<AssistantReply> {
        let intent = self.parser.parse(message).await?;
        tracing::debug!(parser = self.parser.name(), ?intent, "Message interpreted");
        Ok(self.respond(&intent).await)
    }

    /// Answer an already interpreted message
    pub async fn respond(&self, intent: &Intent) -> AssistantReply {
        let Some((kind, token)) = intent.action() else {
            return match &intent.text {
                Some(text) => AssistantReply::text(text.clone()),
                None => AssistantReply::text(serde_json::to_string(intent).unwrap_or_default()),
            };
        };

        match self.fetch(kind, token, intent.transaction_hash.as_deref()).await {
            Ok(body) => AssistantReply::from_response(kind, token, body),
            Err(e) => {
                tracing::warn!(kind = kind.code(), token, error = %e, "Assistant lookup failed");
                AssistantReply::text(format!("I couldn't fetch the data for {token}: {e}"))
            }
        }
    }

    async fn fetch(&self, kind: IntentKind, token: &str, tx_hash: Option<&str>) -> ClientResult<Value> {
        let target = KnownToken::find(token).ok_or_else(|| {
            ClientError::validation(format!("Token contract address not found for token: {token}"))
        })?;
        let tx_hash = match kind {
            IntentKind::TransactionByHash => Some(
                tx_hash
                    .filter(|h| !h.trim().is_empty())
                    .ok_or_else(|| ClientError::validation("A transaction hash is required"))?
                    .to_string(),
            ),
            _ => None,
        };
        let market = kind.market_route().map(|route| {
            let request = MarketRequest::new(route.method, route.path, target.chain_index, target.address);
            if route.scoped {
                request.with_address(&self.address)
            } else {
                request
            }
        });

        tracing::info!(kind = kind.code(), token = target.name, "Assistant lookup");
        let api = self.api.clone();
        let address = self.address.clone();
        let body = self
            .queue
            .enqueue(kind.label(), move || {
                let api = api.clone();
                let address = address.clone();
                let tx_hash = tx_hash.clone();
                let market = market.clone();
                async move {
                    match (kind, market) {
                        (_, Some(request)) => api.market_request(&request).await,
                        (IntentKind::SpecificTokenBalance, None) => {
                            api.specific_token_balance(&address, target.address).await
                        }
                        (IntentKind::TransactionHistory, None) => {
                            api.transaction_history(&address, target.chain_index, HISTORY_LIMIT)
                                .await
                        }
                        (IntentKind::TransactionByHash, None) => {
                            let tx_hash = tx_hash.unwrap_or_default();
                            api.transaction_by_hash(target.chain_index, &tx_hash).await
                        }
                        // token_balance, total_token_balance and total_value
                        (_, None) => api.total_token_balances(&address).await,
                    }
                }
            })
            .await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_known_tokens() {
        let sol = KnownToken::find("sol").unwrap();
        assert_eq!(sol.address, crate::SOL_TOKEN_ADDRESS);
        assert_eq!(sol.chain_index, "501");
        assert_eq!(KnownToken::find("ARB").unwrap().chain_index, "42161");
        assert!(KnownToken::find("DOGE").is_none());
    }

    #[test]
    fn test_intent_kind_codes() {
        for kind in IntentKind::ALL {
            assert_eq!(kind.code().parse::<IntentKind>().unwrap(), kind);
        }
        assert!("sell".parse::<IntentKind>().is_err());
    }

    #[test]
    fn test_intent_from_model_reply() {
        let intent = Intent::from_reply(
            "```json\n{\"type\": \"hist_data\", \"token_name\": \"ETH\"}\n```",
        );
        assert_eq!(intent.action(), Some((IntentKind::HistoricalPrice, "ETH")));

        let intent = Intent::from_reply(r#"{"type": "tx_by_hash", "token_name": "SOL", "txHash": "abc"}"#);
        assert_eq!(intent.transaction_hash.as_deref(), Some("abc"));

        let intent = Intent::from_reply("Staking spreads risk over validators.");
        assert_eq!(intent.action(), None);
        assert_eq!(intent.text.as_deref(), Some("Staking spreads risk over validators."));

        // a known type without a token is not actionable
        assert_eq!(Intent::from_reply(r#"{"type": "price"}"#).action(), None);
    }

    #[test]
    fn test_keyword_parser() {
        let parse = |m: &str| KeywordParser::classify(m);
        assert_eq!(
            parse("Show me my token balance").action(),
            Some((IntentKind::TokenBalance, "SOL"))
        );
        assert_eq!(
            parse("What's my ARB balance?").action(),
            Some((IntentKind::SpecificTokenBalance, "ARB"))
        );
        assert_eq!(
            parse("What are my recent transactions?").action(),
            Some((IntentKind::TransactionHistory, "SOL"))
        );
        assert_eq!(
            parse("ETH price chart").action(),
            Some((IntentKind::HistoricalPrice, "ETH"))
        );
        assert_eq!(parse("price of TON").action(), Some((IntentKind::Price, "TON")));
        assert_eq!(
            parse("show SOL candles").action(),
            Some((IntentKind::Candlestick, "SOL"))
        );

        let hash = format!("0x{}", "ab".repeat(32));
        let intent = parse(&format!("look up {hash} on ETH"));
        assert_eq!(intent.action(), Some((IntentKind::TransactionByHash, "ETH")));
        assert_eq!(intent.transaction_hash, Some(hash));

        let intent = parse("How do I minimize fees?");
        assert_eq!(intent.action(), None);
        assert!(intent.text.is_some());
    }

    #[test]
    fn test_balance_reply_sorts_and_drops_dust() {
        let body = json!({"data": [{"tokenAssets": [
            {"symbol": "BONK", "balance": "1000", "tokenPrice": "0.00001"},
            {"symbol": "USDC", "balance": "25", "tokenPrice": "1"},
            {"symbol": "SOL", "balance": "2", "tokenPrice": "150"}
        ]}]});
        let AssistantReply::Balances {
            holdings,
            total_value,
            ..
        } = AssistantReply::from_response(IntentKind::TokenBalance, "SOL", body)
        else {
            panic!("expected balances");
        };
        let symbols: Vec<&str> = holdings.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["SOL", "USDC"]);
        assert_eq!(total_value, 325.0);
    }

    #[test]
    fn test_history_reply_takes_five_nonzero() {
        let list: Vec<Value> = (0..8)
            .map(|i| {
                let amount = if i == 1 { "0" } else { "1.5" };
                json!({"txHash": format!("tx{i}"), "amount": amount})
            })
            .collect();
        let body = json!({"data": [{"transactionList": list, "transactions": []}]});
        let AssistantReply::Transactions { transactions, .. } =
            AssistantReply::from_response(IntentKind::TransactionHistory, "SOL", body)
        else {
            panic!("expected transactions");
        };
        let hashes: Vec<&str> = transactions.iter().filter_map(|t| t.tx_hash.as_deref()).collect();
        assert_eq!(hashes, vec!["tx0", "tx2", "tx3", "tx4", "tx5"]);
    }

    #[test]
    fn test_candle_reply_is_chronological() {
        let body = json!({"data": [
            ["1700000120000", "3", "4", "2", "3.5", "10"],
            ["1700000060000", "2", "3", "1", "3", "8"],
            {"time": "1700000000000", "open": "1", "high": "2", "low": "1", "close": "2"}
        ]});
        let AssistantReply::Candles {
            title,
            candles,
            current,
            change,
        } = AssistantReply::from_response(IntentKind::Candlestick, "SOL", body)
        else {
            panic!("expected candles");
        };
        assert_eq!(title, "Current Candlestick Chart - SOL");
        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].time, 1_700_000_000_000);
        assert_eq!(current, 3.5);
        assert_eq!(change, 0.5);
    }

    #[test]
    fn test_other_kinds_pass_data_through() {
        let body = json!({"data": [{"price": "2.5"}]});
        let reply = AssistantReply::from_response(IntentKind::Price, "OP", body.clone());
        assert_eq!(
            reply,
            AssistantReply::Data {
                title: "Current Price - OP".to_string(),
                body
            }
        );
    }
}
