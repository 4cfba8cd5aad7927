//! Remote REST endpoints
//!
//! [`WalletApi`] is the seam between the loaders and the network. Every call
//! returns the parsed JSON body or a [`RequestError`] classified the way the
//! queue's retry policies expect (429 vs. everything else).

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use walletdash_queue::RequestError;

use crate::config::ClientConfig;
use crate::cross_chain::SwapRequest;
use crate::error::{ClientError, ClientResult};

/// Result of one API call
pub type ApiResult = Result<Value, RequestError>;

/// Which market-data series to read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketQuery {
    HistoricalPrice,
    Price,
}

impl MarketQuery {
    /// Upstream path proxied through `/api/market_data`
    pub fn path(self) -> &'static str {
        match self {
            Self::HistoricalPrice => "/api/v5/dex/index/historical-price",
            Self::Price => "/api/v5/dex/market/price",
        }
    }
}

/// Portfolio, market and bridge endpoints consumed by the dashboard
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Token balances of `address`
    async fn total_token_balances(&self, address: &str) -> ApiResult;

    /// Most recent transactions of `address` on `chain_index`
    async fn transaction_history(&self, address: &str, chain_index: &str, limit: u32) -> ApiResult;

    /// Balance of a single token held by `address`
    async fn specific_token_balance(&self, address: &str, token_address: &str) -> ApiResult;

    /// Details of one transaction
    async fn transaction_by_hash(&self, chain_index: &str, tx_hash: &str) -> ApiResult;

    /// Total portfolio value of `address`
    async fn token_value(&self, address: &str) -> ApiResult;

    /// Price data for one token on the configured chain
    async fn market_data(&self, query: MarketQuery, token_address: &str) -> ApiResult;

    /// Any call through the market-data proxy
    async fn market_request(&self, request: &MarketRequest) -> ApiResult;

    async fn cross_chain_bridges(&self) -> ApiResult;

    async fn cross_chain_pairs(&self) -> ApiResult;

    /// Tokens tradable on `chain_index`
    async fn chain_tokens(&self, chain_index: &str) -> ApiResult;

    /// Ask the aggregator to build a cross-chain route
    async fn cross_chain_swap(&self, request: &SwapRequest) -> ApiResult;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfolioBody<'a> {
    address: &'a str,
    chains: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exclude_risk_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpecificBalanceBody<'a> {
    address: &'a str,
    token_contract_addresses: &'a str,
    exclude_risk_token: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TxHashBody<'a> {
    chain_index: &'a str,
    tx_hash: &'a str,
}

/// Body of `/api/market_data`, forwarded upstream as `method path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketRequest {
    pub method: &'static str,
    pub path: &'static str,
    pub data: [MarketTarget; 1],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTarget {
    pub chain_index: String,
    /// Wallet address, for calls that are scoped to one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub token_contract_address: String,
}

impl MarketRequest {
    pub fn new(
        method: &'static str,
        path: &'static str,
        chain_index: impl Into<String>,
        token_address: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path,
            data: [MarketTarget {
                chain_index: chain_index.into(),
                address: None,
                token_contract_address: token_address.into(),
            }],
        }
    }

    /// Scope the call to a wallet address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.data[0].address = Some(address.into());
        self
    }
}

/// reqwest implementation of [`WalletApi`]
#[derive(Debug, Clone)]
pub struct HttpWalletApi {
    base_url: String,
    chain_index: String,
    client: reqwest::Client,
}

impl HttpWalletApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.api_root().to_string(),
            chain_index: config.chain_index.clone(),
            client,
        })
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> ApiResult {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "POST");
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> ApiResult {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "GET");
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    fn portfolio_body<'a>(&'a self, address: &'a str) -> PortfolioBody<'a> {
        PortfolioBody {
            address,
            chains: &self.chain_index,
            exclude_risk_token: Some("0"),
            limit: None,
        }
    }
}

async fn read_json(response: reqwest::Response) -> ApiResult {
    let status = response.status();
    if !status.is_success() {
        return Err(RequestError::from_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
        ));
    }
    response.json::<Value>().await.map_err(RequestError::decode)
}

#[async_trait]
impl WalletApi for HttpWalletApi {
    async fn total_token_balances(&self, address: &str) -> ApiResult {
        self.post("/api/portfolio/total_token_balances", &self.portfolio_body(address))
            .await
    }

    async fn transaction_history(&self, address: &str, chain_index: &str, limit: u32) -> ApiResult {
        let body = PortfolioBody {
            address,
            chains: chain_index,
            exclude_risk_token: None,
            limit: Some(limit.to_string()),
        };
        self.post("/api/portfolio/history_by_add", &body).await
    }

    async fn specific_token_balance(&self, address: &str, token_address: &str) -> ApiResult {
        let body = SpecificBalanceBody {
            address,
            token_contract_addresses: token_address,
            exclude_risk_token: "0",
        };
        self.post("/api/portfolio/specific_token_balance", &body).await
    }

    async fn transaction_by_hash(&self, chain_index: &str, tx_hash: &str) -> ApiResult {
        let body = TxHashBody {
            chain_index,
            tx_hash,
        };
        self.post("/api/portfolio/transaction_by_hash", &body).await
    }

    async fn token_value(&self, address: &str) -> ApiResult {
        self.post("/api/portfolio/token_value", &self.portfolio_body(address))
            .await
    }

    async fn market_data(&self, query: MarketQuery, token_address: &str) -> ApiResult {
        let request = MarketRequest::new("GET", query.path(), &self.chain_index, token_address);
        self.market_request(&request).await
    }

    async fn market_request(&self, request: &MarketRequest) -> ApiResult {
        self.post("/api/market_data", request).await
    }

    async fn cross_chain_bridges(&self) -> ApiResult {
        self.get("/api/cross-chain-bridges", &[]).await
    }

    async fn cross_chain_pairs(&self) -> ApiResult {
        self.get("/api/cross-chain-pairs", &[]).await
    }

    async fn chain_tokens(&self, chain_index: &str) -> ApiResult {
        self.get(
            "/api/cross-chain-tokens",
            &[("chainIndex", chain_index), ("type", "chain-tokens")],
        )
        .await
    }

    async fn cross_chain_swap(&self, request: &SwapRequest) -> ApiResult {
        self.post("/api/cross-chain-swap", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portfolio_body_shape() {
        let api = HttpWalletApi::new(&ClientConfig::default()).unwrap();
        let body = serde_json::to_value(api.portfolio_body("addr")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"address": "addr", "chains": "501", "excludeRiskToken": "0"})
        );
    }

    #[test]
    fn test_market_body_shape() {
        let request = MarketRequest::new(
            "GET",
            MarketQuery::Price.path(),
            "501",
            crate::SOL_TOKEN_ADDRESS,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["path"], "/api/v5/dex/market/price");
        assert_eq!(value["data"][0]["chainIndex"], "501");
        assert_eq!(value["data"][0]["tokenContractAddress"], crate::SOL_TOKEN_ADDRESS);
        assert!(value["data"][0].get("address").is_none());

        let scoped = serde_json::to_value(request.with_address("wallet-1")).unwrap();
        assert_eq!(scoped["data"][0]["address"], "wallet-1");
    }

    #[test]
    fn test_lookup_body_shapes() {
        let body = serde_json::to_value(SpecificBalanceBody {
            address: "wallet-1",
            token_contract_addresses: "0xabc",
            exclude_risk_token: "0",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"address": "wallet-1", "tokenContractAddresses": "0xabc", "excludeRiskToken": "0"})
        );

        let body = serde_json::to_value(TxHashBody {
            chain_index: "1",
            tx_hash: "0xfeed",
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"chainIndex": "1", "txHash": "0xfeed"}));
    }
}
