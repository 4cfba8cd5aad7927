//! `HttpWalletApi` against an in-process axum server.

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use walletdash_client::{
    ClientConfig, DashboardLoader, HttpWalletApi, MarketQuery, MarketRequest, WalletApi,
    SOL_TOKEN_ADDRESS,
};
use walletdash_queue::{QueueConfig, RequestError};

async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn config_for(base_url: String) -> ClientConfig {
    let fast = QueueConfig {
        min_delay: std::time::Duration::ZERO,
        max_retries: 1,
        initial_delay: std::time::Duration::from_millis(10),
        max_backoff: std::time::Duration::from_millis(20),
        linear_step: std::time::Duration::from_millis(10),
    };
    ClientConfig {
        base_url,
        warmup_delay: std::time::Duration::ZERO,
        dashboard_queue: fast.clone(),
        cross_chain_queue: fast,
        ..ClientConfig::default()
    }
}

fn echo_routes() -> Router {
    Router::new()
        .route(
            "/api/portfolio/total_token_balances",
            post(|Json(body): Json<Value>| async move { Json(json!({"echo": body})) }),
        )
        .route(
            "/api/portfolio/history_by_add",
            post(|Json(body): Json<Value>| async move { Json(json!({"echo": body})) }),
        )
        .route(
            "/api/portfolio/specific_token_balance",
            post(|Json(body): Json<Value>| async move { Json(json!({"echo": body})) }),
        )
        .route(
            "/api/portfolio/transaction_by_hash",
            post(|Json(body): Json<Value>| async move { Json(json!({"echo": body})) }),
        )
        .route(
            "/api/market_data",
            post(|Json(body): Json<Value>| async move { Json(json!({"echo": body})) }),
        )
        .route(
            "/api/cross-chain-tokens",
            get(|Query(query): Query<HashMap<String, String>>| async move {
                Json(json!({"success": true, "query": query, "tokens": []}))
            }),
        )
        .route(
            "/api/cross-chain-bridges",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        )
        .route(
            "/api/cross-chain-pairs",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        )
        .route("/api/portfolio/token_value", post(|| async { "not json" }))
}

#[tokio::test]
async fn test_request_bodies() {
    let base = spawn_server(echo_routes()).await;
    let api = HttpWalletApi::new(&config_for(base)).unwrap();

    let body = api.total_token_balances("wallet-1").await.unwrap();
    assert_eq!(
        body["echo"],
        json!({"address": "wallet-1", "chains": "501", "excludeRiskToken": "0"})
    );

    let body = api.transaction_history("wallet-1", "42161", 20).await.unwrap();
    assert_eq!(
        body["echo"],
        json!({"address": "wallet-1", "chains": "42161", "limit": "20"})
    );

    let body = api.specific_token_balance("wallet-1", "0xa0b8").await.unwrap();
    assert_eq!(
        body["echo"],
        json!({"address": "wallet-1", "tokenContractAddresses": "0xa0b8", "excludeRiskToken": "0"})
    );

    let body = api.transaction_by_hash("1", "0xfeed").await.unwrap();
    assert_eq!(body["echo"], json!({"chainIndex": "1", "txHash": "0xfeed"}));

    let request = MarketRequest::new("POST", "/api/v5/dex/market/price", "1", "0xa0b8")
        .with_address("wallet-1");
    let body = api.market_request(&request).await.unwrap();
    assert_eq!(
        body["echo"],
        json!({"method": "POST", "path": "/api/v5/dex/market/price", "data": [
            {"chainIndex": "1", "address": "wallet-1", "tokenContractAddress": "0xa0b8"}
        ]})
    );

    let body = api
        .market_data(MarketQuery::HistoricalPrice, SOL_TOKEN_ADDRESS)
        .await
        .unwrap();
    assert_eq!(body["echo"]["method"], "GET");
    assert_eq!(body["echo"]["path"], "/api/v5/dex/index/historical-price");
    assert_eq!(body["echo"]["data"][0]["tokenContractAddress"], SOL_TOKEN_ADDRESS);

    let body = api.chain_tokens("56").await.unwrap();
    assert_eq!(body["query"]["chainIndex"], "56");
    assert_eq!(body["query"]["type"], "chain-tokens");
}

#[tokio::test]
async fn test_error_classification() {
    let base = spawn_server(echo_routes()).await;
    let api = HttpWalletApi::new(&config_for(base)).unwrap();

    assert_eq!(api.cross_chain_bridges().await, Err(RequestError::RateLimited));

    match api.cross_chain_pairs().await {
        Err(RequestError::Status { status, reason }) => {
            assert_eq!(status, 502);
            assert_eq!(reason, "Bad Gateway");
        }
        other => panic!("expected a status error, got {other:?}"),
    }

    assert!(matches!(
        api.token_value("wallet-1").await,
        Err(RequestError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpWalletApi::new(&config_for(format!("http://{addr}"))).unwrap();
    assert!(matches!(
        api.cross_chain_bridges().await,
        Err(RequestError::Network { .. })
    ));
}

#[tokio::test]
async fn test_dashboard_over_http() {
    let app = Router::new()
        .route(
            "/api/portfolio/total_token_balances",
            post(|| async {
                Json(json!({"data": [{"tokenAssets": [
                    {"symbol": "SOL", "balance": "1.5", "tokenPrice": "120"}
                ]}]}))
            }),
        )
        .route(
            "/api/portfolio/history_by_add",
            post(|| async { Json(json!({"data": [{"transactions": []}]})) }),
        )
        .route(
            "/api/portfolio/token_value",
            post(|| async { Json(json!({"data": [{"totalValue": "180"}]})) }),
        )
        .route(
            "/api/market_data",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "") }),
        );
    let base = spawn_server(app).await;
    let config = config_for(base);
    let api = Arc::new(HttpWalletApi::new(&config).unwrap());
    let loader = DashboardLoader::new(api, &config);

    let snapshot = loader.load().await.unwrap();

    assert_eq!(snapshot.portfolio_value, 180.0);
    assert_eq!(snapshot.tokens.len(), 1);
    // both market-data steps hit the rate limit, the price falls back to SOL's
    assert_eq!(snapshot.failed_steps.len(), 2);
    assert_eq!(snapshot.current_price, 120.0);
}
