//! `walletdash dashboard`

use colored::*;
use std::sync::Arc;
use std::time::Duration;
use walletdash_client::format::{format_currency, format_price, format_timestamp};
use walletdash_client::{ClientConfig, DashboardLoader, DashboardSnapshot, HttpWalletApi};

use crate::display;

/// Transactions shown in the activity list
const RECENT_TRANSACTIONS: usize = 10;

pub async fn run(
    config: &ClientConfig,
    watch: bool,
    interval: Duration,
    json: bool,
) -> anyhow::Result<()> {
    let api = Arc::new(HttpWalletApi::new(config)?);
    let loader = if json {
        DashboardLoader::new(api, config)
    } else {
        DashboardLoader::with_observer(api, config, display::step_report)
    };

    if !json {
        display::section(&format!("Wallet {}", loader.address()));
    }

    loop {
        // Ctrl-C also cuts short a load stuck in backoff
        let snapshot = tokio::select! {
            snapshot = loader.load() => snapshot?,
            _ = tokio::signal::ctrl_c() => return Ok(()),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        } else {
            print_snapshot(&snapshot, loader.progress());
        }

        if !watch {
            return Ok(());
        }

        if !json {
            display::note(&format!(
                "Next refresh in {}s (Ctrl-C to stop)",
                interval.as_secs()
            ));
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_snapshot(snapshot: &DashboardSnapshot, progress: f64) {
    display::section("Portfolio");
    display::field("Loaded", &display::progress_bar(progress));
    display::field("Total value", &format_currency(snapshot.portfolio_value));
    display::field(
        "SOL price",
        &if snapshot.current_price > 0.0 {
            format!("${:.2}", snapshot.current_price)
        } else {
            "$0.00".to_string()
        },
    );
    if !snapshot.price_history.is_empty() {
        let change = snapshot.price_change();
        display::field(
            "Price change",
            &display::signed(change, &format_price(change)).to_string(),
        );
    }
    display::field("Token holdings", &snapshot.stats.token_holdings.to_string());
    display::field("Transactions", &snapshot.stats.total_transactions.to_string());
    display::field("Active chains", &snapshot.stats.active_chains.to_string());
    display::field(
        "Updated",
        &snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    display::section("Tokens");
    if snapshot.tokens.is_empty() {
        display::note("No tokens worth more than $0.01");
    }
    for token in &snapshot.tokens {
        println!(
            "  {:<10} {:>18} {:>14} {:>14}",
            token.symbol.bright_white(),
            format!("{:.6}", token.balance),
            format!("${:.4}", token.price),
            format_currency(token.value()).bright_cyan()
        );
    }

    display::section("Recent activity");
    if snapshot.transactions.is_empty() {
        display::note("No transactions");
    }
    for tx in snapshot.transactions.iter().take(RECENT_TRANSACTIONS) {
        let when = tx
            .tx_time
            .map(|t| format_timestamp(t.timestamp_millis()))
            .unwrap_or_else(|| "Recent".to_string());
        println!(
            "  {:<17} {:<6} {:>16}  {}",
            when,
            tx.symbol,
            display::signed(tx.amount, &format!("{:.6}", tx.amount)),
            tx.display_hash().bright_black()
        );
    }

    for step in &snapshot.failed_steps {
        display::warning(&format!("{} unavailable, showing empty data", step.label()));
    }
    if snapshot.is_complete() {
        display::success("All data loaded");
    }
}
