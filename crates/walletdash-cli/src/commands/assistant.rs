//! `walletdash ask`

use colored::*;
use std::sync::Arc;
use walletdash_client::format::{format_currency, format_price, format_timestamp};
use walletdash_client::{
    Assistant, AssistantReply, ClientConfig, HttpWalletApi, Intent, KeywordParser,
};

use crate::display;

/// Candles printed under a candlestick reply
const CANDLE_ROWS: usize = 8;

pub async fn run(
    config: &ClientConfig,
    message: &str,
    intent: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let api = Arc::new(HttpWalletApi::new(config)?);
    let parser = Arc::new(KeywordParser::new());
    let assistant = if json {
        Assistant::new(api, parser, config)
    } else {
        Assistant::with_observer(api, parser, config, display::step_report)
    };

    let reply = match intent {
        // a model's raw reply, read the same way as a live one
        Some(raw) => assistant.respond(&Intent::from_reply(raw)).await,
        None => assistant.ask(message).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
    } else {
        print_reply(&reply)?;
    }
    Ok(())
}

fn print_reply(reply: &AssistantReply) -> anyhow::Result<()> {
    match reply {
        AssistantReply::Text { text } => {
            println!();
            println!("  {text}");
        }
        AssistantReply::Transactions {
            title,
            transactions,
        } => {
            display::section(title);
            if transactions.is_empty() {
                display::note("No transactions");
            }
            for tx in transactions {
                let when = tx
                    .tx_time
                    .map(|t| format_timestamp(t.timestamp_millis()))
                    .unwrap_or_else(|| "Recent".to_string());
                println!(
                    "  {:<17} {:<6} {:>16}  {} {}",
                    when,
                    tx.symbol,
                    display::signed(tx.amount, &format!("{:.6}", tx.amount)),
                    tx.display_hash().bright_black(),
                    tx.status.as_deref().unwrap_or_default().bright_black()
                );
            }
        }
        AssistantReply::Balances {
            title,
            holdings,
            total_value,
        } => {
            display::section(title);
            if holdings.is_empty() {
                display::note("No tokens worth more than $0.01");
            }
            for token in holdings {
                println!(
                    "  {:<10} {:>18} {:>14}",
                    token.symbol.bright_white(),
                    format!("{:.6}", token.balance),
                    format_currency(token.value()).bright_cyan()
                );
            }
            display::field("Total value", &format_currency(*total_value));
        }
        AssistantReply::PriceChart {
            title,
            points,
            current,
            change,
        } => {
            display::section(title);
            display::field("Points", &points.len().to_string());
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                display::field(
                    "Range",
                    &format!("{} to {}", format_timestamp(first.time), format_timestamp(last.time)),
                );
            }
            display::field("Current price", &format_price(*current));
            display::field(
                "Change",
                &display::signed(*change, &format_price(*change)).to_string(),
            );
        }
        AssistantReply::Candles {
            title,
            candles,
            current,
            change,
        } => {
            display::section(title);
            let skip = candles.len().saturating_sub(CANDLE_ROWS);
            for candle in candles.iter().skip(skip) {
                println!(
                    "  {:<17} o {:>12} h {:>12} l {:>12} c {:>12}",
                    format_timestamp(candle.time),
                    format_price(candle.open),
                    format_price(candle.high),
                    format_price(candle.low),
                    format_price(candle.close).bright_cyan()
                );
            }
            display::field("Last close", &format_price(*current));
            display::field(
                "Change",
                &display::signed(*change, &format_price(*change)).to_string(),
            );
        }
        AssistantReply::Data { title, body } => {
            display::section(title);
            println!("{}", serde_json::to_string_pretty(body)?);
        }
    }
    Ok(())
}
