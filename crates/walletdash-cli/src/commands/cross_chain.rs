//! `walletdash bridges | validate | quote | chains`

use colored::*;
use std::sync::Arc;
use walletdash_client::format::format_currency;
use walletdash_client::{
    validate_recipient, Chain, ClientConfig, CrossChainCatalog, CrossChainLoader, HttpWalletApi,
    RouteSort, SwapParams, CHAINS,
};

use crate::display;

/// Inputs of `walletdash quote`
pub struct QuoteArgs {
    pub from: Chain,
    pub to: Chain,
    pub from_token: Option<String>,
    pub to_token: Option<String>,
    /// `None` with `max` set
    pub amount: Option<String>,
    pub max: bool,
    pub recipient: String,
    pub slippage: String,
    pub fee_percent: String,
    pub sort: RouteSort,
}

fn loader(config: &ClientConfig) -> anyhow::Result<CrossChainLoader> {
    let api = Arc::new(HttpWalletApi::new(config)?);
    Ok(CrossChainLoader::with_observer(api, config, display::step_report))
}

/// Load the catalogue for a chain pair and apply explicit token choices
async fn load(
    loader: &CrossChainLoader,
    from: Chain,
    to: Chain,
    from_token: Option<&str>,
    to_token: Option<&str>,
) -> anyhow::Result<CrossChainCatalog> {
    display::section(&format!("{from} → {to}"));
    let catalog = loader.load_all(from, to).await?;

    let rate_limit = loader.rate_limit();
    if rate_limit.is_rate_limited {
        display::warning(&format!(
            "Rate limited by the bridge API, wait {}s before refreshing",
            loader.rate_limit_countdown()
        ));
    }

    if from_token.is_none() && to_token.is_none() {
        return Ok(catalog);
    }

    let from_symbol = from_token
        .map(str::to_string)
        .or_else(|| catalog.from_token.as_ref().map(|t| t.symbol.clone()))
        .unwrap_or_default();
    let to_symbol = to_token
        .map(str::to_string)
        .or_else(|| catalog.to_token.as_ref().map(|t| t.symbol.clone()))
        .unwrap_or_default();
    loader.select_tokens(&from_symbol, &to_symbol)?;
    Ok(loader.catalog())
}

pub fn chains() {
    display::section("Supported chains");
    for chain in CHAINS {
        let tag = if chain.is_solana() { " (required on one side)" } else { "" };
        println!("  {:<8} {}{}", chain.index.bright_cyan(), chain.name, tag.bright_black());
    }

    display::section("Route preferences");
    for sort in RouteSort::ALL {
        println!("  {:<8} {}", sort.code().bright_cyan(), sort.label());
    }
}

pub async fn bridges(config: &ClientConfig, from: Chain, to: Chain) -> anyhow::Result<()> {
    let loader = loader(config)?;
    let catalog = load(&loader, from, to, None, None).await?;

    display::section("Bridges");
    if catalog.bridges.is_empty() {
        display::note("No bridges loaded");
    }
    for bridge in &catalog.bridges {
        let serves = bridge.supported_chains.iter().any(|c| c == from.index)
            && bridge.supported_chains.iter().any(|c| c == to.index);
        let marker = if serves { "●".bright_green() } else { "○".bright_black() };
        println!(
            "  {} {:<24} chains: {}",
            marker,
            bridge.bridge_name,
            bridge.supported_chains.join(", ").bright_black()
        );
    }

    display::section("Supported pairs");
    let pairs = catalog.chain_pairs();
    if pairs.is_empty() {
        display::note(&format!("No supported pairs between {from} and {to}"));
    }
    for pair in pairs {
        println!("  {} → {}", pair.from_token_symbol, pair.to_token_symbol);
    }

    display::section("All routes");
    for (from_chain, to_chain, pairs) in catalog.chain_combinations() {
        let symbols: Vec<String> = pairs
            .iter()
            .map(|p| format!("{} → {}", p.from_token_symbol, p.to_token_symbol))
            .collect();
        println!(
            "  {:<22} {}",
            format!("{from_chain} → {to_chain}").bright_white(),
            symbols.join(", ").bright_black()
        );
    }

    display::section("Tokens");
    display::field(&format!("{from} tokens"), &catalog.from_tokens.len().to_string());
    display::field(&format!("{to} tokens"), &catalog.to_tokens.len().to_string());
    if let (Some(f), Some(t)) = (&catalog.from_token, &catalog.to_token) {
        display::field("Default selection", &format!("{} → {}", f.symbol, t.symbol));
    }
    display::field("Requests served", &loader.rate_limit().request_count.to_string());
    Ok(())
}

pub async fn validate(
    config: &ClientConfig,
    from: Chain,
    to: Chain,
    from_token: Option<&str>,
    to_token: Option<&str>,
    recipient: Option<&str>,
) -> anyhow::Result<()> {
    let loader = loader(config)?;
    let catalog = load(&loader, from, to, from_token, to_token).await?;
    let validation = catalog.validation();

    display::section("Pair validation");
    if validation.is_valid {
        display::success(&validation.message);
        for bridge in &validation.available_bridges {
            display::note(&bridge.bridge_name);
        }
    } else {
        display::failure(&validation.message);
    }

    if let Some(recipient) = recipient {
        if validate_recipient(recipient, &to) {
            display::success(&format!("Recipient is a valid {to} address"));
        } else {
            display::failure(&format!("Invalid recipient address format for {to}"));
        }
    }
    Ok(())
}

pub async fn quote(config: &ClientConfig, args: QuoteArgs) -> anyhow::Result<()> {
    let loader = loader(config)?;
    let catalog = load(
        &loader,
        args.from,
        args.to,
        args.from_token.as_deref(),
        args.to_token.as_deref(),
    )
    .await?;

    let amount = match args.amount {
        Some(amount) => amount,
        None => {
            loader.load_balances().await?;
            let balance = loader.source_balance().ok_or_else(|| {
                anyhow::anyhow!("--max needs a Solana source token with a known balance")
            })?;
            display::field(
                "Balance",
                &format!("{:.6} ({})", balance.balance, format_currency(balance.usd_value)),
            );
            loader
                .max_amount()
                .ok_or_else(|| anyhow::anyhow!("No source token selected"))?
        }
    };
    if args.max && amount.parse::<f64>().map_or(true, |a| a <= 0.0) {
        anyhow::bail!("Nothing to send: the source token balance is empty");
    }

    let params = SwapParams {
        from_token: catalog.from_token.clone(),
        to_token: catalog.to_token.clone(),
        amount,
        user_wallet: config.wallet_address.clone(),
        recipient: args.recipient,
        slippage: args.slippage,
        fee_percent: args.fee_percent,
        sort: args.sort,
        ..SwapParams::new(args.from, args.to)
    };

    display::section(&format!("Route ({})", args.sort.label()));
    let quote = loader.quote(&params).await?;
    let route = &quote.route;
    let symbol = |token: &Option<walletdash_client::Token>| {
        token.as_ref().map(|t| t.symbol.clone()).unwrap_or_default()
    };

    display::field("Bridge", &route.router.bridge_name);
    display::field(
        "You send",
        &format!("{} {}", params.amount, symbol(&params.from_token)),
    );
    display::field(
        "You receive",
        &format!("{} {}", quote.estimated_receive, symbol(&params.to_token)),
    );
    display::field("Minimum received", &route.minimum_receive);
    display::field("Bridge fee", &route.router.cross_chain_fee);
    if route.router.other_native_fee != "0" && !route.router.other_native_fee.is_empty() {
        display::field("Native fee", &route.router.other_native_fee);
    }
    match &route.tx {
        Some(tx) => display::success(&format!(
            "Unsigned transaction ready ({} bytes of calldata) for {}",
            tx.data.trim_start_matches("0x").len() / 2,
            tx.to
        )),
        None => display::note("No transaction payload returned"),
    }
    Ok(())
}
