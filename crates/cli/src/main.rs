//! Command line harness for the pool quote engine.
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use oolong_data::{CacheConfig, PoolResolver, PoolStateCache};
use oolong_domain::{Direction, FixedPointPrice, SqrtPriceX96};
use oolong_protocols::prelude::*;
use oolong_quoting::{QuoteConfig, QuoteEngine, QuoteSession, SessionSnapshot};
use prettytable::{Table, row};
use primitive_types::U256;
use rust_decimal::Decimal;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oolong")]
#[command(about = "Leveraged swap quotes for concentrated-liquidity pools", long_about = None)]
struct Cli {
    /// Pool registry JSON (defaults to POOL_REGISTRY)
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known pools
    Pools,
    /// Decode a Q64.96 square-root price offline
    Decode {
        /// sqrtPriceX96 as a decimal integer
        sqrt_price_x96: String,

        /// Fractional digits of the decoded price
        #[arg(long, default_value_t = 18)]
        scale: u32,
    },
    /// Quote a leveraged swap against live pool state
    Quote {
        /// Input token symbol or address
        #[arg(long)]
        from: String,

        /// Output token symbol or address
        #[arg(long)]
        to: String,

        /// Input amount
        #[arg(short, long)]
        amount: Decimal,

        /// Leverage multiplier
        #[arg(short, long, default_value = "1")]
        leverage: Decimal,

        /// Quote the short side
        #[arg(long)]
        short: bool,

        /// Swap direction after the first quote
        #[arg(long)]
        swap: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Pools => {
            let resolver = load_registry(cli.registry)?;
            let mut table = Table::new();
            table.add_row(row!["Pool", "Token0", "Token1"]);
            for pool in resolver.pools() {
                table.add_row(row![
                    pool.id,
                    format!("{} ({})", pool.token0.symbol, pool.token0.address),
                    format!("{} ({})", pool.token1.symbol, pool.token1.address),
                ]);
            }
            table.printstd();
        }
        Commands::Decode {
            sqrt_price_x96,
            scale,
        } => {
            let raw = U256::from_dec_str(&sqrt_price_x96)
                .map_err(|e| anyhow!("invalid sqrtPriceX96 {sqrt_price_x96}: {e:?}"))?;
            let sqrt = SqrtPriceX96::try_from(raw).context("sqrtPriceX96 exceeds 160 bits")?;
            let codec = FixedPointPrice::new(scale).context("invalid scale")?;

            let price = codec.decode(sqrt).context("decode failed")?;
            let mut table = Table::new();
            table.add_row(row!["sqrtPriceX96", sqrt]);
            table.add_row(row!["token1 per token0", price]);
            match codec.invert(price) {
                Ok(inverse) => table.add_row(row!["token0 per token1", inverse]),
                Err(e) => table.add_row(row!["token0 per token1", e]),
            };
            match codec.encode(price) {
                Ok(encoded) => table.add_row(row!["re-encoded", encoded]),
                Err(e) => table.add_row(row!["re-encoded", e]),
            };
            table.printstd();
        }
        Commands::Quote {
            from,
            to,
            amount,
            leverage,
            short,
            swap,
        } => {
            let resolver = Arc::new(load_registry(cli.registry)?);
            let from = resolver
                .token(&from)
                .cloned()
                .with_context(|| format!("unknown token {from}"))?;
            let to = resolver
                .token(&to)
                .cloned()
                .with_context(|| format!("unknown token {to}"))?;

            let rpc = Arc::new(RpcProvider::new(RpcConfig::from_env()?)?);
            info!(rpc = rpc.url(), "Using JSON-RPC endpoint");
            let provider = Arc::new(StateViewProvider::new(rpc, StateViewConfig::from_env()?));
            let cache = Arc::new(PoolStateCache::new(provider, CacheConfig::from_env()?));
            let engine = QuoteEngine::new(QuoteConfig::from_env()?)?;
            let session = QuoteSession::new(resolver, cache, engine);

            session.set_input_amount(amount).await?;
            session.set_leverage(leverage).await?;
            if short {
                session.set_direction(Direction::Short).await?;
            }

            if let Err(e) = session.select_pair(from, to).await {
                error!(session_id = %session.id(), error = %e, "No quote available");
                print_snapshot(&session.snapshot().await);
                return Err(e.into());
            }
            if swap {
                session.swap_direction().await?;
            }
            print_snapshot(&session.snapshot().await);
        }
    }

    Ok(())
}

fn load_registry(path: Option<PathBuf>) -> Result<PoolResolver> {
    let path = match path {
        Some(path) => path,
        None => env::var("POOL_REGISTRY")
            .map(PathBuf::from)
            .context("POOL_REGISTRY must be set in .env or environment, or pass --registry")?,
    };
    PoolResolver::from_path(&path)
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let mut table = Table::new();
    table.add_row(row!["Session", snapshot.session_id]);
    table.add_row(row!["State", snapshot.state]);
    if let Some(pool) = &snapshot.pool {
        table.add_row(row!["Pool", pool.id]);
    }
    if let Some(state) = &snapshot.pool_state {
        table.add_row(row!["sqrtPriceX96", state.sqrt_price_x96]);
        table.add_row(row!["Tick", state.tick]);
        table.add_row(row!["LP fee (pips)", state.lp_fee]);
        table.add_row(row!["Protocol fee", state.protocol_fee]);
        table.add_row(row!["Liquidity", state.liquidity]);
        table.add_row(row!["Fetched at", state.fetched_at]);
    }
    match &snapshot.quote {
        Some(quote) => {
            table.add_row(row![
                "Input",
                format!("{} {}", quote.input_amount, quote.input_token.symbol)
            ]);
            table.add_row(row![
                "Output",
                format!("{} {}", quote.output_amount, quote.output_token.symbol)
            ]);
            table.add_row(row![
                "Price",
                format!(
                    "{} {}/{}",
                    quote.effective_price, quote.output_token.symbol, quote.input_token.symbol
                )
            ]);
            table.add_row(row!["Leverage", format!("{}x", quote.leverage)]);
            table.add_row(row!["Direction", format!("{:?}", quote.direction)]);
            table.add_row(row!["Reversed", quote.reversed]);
        }
        None => {
            table.add_row(row!["Quote", "no quote available"]);
        }
    }
    if let Some(e) = &snapshot.last_error {
        table.add_row(row!["Error", e]);
    }
    table.printstd();
}
