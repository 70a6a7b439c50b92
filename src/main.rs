use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use share_market::{MarketConfig, MarketService, Money, UserId, utils};
use tracing_subscriber::EnvFilter;

/// Seed a share market database with demo owners, businesses and orders.
#[derive(Parser, Debug)]
#[command(name = "share-market", version)]
struct Args {
    /// Database directory. Overrides MARKET_DB_PATH.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Lock wait for acceptances in milliseconds, 0 waits indefinitely.
    /// Overrides MARKET_LOCK_TIMEOUT_MS.
    #[arg(long)]
    lock_timeout_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = MarketConfig::from_env();
    if let Some(db) = args.db {
        config = config.with_db_path(db);
    }
    if let Some(ms) = args.lock_timeout_ms {
        config = config.with_lock_timeout((ms > 0).then(|| Duration::from_millis(ms)));
    }

    let service = MarketService::open(&config).context("failed to open market store")?;
    seed(&service)?;
    service.flush()?;

    Ok(())
}

fn seed(service: &MarketService) -> anyhow::Result<()> {
    let owner1 = UserId::from(utils::new_uuid_to_bech32("user_")?);
    let owner2 = UserId::from(utils::new_uuid_to_bech32("user_")?);
    let buyer1 = UserId::from(utils::new_uuid_to_bech32("user_")?);
    let buyer2 = UserId::from(utils::new_uuid_to_bech32("user_")?);

    let bakery = service.create_business(&owner1, "Harbour Bakery", 5_000)?;
    let roastery = service.create_business(&owner1, "Hilltop Roastery", 1_200)?;
    let workshop = service.create_business(&owner2, "Riverside Workshop", 800)?;

    let first = service.submit_order(bakery.id(), &buyer1, 1_000, Money::from_cents(50_000))?;
    let second = service.submit_order(roastery.id(), &buyer2, 300, Money::from_cents(12_500))?;
    service.submit_order(workshop.id(), &buyer1, 200, Money::from_cents(9_900))?;

    service
        .transition_order(first.id(), "accepted")
        .context("accepting seeded bakery order")?;
    service
        .transition_order(second.id(), "rejected")
        .context("rejecting seeded roastery order")?;

    for business in service.businesses_with_available_shares()? {
        let purchases = service.purchases_for_business(business.id())?;
        let pending = service.pending_orders_for_business(business.id())?;
        tracing::info!(
            business = business.name(),
            total_shares = business.total_shares(),
            available_shares = business.available_shares(),
            purchases = purchases.len(),
            pending_orders = pending.len(),
            "seeded"
        );
    }

    Ok(())
}
