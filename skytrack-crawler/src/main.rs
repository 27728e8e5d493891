//! skytrack-crawler - Aircraft Metadata Crawler
//!
//! Periodically drains the processing queue filled by the feed service,
//! querying external lookup services with circuit-breaker protection and
//! merging partial answers into the aircraft metadata store.

use anyhow::Result;
use skytrack_common::config::Config;
use skytrack_common::db;
use skytrack_crawler::crawler::AirplaneCrawler;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting skytrack-crawler (Aircraft Metadata Crawler)");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let pool = db::init_database_pool(&config.database_path).await?;
    info!("Database: {}", config.database_path.display());

    let mut crawler = AirplaneCrawler::new(&config, pool);
    info!(
        "Crawling every {}s, batch size {}",
        config.crawl_interval_secs, config.crawler_batch_size
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.crawl_interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                crawler.crawl_cycle().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down skytrack-crawler");
                break;
            }
        }
    }

    Ok(())
}
