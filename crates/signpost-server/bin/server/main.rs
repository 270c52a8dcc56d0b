mod cli;

use crate::cli::Cli;
use anyhow::Context;
use clap::Parser;
use signpost_cache::RedisCacheStore;
use signpost_core::{ConnectionHandle, DurableStoreClient};
use signpost_server::{telemetry, Config, WorkerPool};
use signpost_storage::MySqlConnector;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            for problem in e.problems() {
                error!(path = %cli.config.display(), "{problem}");
            }
            return Err(e).context("refusing to start with an invalid configuration");
        }
    };
    info!(workers = config.worker_count, "loaded configuration\n{config}");

    let handles = open_handles(&config).await?;
    let pool = WorkerPool::bind(&config.listen.bind_addr(), handles, config.http)
        .await
        .with_context(|| format!("failed to listen on {}", config.listen))?;
    info!(listen_addr = %pool.local_addr(), "signpost is serving");

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    pool.shutdown().await?;

    Ok(())
}

/// Opens one durable and one cache connection per worker before serving.
async fn open_handles(
    config: &Config,
) -> anyhow::Result<Vec<ConnectionHandle<MySqlConnector, RedisCacheStore>>> {
    let connector = MySqlConnector::new(config.mysql.connect_options());
    let redis_url = config.cache.redis_url();

    let mut handles = Vec::with_capacity(config.worker_count);
    for worker in 0..config.worker_count {
        let durable = DurableStoreClient::connect(connector.clone())
            .await
            .with_context(|| {
                format!(
                    "worker {worker}: failed to connect to MySQL at {}:{}",
                    config.mysql.host, config.mysql.port
                )
            })?;
        let cache = RedisCacheStore::connect(&redis_url, config.cache.prefix.clone())
            .await
            .with_context(|| format!("worker {worker}: failed to connect to Redis at {redis_url}"))?;

        handles.push(ConnectionHandle::new(durable, cache, config.cache.ttl));
    }

    Ok(handles)
}
