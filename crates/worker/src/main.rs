//! Courier worker binary — runs the dispatch and reconciliation engines.
//!
//! Many worker instances may run concurrently across a fleet; the per-job
//! Redis lease locks guarantee only one instance executes a given engine
//! cycle at a time. An instance that loses the lock race simply skips that
//! cycle.

use courier_common::config::AppConfig;
use courier_common::db;
use courier_common::redis_pool;
use courier_engine::dispatcher::DispatchEngine;
use courier_engine::reconciler::ReconciliationEngine;
use courier_engine::sender::SenderStrategy;
use courier_gateway::HttpProviderGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_worker=info,courier_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("Courier worker starting...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Connect to Redis (job locks)
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;

    // Provider gateway and sender strategy, fixed for the process lifetime
    let strategy = SenderStrategy::from_config(&config);
    tracing::info!(mode = ?config.sender_mode, "Sender strategy selected");

    let mut dispatcher = DispatchEngine::new(
        pool.clone(),
        redis.clone(),
        HttpProviderGateway::new(&config.provider_base_url, &config.provider_api_key),
        strategy,
        &config,
    );
    let mut reconciler = ReconciliationEngine::new(
        pool,
        redis,
        HttpProviderGateway::new(&config.provider_base_url, &config.provider_api_key),
        &config,
    );

    // Run both engines with graceful shutdown on Ctrl+C
    tokio::select! {
        result = dispatcher.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Dispatch engine exited with error");
                return Err(e);
            }
        }
        result = reconciler.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Reconciliation engine exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("Courier worker stopped.");
    Ok(())
}
