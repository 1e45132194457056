use redis::Client;
use redis::aio::ConnectionManager;

/// Create the Redis connection manager used for job lease locks.
///
/// The manager reconnects transparently, so a Redis blip costs at most a few
/// skipped engine cycles.
pub async fn create_redis_pool(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let manager = ConnectionManager::new(client).await?;

    tracing::info!("Connected to Redis");
    Ok(manager)
}
