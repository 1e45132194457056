use serde::Deserialize;

/// How the sender strategy addresses outbound notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderMode {
    /// Send to the recipient recorded on the notification.
    Production,
    /// Fan out to the configured per-channel allow-lists instead.
    Test,
}

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string (job locks)
    pub redis_url: String,

    /// Delivery provider API base URL
    pub provider_base_url: String,

    /// Delivery provider API key
    pub provider_api_key: String,

    /// Dispatch cycle interval in seconds (default: 30)
    pub dispatch_interval_secs: u64,

    /// Reconciliation cycle interval in seconds (default: 60).
    /// Also the base interval for the retry backoff schedule.
    pub reconcile_interval_secs: u64,

    /// Maximum notifications fetched per engine cycle (default: 100)
    pub page_size: i64,

    /// Job lock lease in seconds; must exceed worst-case page processing time
    /// (default: 300)
    pub lock_lease_secs: u64,

    /// production or test
    pub sender_mode: SenderMode,

    /// Test-mode email allow-list (comma-separated)
    pub test_email_recipients: Vec<String>,

    /// Test-mode SMS allow-list (comma-separated)
    pub test_sms_recipients: Vec<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let sender_mode = match std::env::var("SENDER_MODE")
            .unwrap_or_else(|_| "production".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => SenderMode::Production,
            "test" => SenderMode::Test,
            other => anyhow::bail!("SENDER_MODE must be 'production' or 'test', got '{other}'"),
        };

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            provider_base_url: std::env::var("PROVIDER_BASE_URL").map_err(|_| {
                anyhow::anyhow!("PROVIDER_BASE_URL environment variable is required")
            })?,
            provider_api_key: std::env::var("PROVIDER_API_KEY").map_err(|_| {
                anyhow::anyhow!("PROVIDER_API_KEY environment variable is required")
            })?,
            dispatch_interval_secs: std::env::var("DISPATCH_INTERVAL_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DISPATCH_INTERVAL_SECS must be a valid u64"))?,
            reconcile_interval_secs: std::env::var("RECONCILE_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RECONCILE_INTERVAL_SECS must be a valid u64"))?,
            page_size: std::env::var("PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PAGE_SIZE must be a valid i64"))?,
            lock_lease_secs: std::env::var("LOCK_LEASE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("LOCK_LEASE_SECS must be a valid u64"))?,
            sender_mode,
            test_email_recipients: parse_recipient_list(
                std::env::var("TEST_EMAIL_RECIPIENTS").ok().as_deref(),
            ),
            test_sms_recipients: parse_recipient_list(
                std::env::var("TEST_SMS_RECIPIENTS").ok().as_deref(),
            ),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}

/// Split a comma-separated recipient list, dropping empty entries.
fn parse_recipient_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipient_list() {
        assert_eq!(
            parse_recipient_list(Some("a@example.org, b@example.org")),
            vec!["a@example.org".to_string(), "b@example.org".to_string()]
        );
    }

    #[test]
    fn test_parse_recipient_list_empty() {
        assert!(parse_recipient_list(None).is_empty());
        assert!(parse_recipient_list(Some("")).is_empty());
        assert!(parse_recipient_list(Some(" , ,")).is_empty());
    }
}
