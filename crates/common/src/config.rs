use std::time::Duration;

use serde::Deserialize;

/// Global application configuration loaded from environment variables.
///
/// Scan cadences are explicit named intervals resolved once at startup —
/// there are no cron expressions anywhere in the codebase.
#[derive(Debug, Clone, Deserialize)]
pub struct HeraldConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// JWT secret for API authentication
    pub jwt_secret: String,

    /// JWT token expiry in hours
    pub jwt_expiry_hours: u64,

    /// Telegram bot token for chat-message delivery
    pub telegram_bot_token: Option<String>,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Interval between operational scans (offline machines, overdue tasks)
    pub ops_scan_interval_minutes: u64,

    /// Interval between low-stock scans
    pub low_stock_scan_interval_hours: u64,

    /// Interval between maintenance scans
    pub maintenance_scan_interval_hours: u64,

    /// Interval between full inventory audits
    pub inventory_audit_interval_hours: u64,

    /// A machine is considered offline after this many minutes without a ping
    pub offline_after_minutes: i64,

    /// A machine is due for maintenance this many days after its last service
    pub maintenance_interval_days: i64,
}

impl HeraldConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            jwt_secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?,
            jwt_expiry_hours: std::env::var("JWT_EXPIRY_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_EXPIRY_HOURS must be a valid u64"))?,
            telegram_bot_token: std::env::var("TELEGRAM_BOT_TOKEN").ok(),
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            ops_scan_interval_minutes: parse_env("OPS_SCAN_INTERVAL_MINUTES", "30")?,
            low_stock_scan_interval_hours: parse_env("LOW_STOCK_SCAN_INTERVAL_HOURS", "24")?,
            maintenance_scan_interval_hours: parse_env("MAINTENANCE_SCAN_INTERVAL_HOURS", "168")?,
            inventory_audit_interval_hours: parse_env("INVENTORY_AUDIT_INTERVAL_HOURS", "720")?,
            offline_after_minutes: parse_env("OFFLINE_AFTER_MINUTES", "15")?,
            maintenance_interval_days: parse_env("MAINTENANCE_INTERVAL_DAYS", "30")?,
        })
    }

    pub fn ops_scan_interval(&self) -> Duration {
        Duration::from_secs(self.ops_scan_interval_minutes * 60)
    }

    pub fn low_stock_scan_interval(&self) -> Duration {
        Duration::from_secs(self.low_stock_scan_interval_hours * 3600)
    }

    pub fn maintenance_scan_interval(&self) -> Duration {
        Duration::from_secs(self.maintenance_scan_interval_hours * 3600)
    }

    pub fn inventory_audit_interval(&self) -> Duration {
        Duration::from_secs(self.inventory_audit_interval_hours * 3600)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: &str) -> anyhow::Result<T> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| anyhow::anyhow!("{} must be a valid number", name))
}
