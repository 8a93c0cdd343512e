use taleforge_core::error::CoreError;
use taleforge_core::unlock_gate::{
    ChapterPricing, DEFAULT_CHAPTER_UNLOCK_COINS, DEFAULT_FREE_CHAPTERS,
};

use crate::auth::jwt::JwtConfig;

/// Default period of the ledger reconciliation job.
const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 3600;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub jwt: JwtConfig,
    /// Flat price of every paid chapter (default: `100`).
    pub chapter_unlock_coins: i64,
    /// Number of leading chapters free for everyone (default: `2`).
    pub free_chapters: i32,
    /// Period of the balance reconciliation job (default: `3600`).
    pub ledger_reconcile_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `HOST`                           | `0.0.0.0`               |
    /// | `PORT`                           | `3000`                  |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                    |
    /// | `CHAPTER_UNLOCK_COINS`           | `100`                   |
    /// | `FREE_CHAPTERS`                  | `2`                     |
    /// | `LEDGER_RECONCILE_INTERVAL_SECS` | `3600`                  |
    ///
    /// See [`JwtConfig::from_env`] for the JWT variables.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let chapter_unlock_coins: i64 = std::env::var("CHAPTER_UNLOCK_COINS")
            .unwrap_or_else(|_| DEFAULT_CHAPTER_UNLOCK_COINS.to_string())
            .parse()
            .expect("CHAPTER_UNLOCK_COINS must be a valid i64");

        let free_chapters: i32 = std::env::var("FREE_CHAPTERS")
            .unwrap_or_else(|_| DEFAULT_FREE_CHAPTERS.to_string())
            .parse()
            .expect("FREE_CHAPTERS must be a valid i32");

        let ledger_reconcile_interval_secs: u64 = std::env::var("LEDGER_RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|_| DEFAULT_RECONCILE_INTERVAL_SECS.to_string())
            .parse()
            .expect("LEDGER_RECONCILE_INTERVAL_SECS must be a valid u64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            jwt,
            chapter_unlock_coins,
            free_chapters,
            ledger_reconcile_interval_secs,
        }
    }

    /// Build the chapter price table from the configured price and free
    /// chapter count.
    pub fn chapter_pricing(&self) -> Result<ChapterPricing, CoreError> {
        ChapterPricing::flat(self.free_chapters, self.chapter_unlock_coins)
    }
}
