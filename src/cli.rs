//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::DEFAULT_ACCESS_TOKEN_MINUTES;
use crate::store::UserRole;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};

const MIN_JWT_SECRET_LENGTH: usize = 32;

/// First delay between database connection attempts; doubles on each retry.
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest wait between two database connection attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mesa-auth",
    about = "Token service: registration, login and refresh token rotation"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8004")]
    pub port: u16,

    /// Path to SQLite database file (":memory:" for a throwaway database)
    #[arg(short, long, env = "DATABASE_PATH", default_value = "auth.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in minutes
    #[arg(long, default_value_t = DEFAULT_ACCESS_TOKEN_MINUTES,
        value_parser = clap::value_parser!(i64).range(1..))]
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days
    #[arg(long, default_value_t = crate::service::DEFAULT_REFRESH_TOKEN_DAYS,
        value_parser = clap::value_parser!(i64).range(1..))]
    pub refresh_token_days: i64,

    /// Upper bound in seconds for a single database call
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u64).range(1..))]
    pub store_timeout_secs: u64,

    /// bcrypt work factor
    #[arg(long, default_value_t = crate::password::DEFAULT_BCRYPT_COST,
        value_parser = clap::value_parser!(u32).range(4..=31))]
    pub bcrypt_cost: u32,

    /// How many times to try opening the database before giving up
    #[arg(long, default_value = "5", value_parser = clap::value_parser!(u32).range(1..))]
    pub db_connect_attempts: u32,

    /// Give an existing user the admin role, then exit
    #[arg(long, value_name = "EMAIL")]
    pub grant_admin: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
///
/// Must be called while the process is still single-threaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET") {
        // Clear the environment variable to prevent leaking
        // SAFETY: main calls this before building the tokio runtime, so no
        // other thread exists that could read or write the environment.
        unsafe { std::env::remove_var("JWT_SECRET") };
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ... capped at 30s.
pub fn retry_delay(attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    INITIAL_RETRY_DELAY
        .saturating_mul(factor)
        .min(MAX_RETRY_DELAY)
}

/// Open the database, retrying with exponential backoff.
/// Logs errors and returns None once every attempt has failed.
pub async fn open_database(path: &str, attempts: u32) -> Option<Database> {
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        match Database::open(path).await {
            Ok(db) => {
                info!(path = %path, "Database opened");
                return Some(db);
            }
            Err(e) if attempt < attempts => {
                let delay = retry_delay(attempt);
                warn!(
                    path = %path,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to open database, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(path = %path, attempts, error = %e, "Failed to open database");
            }
        }
    }

    None
}

/// Handle the --grant-admin flag. Returns whether the role was granted.
pub async fn handle_grant_admin(db: &Database, email: &str) -> bool {
    match db.users().set_role(email, UserRole::Admin).await {
        Ok(true) => {
            info!(email = %email, "Granted admin role");
            true
        }
        Ok(false) => {
            error!(email = %email, "No user with that email");
            false
        }
        Err(e) => {
            error!(email = %email, error = %e, "Failed to grant admin role");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_ttl: chrono::Duration::minutes(args.access_token_minutes),
        refresh_ttl: chrono::Duration::days(args.refresh_token_days),
        store_timeout: Duration::from_secs(args.store_timeout_secs),
        bcrypt_cost: args.bcrypt_cost,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(1), Duration::from_secs(1));
        assert_eq!(retry_delay(2), Duration::from_secs(2));
        assert_eq!(retry_delay(3), Duration::from_secs(4));
        assert_eq!(retry_delay(6), Duration::from_secs(30));
        assert_eq!(retry_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["mesa-auth"]).unwrap();
        assert_eq!(args.access_token_minutes, 60);
        assert_eq!(args.refresh_token_days, 7);
        assert_eq!(args.store_timeout_secs, 5);
        assert_eq!(args.bcrypt_cost, 12);
        assert_eq!(args.db_connect_attempts, 5);
        assert!(args.grant_admin.is_none());
    }

    #[test]
    fn test_args_reject_out_of_range() {
        assert!(Args::try_parse_from(["mesa-auth", "--bcrypt-cost", "2"]).is_err());
        assert!(Args::try_parse_from(["mesa-auth", "--access-token-minutes", "0"]).is_err());
    }

    #[tokio::test]
    async fn test_build_config_carries_lifetimes() {
        let args = Args::try_parse_from([
            "mesa-auth",
            "--access-token-minutes",
            "15",
            "--refresh-token-days",
            "30",
        ])
        .unwrap();
        let db = Database::open(":memory:").await.unwrap();

        let config = build_config(&args, db, "x".repeat(32));
        assert_eq!(config.access_ttl, chrono::Duration::minutes(15));
        assert_eq!(config.refresh_ttl, chrono::Duration::days(30));
        assert_eq!(config.store_timeout, Duration::from_secs(5));
    }

    fn secret_file(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("mesa-auth-secret-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_jwt_secret_from_file() {
        let path = secret_file(&format!("  {}\n", "s".repeat(40)));
        let secret = load_jwt_secret(path.to_str());
        std::fs::remove_file(&path).ok();
        assert_eq!(secret, Some("s".repeat(40)));
    }

    #[test]
    fn test_load_jwt_secret_rejects_short_secret() {
        let path = secret_file("too-short");
        let secret = load_jwt_secret(path.to_str());
        std::fs::remove_file(&path).ok();
        assert_eq!(secret, None);
    }

    #[test]
    fn test_load_jwt_secret_missing_file() {
        assert_eq!(load_jwt_secret(Some("/nonexistent/mesa-auth/secret")), None);
    }

    #[tokio::test]
    async fn test_grant_admin_unknown_user() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(!handle_grant_admin(&db, "nobody@x.com").await);
    }
}
