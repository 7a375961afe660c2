//! # Configuration
//!
//! Environment-backed configuration for the reminder bot. All knobs come from
//! the process environment (a `.env` file is loaded by the binary before this
//! runs), with defaults suitable for a small single-timezone deployment.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: SMTP settings for the email delivery channel
//! - 1.1.0: Configurable dispatch interval and rate limiting
//! - 1.0.0: Initial release with token, database path and timezone

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::env;

/// SMTP settings for the centralized email sender.
///
/// Emails always leave from the bot's own domain; `notify_email` (the
/// operator's address) is set as Reply-To and CC so replies land with a human.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_name: String,
    pub notify_email: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram Bot API token
    pub telegram_token: String,
    /// Path to the SQLite database file
    pub database_path: String,
    /// IANA timezone all dates are interpreted in
    pub timezone: Tz,
    /// Seconds between dispatch ticks
    pub check_interval_secs: u64,
    /// Max messages per chat inside the rate-limit window
    pub rate_limit_max: usize,
    /// Rate-limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Log level filter passed to env_logger
    pub log_level: String,
    /// SMTP settings; None disables the email channel
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// `TELEGRAM_TOKEN` is required; everything else has a default. SMTP is
    /// only enabled when both `SMTP_USER` and `SMTP_PASSWORD` are present.
    pub fn from_env() -> Result<Self> {
        let telegram_token = env::var("TELEGRAM_TOKEN")
            .map_err(|_| anyhow!("TELEGRAM_TOKEN must be set (check your .env)"))?;

        let database_path =
            env::var("DATABASE_PATH").unwrap_or_else(|_| "recordatorio.db".to_string());

        let tz_name =
            env::var("TIMEZONE").unwrap_or_else(|_| "America/Argentina/Buenos_Aires".to_string());
        let timezone: Tz = tz_name
            .parse()
            .map_err(|_| anyhow!("TIMEZONE '{}' is not a valid IANA timezone", tz_name))?;

        let check_interval_secs = env::var("CHECK_INTERVAL_SECS")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("CHECK_INTERVAL_SECS must be a positive integer")?
            .unwrap_or(60)
            .max(1);

        let rate_limit_max = env::var("RATE_LIMIT_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        let rate_limit_window_secs = env::var("RATE_LIMIT_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let smtp = match (env::var("SMTP_USER"), env::var("SMTP_PASSWORD")) {
            (Ok(user), Ok(password)) => Some(SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(465),
                user,
                password,
                from_name: env::var("SMTP_FROM_NAME")
                    .unwrap_or_else(|_| "Recordatorio Bot".to_string()),
                notify_email: env::var("NOTIFY_EMAIL").ok(),
            }),
            _ => None,
        };

        Ok(Config {
            telegram_token,
            database_path,
            timezone,
            check_interval_secs,
            rate_limit_max,
            rate_limit_window_secs,
            log_level,
            smtp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env vars are process-wide; serialize these tests to keep them stable
    // under the parallel test runner.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_missing_token_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::remove_var("TELEGRAM_TOKEN");
        assert!(Config::from_env().is_err());
    }

    #[test]
    fn test_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("TELEGRAM_TOKEN", "123:abc");
        env::remove_var("TIMEZONE");
        env::remove_var("CHECK_INTERVAL_SECS");
        env::remove_var("SMTP_USER");
        env::remove_var("SMTP_PASSWORD");

        let config = Config::from_env().unwrap();
        assert_eq!(config.timezone.name(), "America/Argentina/Buenos_Aires");
        assert_eq!(config.check_interval_secs, 60);
        assert_eq!(config.rate_limit_max, 10);
        assert!(config.smtp.is_none());
        env::remove_var("TELEGRAM_TOKEN");
    }

    #[test]
    fn test_invalid_timezone_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        env::set_var("TELEGRAM_TOKEN", "123:abc");
        env::set_var("TIMEZONE", "Marte/Olympus_Mons");
        assert!(Config::from_env().is_err());
        env::remove_var("TIMEZONE");
        env::remove_var("TELEGRAM_TOKEN");
    }
}
