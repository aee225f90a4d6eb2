use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::validation::Thresholds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub export_dir: PathBuf,
    pub dashboard_cache_ttl_secs: u64,
    pub thresholds: Thresholds,
    pub log_format: LogFormat,
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T, String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| format!("{} must be a valid number, got '{}'", name, raw))
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL must be set".to_string())?;

        let host = env::var("HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8095".to_string())
            .parse()
            .map_err(|_| "PORT must be a valid u16".to_string())?;

        let export_dir = PathBuf::from(
            env::var("EXPORT_DIR").unwrap_or_else(|_| "./exports".to_string()),
        );

        let dashboard_cache_ttl_secs = parse_var("DASHBOARD_CACHE_TTL_SECS", "300")?;

        let thresholds = Thresholds {
            balance_tolerance: parse_var("BALANCE_TOLERANCE", "0")?,
            swing_warning_pct: parse_var("SWING_WARNING_PCT", "50")?,
            budget_growth_warning_pct: parse_var("BUDGET_GROWTH_WARNING_PCT", "30")?,
            consistency_tolerance: parse_var("CONSISTENCY_TOLERANCE", "1")?,
        };
        if thresholds.balance_tolerance < 0 || thresholds.consistency_tolerance < 0 {
            return Err("Tolerances cannot be negative".to_string());
        }

        let log_format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".to_string())
            .to_lowercase()
            .as_str()
        {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            other => return Err(format!("LOG_FORMAT must be 'text' or 'json', got '{}'", other)),
        };

        Ok(Config {
            database_url,
            host,
            port,
            export_dir,
            dashboard_cache_ttl_secs,
            thresholds,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "DATABASE_URL",
        "PORT",
        "EXPORT_DIR",
        "DASHBOARD_CACHE_TTL_SECS",
        "BALANCE_TOLERANCE",
        "SWING_WARNING_PCT",
        "BUDGET_GROWTH_WARNING_PCT",
        "CONSISTENCY_TOLERANCE",
        "LOG_FORMAT",
    ];

    fn reset() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        reset();
        env::set_var("DATABASE_URL", "postgres://localhost/koperasi");
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 8095);
        assert_eq!(config.export_dir, PathBuf::from("./exports"));
        assert_eq!(config.dashboard_cache_ttl_secs, 300);
        assert_eq!(config.thresholds.swing_warning_pct, 50.0);
        assert_eq!(config.thresholds.consistency_tolerance, 1);
        assert_eq!(config.log_format, LogFormat::Text);
        reset();
    }

    #[test]
    #[serial]
    fn test_missing_database_url() {
        reset();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_number_is_rejected() {
        reset();
        env::set_var("DATABASE_URL", "postgres://localhost/koperasi");
        env::set_var("SWING_WARNING_PCT", "lots");
        let err = Config::from_env().unwrap_err();
        assert!(err.contains("SWING_WARNING_PCT"));
        reset();
    }

    #[test]
    #[serial]
    fn test_json_logs() {
        reset();
        env::set_var("DATABASE_URL", "postgres://localhost/koperasi");
        env::set_var("LOG_FORMAT", "JSON");
        assert_eq!(Config::from_env().unwrap().log_format, LogFormat::Json);
        reset();
    }
}
