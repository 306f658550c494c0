//! Environment configuration.

use std::path::PathBuf;
use std::str::FromStr;

use lexquest_core::{BookMode, EngineConfig};

/// Settings read at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl AppConfig {
    /// Read `LEXQUEST_*` variables. Call `dotenvy::dotenv()` first to pick up
    /// a `.env` file. Unparseable values fall back to defaults.
    pub fn from_env() -> Self {
        let db_path = std::env::var("LEXQUEST_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_db_path());

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let mut engine = EngineConfig::default();
        if let Ok(name) = std::env::var("LEXQUEST_MODEL") {
            engine.model_name = name.trim().to_lowercase();
        }
        if let Some(target) = env_parse::<i64>("LEXQUEST_DAILY_TARGET") {
            engine.default_daily_target = target.max(0);
        }
        if let Some(hour) = env_parse::<u32>("LEXQUEST_RESET_HOUR") {
            if hour < 24 {
                engine.daily_reset_hour = hour;
            } else {
                tracing::warn!(hour, "LEXQUEST_RESET_HOUR out of range, using default");
            }
        }
        for (mode, suffix) in [
            (BookMode::Read, "READ"),
            (BookMode::Solve, "SOLVE"),
            (BookMode::Memorize, "MEMORIZE"),
        ] {
            if let Some(retention) = env_parse::<f64>(&format!("LEXQUEST_RETENTION_{suffix}")) {
                engine.retention.set(mode, retention);
            }
            if let Some(lex) = env_parse::<u32>(&format!("LEXQUEST_LEX_{suffix}")) {
                engine.lex.set(mode, lex);
            }
        }

        Self {
            db_path,
            log_level,
            engine,
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lexquest")
        .join("lexquest.db")
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parse_rejects_garbage() {
        std::env::set_var("LEXQUEST_TEST_PARSE_OK", " 42 ");
        std::env::set_var("LEXQUEST_TEST_PARSE_BAD", "forty-two");
        assert_eq!(env_parse::<i64>("LEXQUEST_TEST_PARSE_OK"), Some(42));
        assert_eq!(env_parse::<i64>("LEXQUEST_TEST_PARSE_BAD"), None);
        assert_eq!(env_parse::<i64>("LEXQUEST_TEST_PARSE_MISSING"), None);
    }

    #[test]
    fn default_path_ends_with_db_file() {
        assert!(default_db_path().ends_with("lexquest/lexquest.db"));
    }
}
