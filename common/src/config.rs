//! Application configuration.
//!
//! Everything is read from the process environment once at startup and then
//! shared read-only. A `.env` file in the working directory may seed values
//! that are not already set.

use std::fmt;
use std::path::Path;

use subtle::ConstantTimeEq;

use crate::errors::{AppError, AppResult};

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 3306;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_FILTER_ROW_LIMIT: u32 = 10;
const DEFAULT_ID_COLUMN: &str = "id_unique";

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name reported by health checks and error envelopes.
    pub service_name: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Target MySQL server.
    pub database: DatabaseConfig,
    /// Shared secret expected in the `api_key` query parameter.
    pub api_key: ApiKey,
    /// Row cap applied to list queries that carry a filter.
    pub filter_row_limit: u32,
    /// Column matched by the single-item lookup.
    pub id_column: String,
}

/// MySQL server coordinates. The database name is chosen per request.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// The configured API key. Never printed.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Constant-time comparison against a caller-supplied key.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl AppConfig {
    /// Loads the configuration for `service_name` from the process environment.
    ///
    /// Call [`load_dotenv`] first so `.env` values are visible here.
    pub fn load_with_service(service_name: &str) -> AppResult<Self> {
        Self::from_lookup(service_name, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// `API_KEY` is mandatory; every other variable falls back to a default.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("API_KEY")
            .ok_or_else(|| AppError::Config("API_KEY must be set".to_string()))?;

        let id_column = get("ID_COLUMN").unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string());
        if id_column.contains('`') {
            return Err(AppError::Config(format!(
                "ID_COLUMN is not a valid column name: {id_column}"
            )));
        }

        Ok(Self {
            service_name: service_name.to_string(),
            host: get("SERVER_HOST").unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string()),
            port: parse_or(&get, "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            database: DatabaseConfig {
                host: get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
                port: parse_or(&get, "DB_PORT", DEFAULT_DB_PORT)?,
                user: get("DB_USER").unwrap_or_else(|| DEFAULT_DB_USER.to_string()),
                password: lookup("DB_PASSWORD").unwrap_or_default(),
            },
            api_key: ApiKey::new(api_key),
            filter_row_limit: parse_or(&get, "FILTER_ROW_LIMIT", DEFAULT_FILTER_ROW_LIMIT)?,
            id_column,
        })
    }

    /// Socket address the server binds to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

/// Reads `.env` from the working directory, if present.
///
/// Variables already set in the environment are left untouched.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

/// Seeds the process environment from the file at `path`.
///
/// Returns `false` when the file cannot be read.
pub fn load_dotenv_from(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        return false;
    };
    for (key, value) in parse_dotenv(&content) {
        if std::env::var(key).is_err() {
            std::env::set_var(key, value);
        }
    }
    true
}

fn parse_dotenv(content: &str) -> Vec<(&str, &str)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply() {
        let config = AppConfig::from_lookup("svc", lookup(&[("API_KEY", "k")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.filter_row_limit, 10);
        assert_eq!(config.id_column, "id_unique");
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let err = AppConfig::from_lookup("svc", lookup(&[("DB_HOST", "db")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = AppConfig::from_lookup("svc", lookup(&[("API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = AppConfig::from_lookup(
            "svc",
            lookup(&[
                ("API_KEY", "k"),
                ("DB_HOST", "db.internal"),
                ("DB_PORT", "3307"),
                ("DB_USER", "reader"),
                ("DB_PASSWORD", "pw"),
                ("FILTER_ROW_LIMIT", "25"),
                ("ID_COLUMN", "uuid"),
            ]),
        )
        .unwrap();
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.user, "reader");
        assert_eq!(config.database.password, "pw");
        assert_eq!(config.filter_row_limit, 25);
        assert_eq!(config.id_column, "uuid");
    }

    #[test]
    fn test_bad_port_is_a_config_error() {
        let err = AppConfig::from_lookup("svc", lookup(&[("API_KEY", "k"), ("DB_PORT", "abc")]))
            .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn test_api_key_matching_and_redaction() {
        let key = ApiKey::new("secret");
        assert!(key.matches("secret"));
        assert!(!key.matches("secre"));
        assert!(!key.matches(""));
        assert_eq!(format!("{key:?}"), "ApiKey(***)");
    }

    #[test]
    fn test_parse_dotenv() {
        let pairs = parse_dotenv("# comment\nAPI_KEY = abc\n\nDB_HOST=\"db\"\nnoequals\n");
        assert_eq!(pairs, vec![("API_KEY", "abc"), ("DB_HOST", "db")]);
    }

    #[test]
    fn test_load_dotenv_from_keeps_existing_variables() {
        let path = std::env::temp_dir().join(format!("gateway-dotenv-{}", std::process::id()));
        std::fs::write(
            &path,
            "GATEWAY_DOTENV_NEW=from-file\nGATEWAY_DOTENV_SET=from-file\n",
        )
        .unwrap();
        std::env::set_var("GATEWAY_DOTENV_SET", "from-env");

        assert!(load_dotenv_from(&path));
        assert_eq!(std::env::var("GATEWAY_DOTENV_NEW").unwrap(), "from-file");
        assert_eq!(std::env::var("GATEWAY_DOTENV_SET").unwrap(), "from-env");

        std::fs::remove_file(&path).unwrap();
        assert!(!load_dotenv_from(&path));
    }
}
