use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::contracts::lifecycle::EXPIRING_WINDOW_DAYS;
use crate::contracts::paginate::DEFAULT_MAX_CHARS_PER_PAGE;
use crate::contracts::upload::MAX_UPLOAD_BYTES;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub contracts: ContractSettings,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let include_targets = environment == AppEnvironment::Development;

        let contracts = ContractSettings {
            max_chars_per_page: positive_var(
                "CONTRACT_MAX_CHARS_PER_PAGE",
                DEFAULT_MAX_CHARS_PER_PAGE,
            )?,
            max_upload_bytes: positive_var("CONTRACT_MAX_UPLOAD_BYTES", MAX_UPLOAD_BYTES)?,
            expiring_window_days: positive_var(
                "CONTRACT_EXPIRING_WINDOW_DAYS",
                EXPIRING_WINDOW_DAYS,
            )?,
            signing_base_url: env::var("CONTRACT_SIGNING_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://{host}:{port}")),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                include_targets,
            },
            contracts,
        })
    }
}

/// Parse a strictly positive number, falling back to `default` when unset.
fn positive_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let value = match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var })?,
        Err(_) => default,
    };
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidNumber { var })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub include_targets: bool,
}

/// Knobs for document generation, uploads, and lifecycle display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSettings {
    pub max_chars_per_page: usize,
    pub max_upload_bytes: usize,
    pub expiring_window_days: i64,
    pub signing_base_url: String,
}

impl Default for ContractSettings {
    fn default() -> Self {
        Self {
            max_chars_per_page: DEFAULT_MAX_CHARS_PER_PAGE,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            expiring_window_days: EXPIRING_WINDOW_DAYS,
            signing_base_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

impl ContractSettings {
    /// Link a tenant follows to review and sign a contract.
    pub fn signing_link(&self, contract_id: &str) -> String {
        format!("{}/sign/{}", self.signing_base_url, contract_id)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for var in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "CONTRACT_MAX_CHARS_PER_PAGE",
            "CONTRACT_MAX_UPLOAD_BYTES",
            "CONTRACT_EXPIRING_WINDOW_DAYS",
            "CONTRACT_SIGNING_BASE_URL",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.contracts.max_chars_per_page, 2200);
        assert_eq!(config.contracts.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.contracts.expiring_window_days, 30);
        assert_eq!(
            config.contracts.signing_link("ctr-000001"),
            "http://127.0.0.1:3000/sign/ctr-000001"
        );
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn contract_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CONTRACT_MAX_CHARS_PER_PAGE", "1800");
        env::set_var("CONTRACT_SIGNING_BASE_URL", "https://sign.example.com/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.contracts.max_chars_per_page, 1800);
        assert_eq!(
            config.contracts.signing_link("ctr-7"),
            "https://sign.example.com/sign/ctr-7"
        );
        reset_env();
    }

    #[test]
    fn rejects_non_positive_contract_numbers() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        for (var, raw) in [
            ("CONTRACT_EXPIRING_WINDOW_DAYS", "-5"),
            ("CONTRACT_EXPIRING_WINDOW_DAYS", "0"),
            ("CONTRACT_MAX_UPLOAD_BYTES", "0"),
            ("CONTRACT_MAX_UPLOAD_BYTES", "-1"),
        ] {
            reset_env();
            env::set_var(var, raw);
            match AppConfig::load() {
                Err(ConfigError::InvalidNumber { var: rejected }) => assert_eq!(rejected, var),
                other => panic!("expected {var}={raw} to be rejected, got {other:?}"),
            }
        }
        reset_env();
    }

    #[test]
    fn rejects_zero_page_size() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("CONTRACT_MAX_CHARS_PER_PAGE", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidNumber { var }) => {
                assert_eq!(var, "CONTRACT_MAX_CHARS_PER_PAGE")
            }
            other => panic!("expected invalid number, got {other:?}"),
        }
        reset_env();
    }
}
