//! Environment-driven configuration structures for the API binary.

use std::env;
use std::net::{AddrParseError, IpAddr};
use std::time::Duration;

use thiserror::Error;

const DEFAULT_SETTINGS_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_EMAIL_OTP_TTL_SECS: u64 = 600;

/// API configuration: listeners, database and account bootstrap knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    database_url: String,
    database_max_connections: Option<u32>,
    api_bind_address: String,
    api_unix_socket: Option<String>,
    internal_bind_address: Option<String>,
    internal_unix_socket: Option<String>,
    settings_cache_ttl: Duration,
    email_otp_ttl: Duration,
    trusted_proxies: Vec<IpAddr>,
    bootstrap_admin: Option<AdminBootstrap>,
}

/// Superuser created at startup when it does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub username: String,
    pub password: String,
    pub email: String,
}

impl ApiConfig {
    /// Loads the environment variables required by the API binary.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        hydrate_env_file()?;

        let bootstrap_admin = match (
            get_optional_var("ADMIN_USERNAME"),
            get_optional_var("ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(password)) => Some(AdminBootstrap {
                email: get_optional_var("ADMIN_EMAIL")
                    .unwrap_or_else(|| format!("{username}@localhost")),
                username,
                password,
            }),
            (Some(_), None) => {
                return Err(ConfigError::MissingVar {
                    key: "ADMIN_PASSWORD",
                })
            }
            _ => None,
        };

        Ok(Self {
            database_url: get_required_var("DATABASE_URL")?,
            database_max_connections: get_optional_var("DATABASE_MAX_CONNECTIONS")
                .map(|raw| {
                    raw.parse().map_err(|source| ConfigError::InvalidNumber {
                        key: "DATABASE_MAX_CONNECTIONS",
                        source,
                    })
                })
                .transpose()?,
            api_bind_address: get_required_var("API_BIND_ADDRESS")?,
            api_unix_socket: get_optional_var("API_UNIX_SOCKET"),
            internal_bind_address: get_optional_var("API_INTERNAL_BIND_ADDRESS"),
            internal_unix_socket: get_optional_var("API_INTERNAL_UNIX_SOCKET"),
            settings_cache_ttl: Duration::from_secs(get_optional_secs(
                "SETTINGS_CACHE_TTL_SECS",
                DEFAULT_SETTINGS_CACHE_TTL_SECS,
            )?),
            email_otp_ttl: Duration::from_secs(get_optional_secs(
                "EMAIL_OTP_TTL_SECS",
                DEFAULT_EMAIL_OTP_TTL_SECS,
            )?),
            trusted_proxies: get_ip_list("TRUSTED_PROXIES")?,
            bootstrap_admin,
        })
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Pool size override; the driver default applies when unset.
    pub fn database_max_connections(&self) -> Option<u32> {
        self.database_max_connections
    }

    pub fn api_bind_address(&self) -> &str {
        &self.api_bind_address
    }

    pub fn api_unix_socket(&self) -> Option<&str> {
        self.api_unix_socket.as_deref()
    }

    pub fn internal_bind_address(&self) -> Option<&str> {
        self.internal_bind_address.as_deref()
    }

    pub fn internal_unix_socket(&self) -> Option<&str> {
        self.internal_unix_socket.as_deref()
    }

    pub fn has_internal_listener(&self) -> bool {
        self.internal_bind_address.is_some() || self.internal_unix_socket.is_some()
    }

    pub fn settings_cache_ttl(&self) -> Duration {
        self.settings_cache_ttl
    }

    pub fn email_otp_ttl(&self) -> Duration {
        self.email_otp_ttl
    }

    /// Peers whose forwarding headers are believed when resolving client IPs.
    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }

    pub fn bootstrap_admin(&self) -> Option<&AdminBootstrap> {
        self.bootstrap_admin.as_ref()
    }
}

fn get_required_var(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(ConfigError::MissingVar { key })
            } else {
                Ok(trimmed.to_string())
            }
        }
        Err(_) => Err(ConfigError::MissingVar { key }),
    }
}

fn get_optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn get_optional_secs(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match get_optional_var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|source| ConfigError::InvalidNumber { key, source }),
        None => Ok(default),
    }
}

fn get_ip_list(key: &'static str) -> Result<Vec<IpAddr>, ConfigError> {
    let Some(raw) = get_optional_var(key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|source| ConfigError::InvalidAddress {
                key,
                value: entry.to_string(),
                source,
            })
        })
        .collect()
}

pub fn hydrate_env_file() -> Result<(), ConfigError> {
    if env::var_os("DISKWALA_SKIP_DOTENV").is_some() {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(ConfigError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration or environment parsing fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{key}`")]
    MissingVar { key: &'static str },
    #[error("invalid integer in `{key}`: {source}")]
    InvalidNumber {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("invalid IP address `{value}` in `{key}`: {source}")]
    InvalidAddress {
        key: &'static str,
        value: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_GUARD: Mutex<()> = Mutex::new(());

    fn set_env() {
        std::env::set_var("DISKWALA_SKIP_DOTENV", "1");
        std::env::set_var("DATABASE_URL", "sqlite://test.db");
        std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        std::env::set_var("API_BIND_ADDRESS", "127.0.0.1:8080");
        std::env::remove_var("API_UNIX_SOCKET");
        std::env::remove_var("API_INTERNAL_BIND_ADDRESS");
        std::env::remove_var("API_INTERNAL_UNIX_SOCKET");
        std::env::remove_var("SETTINGS_CACHE_TTL_SECS");
        std::env::remove_var("EMAIL_OTP_TTL_SECS");
        std::env::remove_var("TRUSTED_PROXIES");
        std::env::remove_var("ADMIN_USERNAME");
        std::env::remove_var("ADMIN_PASSWORD");
        std::env::remove_var("ADMIN_EMAIL");
    }

    #[test]
    fn api_config_reads_required_env() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();

        let config = ApiConfig::load_from_env().expect("api config loads");
        assert_eq!(config.database_url(), "sqlite://test.db");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8080");
        assert_eq!(config.settings_cache_ttl(), Duration::from_secs(30));
        assert_eq!(config.email_otp_ttl(), Duration::from_secs(600));
        assert!(config.bootstrap_admin().is_none());
        assert!(!config.has_internal_listener());
        assert!(config.trusted_proxies().is_empty());
    }

    #[test]
    fn trusted_proxies_parse_as_ip_list() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("TRUSTED_PROXIES", " 10.0.0.1, ::1 ,");
        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(
            config.trusted_proxies(),
            &[
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );

        std::env::set_var("TRUSTED_PROXIES", "10.0.0.1,proxy.local");
        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress {
                key: "TRUSTED_PROXIES",
                ref value,
                ..
            } if value == "proxy.local"
        ));

        set_env();
    }

    #[test]
    fn api_config_supports_unix_and_internal_listeners() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("API_UNIX_SOCKET", "/tmp/api.sock");
        std::env::set_var("API_INTERNAL_BIND_ADDRESS", "127.0.0.1:9090");
        std::env::set_var("API_INTERNAL_UNIX_SOCKET", "/tmp/api-internal.sock");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.api_unix_socket(), Some("/tmp/api.sock"));
        assert_eq!(config.internal_bind_address(), Some("127.0.0.1:9090"));
        assert_eq!(
            config.internal_unix_socket(),
            Some("/tmp/api-internal.sock")
        );
        assert!(config.has_internal_listener());

        set_env();
    }

    #[test]
    fn required_env_vars_are_trimmed() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("DATABASE_URL", "  sqlite://trim.db  ");
        std::env::set_var("API_BIND_ADDRESS", " 127.0.0.1:8081 ");

        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.database_url(), "sqlite://trim.db");
        assert_eq!(config.api_bind_address(), "127.0.0.1:8081");

        set_env();
    }

    #[test]
    fn empty_required_env_var_is_treated_as_missing() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("DATABASE_URL", "   ");

        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "DATABASE_URL"
            }
        ));

        set_env();
    }

    #[test]
    fn ttl_overrides_must_be_integers() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("SETTINGS_CACHE_TTL_SECS", "5");
        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.settings_cache_ttl(), Duration::from_secs(5));

        std::env::set_var("DATABASE_MAX_CONNECTIONS", "8");
        let config = ApiConfig::load_from_env().expect("config loads");
        assert_eq!(config.database_max_connections(), Some(8));

        std::env::set_var("EMAIL_OTP_TTL_SECS", "ten");
        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidNumber {
                key: "EMAIL_OTP_TTL_SECS",
                ..
            }
        ));

        set_env();
    }

    #[test]
    fn admin_bootstrap_requires_password() {
        let _guard = ENV_GUARD.lock().unwrap();
        set_env();
        std::env::set_var("ADMIN_USERNAME", "root");
        let err = ApiConfig::load_from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingVar {
                key: "ADMIN_PASSWORD"
            }
        ));

        std::env::set_var("ADMIN_PASSWORD", "hunter22");
        let config = ApiConfig::load_from_env().expect("config loads");
        let admin = config.bootstrap_admin().expect("admin configured");
        assert_eq!(admin.username, "root");
        assert_eq!(admin.email, "root@localhost");

        set_env();
    }
}
