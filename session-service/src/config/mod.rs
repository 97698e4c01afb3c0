mod secrets;

use secrecy::{ExposeSecret, Secret};
use service_core::config as core_config;
use service_core::error::AppError;
use service_core::observability::LogFormat;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use secrets::{read_secret_file, DEFAULT_SECRETS_DIR, JWT_SECRET_NAME};

/// Minimum signing secret length accepted in production (HS256 key size).
pub const MIN_PROD_SECRET_BYTES: usize = 32;

/// Upper bound for either token lifetime (ten years).
pub const MAX_TOKEN_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 3600;

/// Upper bound for the auto-logout window; Redis `EX` takes a signed 64-bit value.
pub const MAX_AUTO_LOGOUT_SECONDS: u64 = i64::MAX as u64;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub otlp_endpoint: Option<String>,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub issuer: String,
    pub access_token_expiry_seconds: i64,
    pub refresh_token_expiry_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sliding time-to-live of a session record.
    pub auto_logout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, |key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(common: core_config::Config, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup: &lookup };

        let environment: Environment = lookup("ENVIRONMENT")
            .unwrap_or_else(|| "dev".to_string())
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;
        let is_prod = environment == Environment::Prod;

        let secrets_dir = PathBuf::from(vars.get("SECRETS_DIR", Some(DEFAULT_SECRETS_DIR), false)?);

        let config = ServiceConfig {
            common,
            environment: environment.clone(),
            service_name: vars.get("SERVICE_NAME", Some("session-service"), is_prod)?,
            service_version: vars.get(
                "SERVICE_VERSION",
                Some(env!("CARGO_PKG_VERSION")),
                is_prod,
            )?,
            log_level: vars.get("LOG_LEVEL", Some("info"), is_prod)?,
            log_format: vars.parse("LOG_FORMAT", Some("json"), is_prod)?,
            otlp_endpoint: lookup("OTLP_ENDPOINT").filter(|s| !s.is_empty()),
            redis: RedisConfig {
                url: vars.get("REDIS_URL", Some("redis://localhost:6379"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: load_signing_secret(&lookup, &secrets_dir)?,
                issuer: vars.get("JWT_ISSUER", Some("session-service"), is_prod)?,
                access_token_expiry_seconds: vars.parse(
                    "JWT_ACCESS_TOKEN_EXPIRY_SECONDS",
                    Some("900"),
                    is_prod,
                )?,
                refresh_token_expiry_seconds: vars.parse(
                    "JWT_REFRESH_TOKEN_EXPIRY_SECONDS",
                    Some("2592000"),
                    is_prod,
                )?,
            },
            session: SessionConfig {
                auto_logout_seconds: vars.parse(
                    "SESSION_AUTO_LOGOUT_SECONDS",
                    Some("86400"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: vars
                    .get("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        for (key, seconds) in [
            (
                "JWT_ACCESS_TOKEN_EXPIRY_SECONDS",
                self.jwt.access_token_expiry_seconds,
            ),
            (
                "JWT_REFRESH_TOKEN_EXPIRY_SECONDS",
                self.jwt.refresh_token_expiry_seconds,
            ),
        ] {
            if !(1..=MAX_TOKEN_LIFETIME_SECONDS).contains(&seconds) {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} must be between 1 and {}",
                    key,
                    MAX_TOKEN_LIFETIME_SECONDS
                )));
            }
        }

        if !(1..=MAX_AUTO_LOGOUT_SECONDS).contains(&self.session.auto_logout_seconds) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_AUTO_LOGOUT_SECONDS must be between 1 and {}",
                MAX_AUTO_LOGOUT_SECONDS
            )));
        }

        if self.jwt.issuer.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ISSUER must not be empty"
            )));
        }

        let secret_len = self.jwt.secret.expose_secret().len();
        if secret_len == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT signing secret must not be empty"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if secret_len < MIN_PROD_SECRET_BYTES {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "JWT signing secret must be at least {} bytes in production",
                    MIN_PROD_SECRET_BYTES
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

/// `JWT_SECRET` wins; otherwise the `jwt_key` file from the secrets directory.
fn load_signing_secret<F>(lookup: &F, secrets_dir: &Path) -> Result<Secret<String>, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(secret) = lookup("JWT_SECRET").filter(|s| !s.is_empty()) {
        return Ok(Secret::new(secret));
    }

    match read_secret_file(secrets_dir, JWT_SECRET_NAME)? {
        Some(secret) => Ok(secret),
        None => Err(AppError::ConfigError(anyhow::anyhow!(
            "JWT_SECRET is not set and no {} secret found in {}",
            JWT_SECRET_NAME,
            secrets_dir.display()
        ))),
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
        match (self.lookup)(key) {
            Some(val) => Ok(val),
            None => {
                if is_prod {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required in production but not set",
                        key
                    )))
                } else if let Some(def) = default {
                    Ok(def.to_string())
                } else {
                    Err(AppError::ConfigError(anyhow::anyhow!(
                        "{} is required but not set",
                        key
                    )))
                }
            }
        }
    }

    fn parse<T>(&self, key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key, default, is_prod)?.parse().map_err(|e: T::Err| {
            AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
        })
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
