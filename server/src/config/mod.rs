use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";
const DEFAULT_SESSION_TTL_HOURS: u64 = 24 * 14;
const DEFAULT_CURRENCY: &str = "ron";
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEV_WEBHOOK_SECRET: &str = "whsec_dev";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    Stripe,
    Mock,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub gateway: GatewayKind,
    pub currency: String,
    pub publishable_key: String,
    pub secret_key: Option<String>,
    pub webhook_secret: String,
    pub api_base: String,
    pub timeout: Duration,
    pub webhook_tolerance: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub bind_addr: SocketAddr,
    pub production: bool,
    pub cors_allowed_origins: String,
    pub session_ttl: Duration,
    pub payment: PaymentSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let production = var("RUST_ENV")
            .map(|v| v.to_lowercase() == "production")
            .unwrap_or(false);

        let gateway = match var("PAYMENT_GATEWAY").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("mock") => GatewayKind::Mock,
            Some("stripe") => GatewayKind::Stripe,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "PAYMENT_GATEWAY",
                    value: other.to_string(),
                })
            }
        };

        let secret_key = var("STRIPE_SECRET_KEY");
        let webhook_secret = match (gateway, var("STRIPE_WEBHOOK_SECRET")) {
            (_, Some(secret)) => secret,
            (GatewayKind::Mock, None) => DEV_WEBHOOK_SECRET.to_string(),
            (GatewayKind::Stripe, None) => return Err(ConfigError::Missing("STRIPE_WEBHOOK_SECRET")),
        };
        if gateway == GatewayKind::Stripe && secret_key.is_none() {
            return Err(ConfigError::Missing("STRIPE_SECRET_KEY"));
        }

        let cors_allowed_origins =
            var("CORS_ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.to_string());
        if production && cors::parse_origins(&cors_allowed_origins).is_empty() {
            return Err(ConfigError::Invalid {
                name: "CORS_ALLOWED_ORIGINS",
                value: cors_allowed_origins,
            });
        }

        Ok(Self {
            database_url: var("DATABASE_URL"),
            max_connections: parse_var(&var, "DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_var(&var, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3001)))?,
            production,
            cors_allowed_origins,
            session_ttl: Duration::from_secs(
                parse_var(&var, "SESSION_TTL_HOURS", DEFAULT_SESSION_TTL_HOURS)? * 3600,
            ),
            payment: PaymentSettings {
                gateway,
                currency: var("PAYMENT_CURRENCY")
                    .map(|c| c.to_lowercase())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                publishable_key: var("STRIPE_PUBLISHABLE_KEY").unwrap_or_default(),
                secret_key,
                webhook_secret,
                api_base: var("STRIPE_API_BASE")
                    .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
                timeout: Duration::from_secs(parse_var(&var, "GATEWAY_TIMEOUT_SECS", 10)?),
                webhook_tolerance: Duration::from_secs(parse_var(
                    &var,
                    "WEBHOOK_TOLERANCE_SECS",
                    300,
                )?),
            },
        })
    }
}

fn parse_var<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
