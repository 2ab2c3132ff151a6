use std::env;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expires_in_hours: i64,
    pub jwt_refresh_expires_in_days: i64,
    pub default_shipping_fee: i64,
    pub midtrans: MidtransConfig,
}

#[derive(Debug, Clone, Default)]
pub struct MidtransConfig {
    pub server_key: String,
    pub client_key: String,
    pub is_production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("APP_PORT", 3000);
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let jwt_refresh_secret =
            env::var("JWT_REFRESH_SECRET").context("JWT_REFRESH_SECRET is not set")?;

        let midtrans = MidtransConfig {
            server_key: env::var("MIDTRANS_SERVER_KEY").unwrap_or_default(),
            client_key: env::var("MIDTRANS_CLIENT_KEY").unwrap_or_default(),
            is_production: parse_or("MIDTRANS_IS_PRODUCTION", false),
        };

        Ok(Self {
            port,
            database_url,
            host,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            jwt_secret,
            jwt_refresh_secret,
            jwt_expires_in_hours: parse_or("JWT_EXPIRES_IN_HOURS", 24),
            jwt_refresh_expires_in_days: parse_or("JWT_REFRESH_EXPIRES_IN_DAYS", 7),
            default_shipping_fee: parse_or("SHIPPING_FEE", 10),
            midtrans,
        })
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
