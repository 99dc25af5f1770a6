//! Process settings from the environment (after `.env` is loaded by the binary).

use crate::error::ConfigError;
use crate::service::{PageBounds, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use std::collections::HashMap;
use std::str::FromStr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/crud_admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@example.com";
pub const DEFAULT_ADMIN_PASSWORD: &str = "Admin@123456";
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 8 * 60 * 60;
/// Used only with the in-memory store, where nothing outlives the process.
const DEV_JWT_SECRET: &str = "crud-admin-dev-secret";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_lifetime_secs: i64,
    pub page_bounds: PageBounds,
    /// None when `SEED_ADMIN=false`.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub entity_config_path: Option<String>,
    pub store: StoreKind,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Same as `from_env` over an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        let store = match get("STORE").map(str::to_lowercase).as_deref() {
            None | Some("postgres") => StoreKind::Postgres,
            Some("memory") => StoreKind::Memory,
            Some(other) => {
                return Err(ConfigError::Setting {
                    name: "STORE",
                    message: format!("expected postgres or memory, got {}", other),
                })
            }
        };
        let jwt_secret = match (get("JWT_SECRET"), store) {
            (Some(s), _) => s.to_string(),
            (None, StoreKind::Memory) => DEV_JWT_SECRET.to_string(),
            (None, StoreKind::Postgres) => {
                return Err(ConfigError::Setting {
                    name: "JWT_SECRET",
                    message: "required when STORE=postgres".into(),
                })
            }
        };
        let default_page_size: u32 = parse(vars, "DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE)?;
        let max_page_size: u32 = parse(vars, "MAX_PAGE_SIZE", MAX_PAGE_SIZE)?;
        if max_page_size == 0 || default_page_size == 0 || default_page_size > max_page_size {
            return Err(ConfigError::Setting {
                name: "DEFAULT_PAGE_SIZE",
                message: format!("must be between 1 and MAX_PAGE_SIZE ({})", max_page_size),
            });
        }
        let token_lifetime_secs: i64 = parse(vars, "TOKEN_LIFETIME_SECS", DEFAULT_TOKEN_LIFETIME_SECS)?;
        if token_lifetime_secs <= 0 {
            return Err(ConfigError::Setting {
                name: "TOKEN_LIFETIME_SECS",
                message: "must be positive".into(),
            });
        }

        let seed_admin: bool = parse(vars, "SEED_ADMIN", true)?;

        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or(DEFAULT_DATABASE_URL).to_string(),
            bind_addr: get("BIND_ADDR").unwrap_or(DEFAULT_BIND_ADDR).to_string(),
            db_max_connections: parse(vars, "DB_MAX_CONNECTIONS", 5)?,
            jwt_secret,
            jwt_issuer: get("JWT_ISSUER").unwrap_or("crud-admin").to_string(),
            token_lifetime_secs,
            page_bounds: PageBounds {
                default_page_size,
                max_page_size,
            },
            admin_email: seed_admin.then(|| get("ADMIN_EMAIL").unwrap_or(DEFAULT_ADMIN_EMAIL).to_string()),
            admin_password: seed_admin.then(|| get("ADMIN_PASSWORD").unwrap_or(DEFAULT_ADMIN_PASSWORD).to_string()),
            entity_config_path: get("ENTITY_CONFIG_PATH").map(str::to_string),
            store,
        })
    }
}

fn parse<T: FromStr>(vars: &HashMap<String, String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Setting {
            name,
            message: format!("{}: {}", raw, e),
        }),
    }
}
