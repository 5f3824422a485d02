//! Application configuration loaded from environment variables, optionally
//! through a `.env` file.

use crate::absence::{AbsencePolicy, DEFAULT_THRESHOLD_DAYS, DEFAULT_WINDOW_DAYS};
use crate::dates::{DateNormalizer, DayMonthOrder};
use crate::gym::GymSettings;
use crate::membership::DEFAULT_EXPIRING_SOON_DAYS;
use crate::messaging::{DEFAULT_COUNTRY_CODE, DEFAULT_GYM_NAME, Messenger};
use crate::storage::resolve_data_path;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_path: PathBuf,
    pub gym: GymSettings,
}

impl AppConfig {
    /// Missing or unparseable values fall back to their defaults.
    pub fn from_env() -> Result<Self, std::io::Error> {
        dotenvy::dotenv().ok();

        let absence = AbsencePolicy {
            threshold_days: parse_env("ABSENCE_THRESHOLD_DAYS", DEFAULT_THRESHOLD_DAYS),
            window_days: parse_env("ABSENCE_WINDOW_DAYS", DEFAULT_WINDOW_DAYS),
        };
        let order = std::env::var("DATE_ORDER")
            .ok()
            .and_then(|raw| DayMonthOrder::parse(&raw))
            .unwrap_or_default();
        let messenger = Messenger::new(
            env_or("WHATSAPP_COUNTRY_CODE", DEFAULT_COUNTRY_CODE),
            env_or("GYM_NAME", DEFAULT_GYM_NAME),
        );

        Ok(Self {
            port: parse_env("PORT", DEFAULT_PORT),
            data_path: resolve_data_path()?,
            gym: GymSettings {
                absence,
                expiring_soon_days: parse_env("EXPIRING_SOON_DAYS", DEFAULT_EXPIRING_SOON_DAYS),
                normalizer: DateNormalizer::new(order),
                messenger,
            },
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}
