use std::env;

use crate::engine::pay::PayRates;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub pay_rates: PayRates,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let defaults = PayRates::default();
        let pay_rates = PayRates {
            probation: parse_or_default("PAY_RATE_PROBATION_CENTS", defaults.probation)?,
            standard: parse_or_default("PAY_RATE_STANDARD_CENTS", defaults.standard)?,
            elite: parse_or_default("PAY_RATE_ELITE_CENTS", defaults.elite)?,
            concierge: parse_or_default("PAY_RATE_CONCIERGE_CENTS", defaults.concierge)?,
        };
        validate_rates(&pay_rates)?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_log_format(env::var("LOG_FORMAT").ok().as_deref())?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            pay_rates,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

fn parse_log_format(raw: Option<&str>) -> Result<LogFormat, AppError> {
    match raw.map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        None | Some("") | Some("compact") => Ok(LogFormat::Compact),
        Some("json") => Ok(LogFormat::Json),
        Some(other) => Err(AppError::Internal(format!("invalid LOG_FORMAT: {other}"))),
    }
}

fn validate_rates(rates: &PayRates) -> Result<(), AppError> {
    let all = [
        ("PAY_RATE_PROBATION_CENTS", rates.probation),
        ("PAY_RATE_STANDARD_CENTS", rates.standard),
        ("PAY_RATE_ELITE_CENTS", rates.elite),
        ("PAY_RATE_CONCIERGE_CENTS", rates.concierge),
    ];
    match all.iter().find(|(_, rate)| *rate < 0) {
        Some((key, rate)) => Err(AppError::Internal(format!(
            "invalid {key}: rate must be non-negative, got {rate}"
        ))),
        None => Ok(()),
    }
}
