use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::browser::PacingConfig;
use crate::matching::DEFAULT_THRESHOLD;

const DEFAULT_PORT: u16 = 8766;
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub host: String,
    /// Default hybrid-score threshold when a request omits one
    pub match_threshold: u8,
    /// Cards extracted concurrently per batch
    pub extract_workers: usize,
    pub headless: bool,
    /// Text-recognition service; the optical-text method is unavailable without it
    pub ocr_url: Option<String>,
    /// Interval and retry policy for session navigation
    pub pacing: PacingConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            host: lookup("HOST").unwrap_or(defaults.host),
            match_threshold: parsed(&lookup, "MATCH_THRESHOLD")
                .filter(|t: &u8| *t <= 100)
                .unwrap_or(defaults.match_threshold),
            extract_workers: parsed(&lookup, "EXTRACT_WORKERS")
                .filter(|w: &usize| *w > 0)
                .unwrap_or(defaults.extract_workers),
            headless: lookup("HEADLESS")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.headless),
            ocr_url: lookup("OCR_URL").filter(|u| !u.trim().is_empty()),
            pacing: pacing_from(&lookup, defaults.pacing),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: DEFAULT_HOST.to_string(),
            match_threshold: DEFAULT_THRESHOLD,
            extract_workers: DEFAULT_WORKERS,
            headless: true,
            ocr_url: None,
            pacing: PacingConfig::default(),
        }
    }
}

fn pacing_from(lookup: &impl Fn(&str) -> Option<String>, defaults: PacingConfig) -> PacingConfig {
    let min_delay = parsed(lookup, "NAV_MIN_DELAY_MS")
        .map(Duration::from_millis)
        .unwrap_or(defaults.min_delay);
    let max_delay = parsed(lookup, "NAV_MAX_DELAY_MS")
        .map(Duration::from_millis)
        .filter(|max| *max >= min_delay)
        .unwrap_or(defaults.max_delay.max(min_delay));
    PacingConfig {
        min_delay,
        max_delay,
        max_attempts: parsed(lookup, "NAV_MAX_ATTEMPTS")
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.max_attempts),
        ..defaults
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
