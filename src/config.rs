use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::warn;
use url::Url;

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyProfile {
    /// Leave `safetySettings` out of the request and use the API defaults.
    Default,
    Standard,
    Permissive,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub gemini_api_key: String,
    pub gemini_api_base: Url,
    pub gemini_model: String,
    pub gemini_temperature: Option<f32>,
    pub gemini_top_k: Option<i32>,
    pub gemini_top_p: Option<f32>,
    pub gemini_max_output_tokens: Option<i32>,
    pub gemini_safety_settings: SafetyProfile,
    pub gemini_timeout: Duration,
}

type Vars = HashMap<String, String>;

fn env_string(vars: &Vars, name: &str, default: &str) -> String {
    vars.get(name)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn env_parsed<T: std::str::FromStr>(vars: &Vars, name: &str) -> Option<T> {
    let raw = vars.get(name)?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring invalid value '{}' for {}", raw, name);
            None
        }
    }
}

fn env_u64(vars: &Vars, name: &str, default: u64) -> u64 {
    env_parsed(vars, name).unwrap_or(default)
}

fn env_usize(vars: &Vars, name: &str, default: usize) -> usize {
    env_parsed(vars, name).unwrap_or(default)
}

fn normalize_safety_settings(value: &str) -> SafetyProfile {
    let lowered = value.trim().to_lowercase();
    match lowered.as_str() {
        "" | "default" => SafetyProfile::Default,
        "standard" => SafetyProfile::Standard,
        "permissive" | "off" | "none" => SafetyProfile::Permissive,
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}'; using the API defaults.",
                value
            );
            SafetyProfile::Default
        }
    }
}

fn normalize_api_base(value: &str) -> Result<Url> {
    // Url::join drops the last path segment unless it ends with a slash.
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    let url = Url::parse(&with_slash).with_context(|| format!("Invalid GEMINI_API_BASE: {value}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("GEMINI_API_BASE must be an http(s) URL, got {value}"));
    }
    Ok(url)
}

impl Config {
    pub fn load() -> Result<Self> {
        let vars: Vars = env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &Vars) -> Result<Self> {
        let gemini_api_key = env_string(vars, "GEMINI_API_KEY", "");
        if gemini_api_key.is_empty() {
            return Err(anyhow!("GEMINI_API_KEY environment variable is not set"));
        }

        let gemini_api_base =
            normalize_api_base(&env_string(vars, "GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE))?;

        Ok(Config {
            host: env_string(vars, "HOST", "0.0.0.0"),
            port: env_parsed(vars, "PORT").unwrap_or(8000),
            log_level: env_string(vars, "LOG_LEVEL", "info").to_lowercase(),
            log_dir: PathBuf::from(env_string(vars, "LOG_DIR", "logs")),
            max_upload_bytes: env_usize(vars, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
            gemini_api_key,
            gemini_api_base,
            gemini_model: env_string(vars, "GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            gemini_temperature: env_parsed(vars, "GEMINI_TEMPERATURE"),
            gemini_top_k: env_parsed(vars, "GEMINI_TOP_K"),
            gemini_top_p: env_parsed(vars, "GEMINI_TOP_P"),
            gemini_max_output_tokens: env_parsed(vars, "GEMINI_MAX_OUTPUT_TOKENS"),
            gemini_safety_settings: normalize_safety_settings(&env_string(
                vars,
                "GEMINI_SAFETY_SETTINGS",
                "default",
            )),
            gemini_timeout: Duration::from_secs(env_u64(vars, "GEMINI_TIMEOUT_SECONDS", 120).max(1)),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
