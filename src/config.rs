use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "GovBrain";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default log filter, overridable via `RUST_LOG`.
pub fn default_log_filter() -> &'static str {
    "govbrain=info,govbrain_lib=info,warn"
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No API key configured: set GOVBRAIN_API_KEY or GEMINI_API_KEY")]
    MissingApiKey,

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Reasoning service connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ReasoningConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl ReasoningConfig {
    /// Read settings from the process environment.
    ///
    /// - `GOVBRAIN_API_KEY` (fallback `GEMINI_API_KEY`) — required
    /// - `GOVBRAIN_MODEL` — default `gemini-2.5-flash`
    /// - `GOVBRAIN_ENDPOINT` — default Google Generative Language API
    /// - `GOVBRAIN_TIMEOUT_SECS` — default 120
    /// - `GOVBRAIN_TEMPERATURE` — default 0.2, within 0.0..=2.0
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_blank("GOVBRAIN_API_KEY")
            .or_else(|| non_blank("GEMINI_API_KEY"))
            .ok_or(ConfigError::MissingApiKey)?;

        let timeout_secs = match non_blank("GOVBRAIN_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "GOVBRAIN_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_TIMEOUT_SECS,
        };

        let temperature = match non_blank("GOVBRAIN_TEMPERATURE") {
            Some(raw) => match raw.trim().parse::<f32>() {
                Ok(t) if (0.0..=MAX_TEMPERATURE).contains(&t) => t,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "GOVBRAIN_TEMPERATURE",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            endpoint: non_blank("GOVBRAIN_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            model: non_blank("GOVBRAIN_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: api_key.trim().to_string(),
            temperature,
            timeout_secs,
        })
    }
}
