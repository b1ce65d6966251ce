//! services/studio/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use mihrab_core::render::DEFAULT_FONT_FAMILY;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// Environment variables consulted for the provider credential, in priority order.
pub const CREDENTIAL_VARS: [&str; 3] = ["GEMINI_API_KEY", "API_KEY", "GOOGLE_API_KEY"];

/// Values that build tooling substitutes for an unset variable.
const CREDENTIAL_SENTINELS: [&str; 2] = ["undefined", "null"];

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("No provider credential found in any of {0:?}")]
    Missing(&'static [&'static str]),
}

//=========================================================================================
// ApiKey
//=========================================================================================

/// A provider credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Accepts a key unless it is blank or a placeholder sentinel.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || CREDENTIAL_SENTINELS.contains(&trimmed) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Resolves the provider credential from the first usable variable.
pub fn resolve_credential<F>(lookup: F) -> Result<ApiKey, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    CREDENTIAL_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .find_map(|value| ApiKey::parse(&value))
        .ok_or(CredentialError::Missing(&CREDENTIAL_VARS))
}

//=========================================================================================
// Config
//=========================================================================================

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,
    /// `None` until a key is supplied at runtime through the settings endpoint.
    pub api_key: Option<ApiKey>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub export_dir: PathBuf,
    pub fonts_dir: Option<PathBuf>,
    pub font_family: String,
    pub brand_prefix: String,
    pub capture_grace: Duration,
    pub export_settle: Duration,
    pub loading_rotation: Duration,
    /// Sessions unused for longer than this are dropped.
    pub session_idle_ttl: Duration,
    /// How often idle sessions are looked for.
    pub session_sweep: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server Settings ---
        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin = var_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Content Provider ---
        let api_key = resolve_credential(&lookup).ok();
        let gemini_model = var_or("GEMINI_MODEL", "gemini-3-flash-preview");
        let gemini_api_base = var_or(
            "GEMINI_API_BASE",
            "https://generativelanguage.googleapis.com",
        )
        .trim_end_matches('/')
        .to_string();

        // --- Rendering & Export ---
        let export_dir = PathBuf::from(var_or("EXPORT_DIR", "./exports"));
        let fonts_dir = lookup("FONTS_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let font_family = var_or("FONT_FAMILY", DEFAULT_FONT_FAMILY);
        let brand_prefix = var_or("BRAND_PREFIX", "AlMihrab");

        let capture_grace = millis(&lookup, "CAPTURE_GRACE_MS", 500)?;
        let export_settle = millis(&lookup, "EXPORT_SETTLE_MS", 1000)?;
        let loading_rotation = millis(&lookup, "LOADING_ROTATION_MS", 2000)?;
        if loading_rotation.is_zero() {
            return Err(ConfigError::InvalidValue(
                "LOADING_ROTATION_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        // --- Sessions ---
        let session_idle_ttl = secs(&lookup, "SESSION_IDLE_TTL_SECS", 3600)?;
        let session_sweep = secs(&lookup, "SESSION_SWEEP_SECS", 60)?;
        if session_sweep.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SESSION_SWEEP_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            api_key,
            gemini_model,
            gemini_api_base,
            export_dir,
            fonts_dir,
            font_family,
            brand_prefix,
            capture_grace,
            export_settle,
            loading_rotation,
            session_idle_ttl,
            session_sweep,
        })
    }
}

fn millis<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn secs<F>(lookup: &F, key: &str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(Duration::from_secs(default)),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn credential_follows_priority_order() {
        let key = resolve_credential(env(&[("API_KEY", "second"), ("GOOGLE_API_KEY", "third")]))
            .unwrap();
        assert_eq!(key.expose(), "second");

        let key = resolve_credential(env(&[("GEMINI_API_KEY", "first"), ("API_KEY", "second")]))
            .unwrap();
        assert_eq!(key.expose(), "first");
    }

    #[test]
    fn empty_and_sentinel_values_are_skipped() {
        let key = resolve_credential(env(&[
            ("GEMINI_API_KEY", "undefined"),
            ("API_KEY", "  "),
            ("GOOGLE_API_KEY", "real"),
        ]))
        .unwrap();
        assert_eq!(key.expose(), "real");

        let missing = resolve_credential(env(&[("API_KEY", "null")]));
        assert!(matches!(missing, Err(CredentialError::Missing(_))));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::parse("secret-value").unwrap();
        assert!(!format!("{key:?}").contains("secret"));
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = Config::from_lookup(env(&[])).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.api_key.is_none());
        assert_eq!(config.brand_prefix, "AlMihrab");
        assert_eq!(config.capture_grace, Duration::from_millis(500));
        assert_eq!(config.export_settle, Duration::from_millis(1000));
        assert_eq!(config.loading_rotation, Duration::from_millis(2000));
        assert_eq!(config.export_dir, PathBuf::from("./exports"));
        assert!(config.fonts_dir.is_none());
        assert_eq!(config.font_family, "Tajawal");
        assert_eq!(config.session_idle_ttl, Duration::from_secs(3600));
        assert_eq!(config.session_sweep, Duration::from_secs(60));
    }

    #[test]
    fn session_lifetime_is_configurable() {
        let config = Config::from_lookup(env(&[
            ("SESSION_IDLE_TTL_SECS", "120"),
            ("SESSION_SWEEP_SECS", "5"),
            ("FONT_FAMILY", "Amiri"),
        ]))
        .unwrap();
        assert_eq!(config.session_idle_ttl, Duration::from_secs(120));
        assert_eq!(config.session_sweep, Duration::from_secs(5));
        assert_eq!(config.font_family, "Amiri");

        let err = Config::from_lookup(env(&[("SESSION_SWEEP_SECS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "SESSION_SWEEP_SECS"));
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = Config::from_lookup(env(&[("CAPTURE_GRACE_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "CAPTURE_GRACE_MS"));

        let err = Config::from_lookup(env(&[("BIND_ADDRESS", "nowhere")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref k, _) if k == "BIND_ADDRESS"));
    }
}
