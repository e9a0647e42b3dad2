// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Every section is optional; defaults match the stock send and check scripts
use crate::pacing::Pacing;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub files: FilesConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// JSON array of numbers to message
    #[serde(default = "default_recipients_path")]
    pub recipients: String,
    /// Plain-text message body
    #[serde(default = "default_message_path")]
    pub message: String,
    /// Input for the `check` sweep
    #[serde(default = "default_check_input_path")]
    pub check_input: String,
    /// Where the `check` sweep writes reachable numbers
    #[serde(default = "default_check_output_path")]
    pub check_output: String,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            recipients: default_recipients_path(),
            message: default_message_path(),
            check_input: default_check_input_path(),
            check_output: default_check_output_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            warmup_ms: default_warmup_ms(),
            check_interval_ms: default_check_interval_ms(),
        }
    }
}

/// The sidecar process that hosts the messaging session.
///
/// safe-sender does not ship a sidecar. `command` must start a program that
/// speaks the newline-delimited JSON protocol defined in the root crate's
/// `bridge::protocol` module (see README.md). It is launched as
/// `<command> <args..> --session <session> [--headless]`. If it exits
/// straight away the state stream ends and `run` stops with
/// "Messaging session ended".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Executable that hosts the messaging session
    #[serde(default = "default_bridge_command")]
    pub command: String,
    #[serde(default = "default_bridge_args")]
    pub args: Vec<String>,
    /// Session name passed to the bridge (keeps login state apart)
    #[serde(default = "default_session_name")]
    pub session: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command: default_bridge_command(),
            args: default_bridge_args(),
            session: default_session_name(),
            headless: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

fn default_recipients_path() -> String {
    "./whatsapp_numbers.json".to_string()
}

fn default_message_path() -> String {
    "./messages/first.txt".to_string()
}

fn default_check_input_path() -> String {
    "./numbers.json".to_string()
}

fn default_check_output_path() -> String {
    "./whatsapp_numbers.json".to_string()
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_warmup_ms() -> u64 {
    20_000
}

fn default_check_interval_ms() -> u64 {
    5_000
}

fn default_bridge_command() -> String {
    "node".to_string()
}

fn default_bridge_args() -> Vec<String> {
    vec!["wa-bridge.mjs".to_string()]
}

fn default_session_name() -> String {
    "my-session".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    3000
}

/// Expand tilde (~) to home directory in paths
fn expand_tilde(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs
                .home_dir()
                .join(stripped)
                .to_string_lossy()
                .to_string();
        }
        tracing::warn!(
            path = %path,
            "Failed to expand tilde in path: could not determine home directory"
        );
    }
    path.to_string()
}

/// Parse an env var if set, naming the variable on failure
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} must be a valid value, got '{}': {}", name, val, e)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Find the config file, checking multiple locations in order:
    /// 1. SAFE_SENDER_CONFIG_PATH env var (if set)
    /// 2. ./config.toml
    /// 3. ~/.config/safe-sender/config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(env_path) = std::env::var("SAFE_SENDER_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!(path = %env_path, "SAFE_SENDER_CONFIG_PATH does not exist, ignoring");
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from a config file with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        if let Ok(val) = std::env::var("RECIPIENT_FILE_PATH") {
            config.files.recipients = val;
        }
        if let Ok(val) = std::env::var("MESSAGE_FILE_PATH") {
            config.files.message = val;
        }
        if let Ok(val) = std::env::var("CHECK_INPUT_PATH") {
            config.files.check_input = val;
        }
        if let Ok(val) = std::env::var("CHECK_OUTPUT_PATH") {
            config.files.check_output = val;
        }
        if let Some(val) = env_parse("COOLDOWN_MS")? {
            config.pacing.cooldown_ms = val;
        }
        if let Some(val) = env_parse("WARMUP_MS")? {
            config.pacing.warmup_ms = val;
        }
        if let Some(val) = env_parse("CHECK_INTERVAL_MS")? {
            config.pacing.check_interval_ms = val;
        }
        if let Ok(val) = std::env::var("BRIDGE_COMMAND") {
            config.bridge.command = val;
        }
        if let Ok(val) = std::env::var("BRIDGE_ARGS") {
            config.bridge.args = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(val) = std::env::var("BRIDGE_SESSION") {
            config.bridge.session = val;
        }
        if let Some(val) = env_parse("BRIDGE_HEADLESS")? {
            config.bridge.headless = val;
        }
        if let Some(val) = env_parse("SERVER_PORT")? {
            config.server.port = val;
        }
        if let Ok(val) = std::env::var("SERVER_HOST") {
            config.server.host = val;
        }

        config.files.recipients = expand_tilde(&config.files.recipients);
        config.files.message = expand_tilde(&config.files.message);
        config.files.check_input = expand_tilde(&config.files.check_input);
        config.files.check_output = expand_tilde(&config.files.check_output);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pacing.cooldown_ms == 0 {
            anyhow::bail!("pacing.cooldown_ms must be greater than zero");
        }
        if self.bridge.command.trim().is_empty() {
            anyhow::bail!("bridge.command is required (set in config.toml or BRIDGE_COMMAND env var)");
        }
        if self.bridge.session.trim().is_empty() {
            anyhow::bail!("bridge.session must not be empty");
        }
        if self.bridge.request_timeout_secs == 0 {
            anyhow::bail!("bridge.request_timeout_secs must be greater than zero");
        }
        for (name, path) in [
            ("files.recipients", &self.files.recipients),
            ("files.message", &self.files.message),
        ] {
            if path.trim().is_empty() {
                anyhow::bail!("{} must not be empty", name);
            }
        }
        Ok(())
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::from_millis(
            self.pacing.cooldown_ms,
            self.pacing.warmup_ms,
            self.pacing.check_interval_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.files.recipients, "./whatsapp_numbers.json");
        assert_eq!(config.files.message, "./messages/first.txt");
        assert_eq!(config.pacing.cooldown_ms, 30_000);
        assert_eq!(config.bridge.command, "node");
        assert_eq!(config.bridge.args, vec!["wa-bridge.mjs"]);
        assert_eq!(config.server.port, 3000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let toml_str = r#"
            [pacing]
            cooldown_ms = 45000

            [bridge]
            session = "campaign"
            headless = true
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.pacing.cooldown_ms, 45_000);
        assert_eq!(config.pacing.warmup_ms, 20_000);
        assert_eq!(config.bridge.session, "campaign");
        assert!(config.bridge.headless);
        assert_eq!(config.bridge.command, "node");
    }

    #[test]
    fn test_pacing_conversion() {
        let config: Config = toml::from_str(
            r#"
            [pacing]
            cooldown_ms = 1500
            warmup_ms = 250
            check_interval_ms = 10
        "#,
        )
        .unwrap();
        let pacing = config.pacing();
        assert_eq!(pacing.cooldown, Duration::from_millis(1500));
        assert_eq!(pacing.warmup, Duration::from_millis(250));
        assert_eq!(pacing.check_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_zero_cooldown_rejected() {
        let mut config = Config::default();
        config.pacing.cooldown_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cooldown_ms"));
    }

    #[test]
    fn test_blank_bridge_command_rejected() {
        let mut config = Config::default();
        config.bridge.command = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("./numbers.json"), "./numbers.json");
    }
}
