//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use crate::store::ConversationContext;
use crate::window::WindowPolicy;

use anyhow::Context as _;
use serde::Deserialize;

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Channel used when none is configured.
pub const DEFAULT_CHANNEL_ID: &str = "chat_history";

/// Window length used in window mode when `window_size` is not set.
pub const DEFAULT_WINDOW_SIZE: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// chatmem configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where the remote store lives and how to authenticate.
    pub connection: ConnectionConfig,

    /// Which channel to track and how to expose it.
    pub memory: MemoryConfig,
}

/// Remote store address and credentials. Fixed for the life of a store client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `http` or `https`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Sent as a bearer token on every request.
    pub token: String,
    /// Per-request timeout. Unset means the transport default (none).
    pub timeout_secs: Option<u64>,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>) -> Self {
        Self {
            scheme: "http".into(),
            host: host.into(),
            port,
            token: token.into(),
            timeout_secs: None,
        }
    }

    /// URL of the messages endpoint, without the channel query.
    pub fn messages_url(&self) -> String {
        format!("{}://{}:{}/messages", self.scheme, self.host, self.port)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Invalid("connection host must not be empty".into()).into());
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("connection port must not be 0".into()).into());
        }
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ConfigError::Invalid(format!(
                "unsupported scheme '{}', expected http or https",
                self.scheme
            ))
            .into());
        }
        Ok(())
    }
}

/// Which history shape the memory exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryMode {
    /// The whole channel history.
    #[default]
    Buffer,
    /// Only the trailing `window_size` messages.
    Window,
}

/// What `clear()` does.
///
/// The wire protocol has no delete operation, so neither option touches the
/// remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearPolicy {
    /// `clear()` is accepted and does nothing.
    #[default]
    Disabled,
    /// `clear()` empties the local cache for the channel. The next read
    /// reloads from the store.
    LocalOnly,
}

/// Per-channel memory settings.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    pub channel_id: String,
    pub context: ConversationContext,
    pub mode: MemoryMode,
    /// Only meaningful in [`MemoryMode::Window`].
    pub window_size: Option<NonZeroUsize>,
    pub clear: ClearPolicy,
    /// Key under which `load_variables` publishes the history.
    pub memory_key: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            channel_id: DEFAULT_CHANNEL_ID.into(),
            context: ConversationContext::empty(),
            mode: MemoryMode::Buffer,
            window_size: None,
            clear: ClearPolicy::Disabled,
            memory_key: DEFAULT_CHANNEL_ID.into(),
        }
    }
}

impl MemoryConfig {
    /// Windowing policy implied by the mode.
    pub fn window(&self) -> WindowPolicy {
        match self.mode {
            MemoryMode::Buffer => WindowPolicy::unbounded(),
            MemoryMode::Window => {
                WindowPolicy::last(self.window_size.unwrap_or(DEFAULT_WINDOW_SIZE))
            }
        }
    }
}

// -- TOML deserialization types --

#[derive(Deserialize)]
struct TomlConfig {
    #[serde(default)]
    connection: TomlConnectionConfig,
    #[serde(default)]
    memory: TomlMemoryConfig,
}

#[derive(Deserialize, Default)]
struct TomlConnectionConfig {
    scheme: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Deserialize, Default)]
struct TomlMemoryConfig {
    channel_id: Option<String>,
    /// Either a TOML table or a JSON document in a string.
    context: Option<toml::Value>,
    mode: Option<MemoryMode>,
    window_size: Option<usize>,
    clear: Option<ClearPolicy>,
    memory_key: Option<String>,
}

/// Resolve a value that might be an "env:VAR_NAME" reference.
fn resolve_env_value(value: &str) -> Option<String> {
    if let Some(var_name) = value.strip_prefix("env:") {
        std::env::var(var_name).ok()
    } else {
        Some(value.to_string())
    }
}

fn parse_context(value: toml::Value) -> Result<ConversationContext> {
    let json = match value {
        toml::Value::String(raw) => {
            let raw = resolve_env_value(&raw).unwrap_or_default();
            if raw.trim().is_empty() {
                return Ok(ConversationContext::empty());
            }
            serde_json::from_str(&raw).map_err(|error| {
                ConfigError::Invalid(format!("memory.context is not valid JSON: {error}"))
            })?
        }
        other => serde_json::to_value(other)
            .context("failed to convert memory.context to JSON")?,
    };
    Ok(ConversationContext::new(json))
}

fn parse_window_size(size: usize) -> Result<NonZeroUsize> {
    NonZeroUsize::new(size)
        .ok_or_else(|| ConfigError::Invalid("memory.window_size must be positive".into()).into())
}

impl Config {
    /// Resolve the instance directory from env or default (~/.chatmem).
    pub fn default_instance_dir() -> PathBuf {
        std::env::var("CHATMEM_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|d| d.join(".chatmem"))
                    .unwrap_or_else(|| PathBuf::from("./.chatmem"))
            })
    }

    /// Load configuration from the default config file, falling back to env vars.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_instance_dir().join("config.toml");
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::load_from_env()
        }
    }

    /// Load from a specific TOML config file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(error),
        })?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        Self::from_toml(toml_config)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig =
            toml::from_str(content).context("failed to parse config TOML")?;
        Self::from_toml(toml_config)
    }

    /// Load from environment variables only (no config file).
    pub fn load_from_env() -> Result<Self> {
        let host = std::env::var("CHATMEM_HOST")
            .map_err(|_| ConfigError::MissingKey("CHATMEM_HOST".into()))?;
        let port = std::env::var("CHATMEM_PORT")
            .map_err(|_| ConfigError::MissingKey("CHATMEM_PORT".into()))?
            .parse::<u16>()
            .map_err(|error| ConfigError::Invalid(format!("CHATMEM_PORT: {error}")))?;
        let token = std::env::var("CHATMEM_TOKEN")
            .map_err(|_| ConfigError::MissingKey("CHATMEM_TOKEN".into()))?;

        let mut memory = MemoryConfig::default();
        if let Ok(channel_id) = std::env::var("CHATMEM_CHANNEL") {
            memory.channel_id = channel_id;
        }
        if let Ok(window) = std::env::var("CHATMEM_WINDOW") {
            let size = window
                .parse::<usize>()
                .map_err(|error| ConfigError::Invalid(format!("CHATMEM_WINDOW: {error}")))?;
            memory.mode = MemoryMode::Window;
            memory.window_size = Some(parse_window_size(size)?);
        }

        let connection = ConnectionConfig::new(host, port, token);
        connection.validate()?;

        Ok(Self { connection, memory })
    }

    fn from_toml(toml: TomlConfig) -> Result<Self> {
        let host = toml
            .connection
            .host
            .as_deref()
            .and_then(resolve_env_value)
            .ok_or_else(|| ConfigError::MissingKey("connection.host".into()))?;
        let port = toml
            .connection
            .port
            .ok_or_else(|| ConfigError::MissingKey("connection.port".into()))?;
        let token = toml
            .connection
            .token
            .as_deref()
            .and_then(resolve_env_value)
            .ok_or_else(|| ConfigError::MissingKey("connection.token".into()))?;

        let connection = ConnectionConfig {
            scheme: toml.connection.scheme.unwrap_or_else(|| "http".into()),
            host,
            port,
            token,
            timeout_secs: toml.connection.timeout_secs,
        };
        connection.validate()?;

        let defaults = MemoryConfig::default();
        let context = match toml.memory.context {
            Some(value) => parse_context(value)?,
            None => defaults.context,
        };
        let window_size = toml.memory.window_size.map(parse_window_size).transpose()?;
        let mode = toml.memory.mode.unwrap_or_default();
        if mode == MemoryMode::Buffer && window_size.is_some() {
            tracing::warn!("memory.window_size is ignored in buffer mode");
        }

        let memory = MemoryConfig {
            channel_id: toml.memory.channel_id.unwrap_or(defaults.channel_id),
            context,
            mode,
            window_size,
            clear: toml.memory.clear.unwrap_or_default(),
            memory_key: toml.memory.memory_key.unwrap_or(defaults.memory_key),
        };

        Ok(Self { connection, memory })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use serde_json::json;

    #[test]
    fn parses_full_config() {
        let config = Config::from_toml_str(indoc! {r#"
            [connection]
            scheme = "https"
            host = "history.internal"
            port = 8443
            token = "secret"
            timeout_secs = 30

            [memory]
            channel_id = "support"
            context = { tenant = "acme", priority = 2 }
            mode = "window"
            window_size = 10
            clear = "local_only"
        "#})
        .unwrap();

        assert_eq!(
            config.connection.messages_url(),
            "https://history.internal:8443/messages"
        );
        assert_eq!(config.connection.timeout_secs, Some(30));
        assert_eq!(config.memory.channel_id, "support");
        assert_eq!(
            config.memory.context.value(),
            Some(&json!({"tenant": "acme", "priority": 2}))
        );
        assert_eq!(config.memory.window().size(), NonZeroUsize::new(10));
        assert_eq!(config.memory.clear, ClearPolicy::LocalOnly);
    }

    #[test]
    fn defaults_match_buffer_memory() {
        let config = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
            token = "t"
        "#})
        .unwrap();

        assert_eq!(config.connection.scheme, "http");
        assert_eq!(config.memory.channel_id, DEFAULT_CHANNEL_ID);
        assert_eq!(config.memory.mode, MemoryMode::Buffer);
        assert_eq!(config.memory.window().size(), None);
        assert_eq!(config.memory.clear, ClearPolicy::Disabled);
        assert_eq!(config.memory.context.header_value(), "{}");
    }

    #[test]
    fn window_mode_defaults_window_size() {
        let config = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
            token = "t"

            [memory]
            mode = "window"
        "#})
        .unwrap();

        assert_eq!(config.memory.window().size(), Some(DEFAULT_WINDOW_SIZE));
    }

    #[test]
    fn context_accepts_json_string() {
        let config = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
            token = "t"

            [memory]
            context = '{"session": "abc"}'
        "#})
        .unwrap();

        assert_eq!(config.memory.context.value(), Some(&json!({"session": "abc"})));
    }

    #[test]
    fn rejects_invalid_json_context() {
        let error = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
            token = "t"

            [memory]
            context = "{not json"
        "#})
        .unwrap_err();

        assert!(error.to_string().contains("not valid JSON"));
    }

    #[test]
    fn rejects_zero_window_and_port() {
        let zero_window = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
            token = "t"

            [memory]
            mode = "window"
            window_size = 0
        "#});
        assert!(zero_window.is_err());

        let zero_port = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 0
            token = "t"
        "#});
        assert!(zero_port.is_err());
    }

    #[test]
    fn missing_token_is_reported() {
        let error = Config::from_toml_str(indoc! {r#"
            [connection]
            host = "localhost"
            port = 3000
        "#})
        .unwrap_err();

        assert!(matches!(
            error,
            crate::Error::Config(ConfigError::MissingKey(ref key)) if key == "connection.token"
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            indoc! {r#"
                [connection]
                host = "localhost"
                port = 3000
                token = "t"
            "#},
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.connection.port, 3000);

        let missing = Config::load_from_path(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, crate::Error::Config(ConfigError::Load { .. })));
    }

    #[test]
    fn file_errors_keep_their_config_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            indoc! {r#"
                [connection]
                host = "localhost"
                port = 3000
            "#},
        )
        .unwrap();

        let error = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(
            error,
            crate::Error::Config(ConfigError::MissingKey(ref key)) if key == "connection.token"
        ));

        std::fs::write(&path, "[connection\n").unwrap();
        let error = Config::load_from_path(&path).unwrap_err();
        assert!(error.to_string().contains("failed to parse config from"));
    }
}
