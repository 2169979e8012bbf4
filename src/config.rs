// Конфигурация сессии: ICE/TURN серверы и логирование.
// В релизной сборке логирование по умолчанию выключено, как и раньше.

use crate::error::{SessionError, SessionResult};
use crate::peer::types::ServerConfig;
use serde::Deserialize;
use std::path::Path;

#[cfg(debug_assertions)]
pub const LOGGING_ENABLED: bool = true;

#[cfg(not(debug_assertions))]
pub const LOGGING_ENABLED: bool = false;

/// Переменная окружения, переопределяющая уровень логирования
pub const LOG_ENV: &str = "SSC_LOG";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    pub level: String,
    /// "text" или "json"
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: LOGGING_ENABLED,
            level: "info".into(),
            format: "text".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub relay_servers: Vec<ServerConfig>,
    pub log: LogConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            relay_servers: default_relay_servers(),
            log: LogConfig::default(),
        }
    }
}

/// TURN сервер по умолчанию
pub fn default_relay_servers() -> Vec<ServerConfig> {
    vec![ServerConfig {
        id: "default-turn".into(),
        r#type: "turn".into(),
        url: "turn:turn.xaos.ninja:4433".into(),
        username: Some("test".into()),
        credential: Some("12345".into()),
    }]
}

impl SessionConfig {
    pub fn from_toml_str(s: &str) -> SessionResult<Self> {
        let config: SessionConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SessionError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> SessionResult<()> {
        for server in &self.relay_servers {
            if server.url.is_empty() {
                return Err(SessionError::InvalidRelay {
                    url: server.url.clone(),
                    reason: "server url cannot be empty".into(),
                });
            }

            if server.is_turn() && (server.username.is_none() || server.credential.is_none()) {
                return Err(SessionError::InvalidRelay {
                    url: server.url.clone(),
                    reason: "TURN servers require username and credential".into(),
                });
            }
        }

        if !matches!(self.log.format.as_str(), "text" | "json") {
            return Err(SessionError::Config(format!(
                "unknown log format {:?}",
                self.log.format
            )));
        }
        Ok(())
    }
}
