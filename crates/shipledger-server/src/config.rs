use crate::ServerError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATA_DIR: &str = "./shipledger-data";

/// Server settings, read from a TOML file and overridden by flags.
///
/// ```toml
/// bind = "127.0.0.1"
/// port = 3001
/// data_dir = "/var/lib/shipledger"
/// auth_token = "gateway-secret"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub auth_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_owned(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            auth_token: None,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::Config(format!("invalid server config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no source may supply, whether file, flag or env.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.auth_token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServerError::Config("auth_token must not be empty".to_owned()));
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
