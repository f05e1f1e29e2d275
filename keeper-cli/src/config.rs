//! TOML configuration for the keeper binary.

use std::path::{Path, PathBuf};

use anyhow::Context;
use live_keeper::Account;
use serde::Deserialize;

fn default_session_file() -> PathBuf {
    PathBuf::from("bilibili.passport")
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Accounts to keep sessions alive for.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Shared session file, one entry per account.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_accounts_and_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [[accounts]]
            username = "alice"
            password = "pw"
            room_id = "92052"

            [[accounts]]
            username = "bob"
            password = "pw2"
            "#,
        )
        .unwrap();

        assert_eq!(config.accounts.len(), 2);
        assert_eq!(config.accounts[0].room_id.as_deref(), Some("92052"));
        assert_eq!(config.accounts[1].room_id, None);
        assert_eq!(config.session_file, PathBuf::from("bilibili.passport"));
    }

    #[test]
    fn test_session_file_override() {
        let config: AppConfig =
            toml::from_str("session_file = \"/tmp/sessions.json\"").unwrap();
        assert_eq!(config.session_file, PathBuf::from("/tmp/sessions.json"));
        assert!(config.accounts.is_empty());
    }
}
