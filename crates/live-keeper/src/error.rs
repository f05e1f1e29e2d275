use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide error type.
///
/// Only `Auth` and `Crypto` are fatal for an account's task set; every other
/// variant is absorbed at the cycle boundary by the scheduler.
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("login rejected for {account}: {reason}")]
    Auth { account: String, reason: String },
    #[error("api error (code={code}): {message}")]
    Api { code: i64, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session store error at {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl KeeperError {
    /// Whether this failure should stop every task of the affected account
    /// instead of being retried next cycle.
    pub fn is_fatal_for_account(&self) -> bool {
        matches!(self, KeeperError::Auth { .. } | KeeperError::Crypto(_))
    }
}

pub type Result<T> = std::result::Result<T, KeeperError>;
