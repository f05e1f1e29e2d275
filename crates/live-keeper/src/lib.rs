//! Session keeper for bilibili live accounts.
//!
//! This crate maintains an authenticated passport session per configured
//! account and runs three independent periodic tasks against it: a presence
//! heartbeat, the daily check-in, and dispatch of bag gifts that expire at
//! the end of the day.
//!
//! The pieces compose bottom-up:
//!
//! - [`crypto`] encrypts the login password against the server-issued RSA key
//! - [`session`] holds the cookie session type and its on-disk store
//! - [`passport`] owns one HTTP session per account (login, validity checks)
//! - [`room`] extracts room metadata from live pages, best-effort
//! - [`tasks`] implements the three periodic actions on top of a passport
//! - [`scheduler`] fans accounts out into independent per-task loops

use std::fmt;

use serde::Deserialize;

pub mod crypto;
pub mod error;
pub mod passport;
pub mod room;
pub mod scheduler;
pub mod session;
pub mod tasks;

pub use error::KeeperError;
pub use passport::{ApiHosts, PassportClient};
pub use scheduler::{Scheduler, build_units};
pub use session::{Session, SessionStore};
pub use tasks::TaskKind;

/// Login credentials for one account, plus an optional fixed room id that
/// skips landing-page resolution.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub room_id: Option<String>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("room_id", &self.room_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_password() {
        let account = Account {
            username: "alice".to_string(),
            password: "hunter2".to_string(),
            room_id: None,
        };
        let rendered = format!("{:?}", account);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
