//! Daily check-in: one reward claim per account per day.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{KeeperError, Result};
use crate::passport::PassportClient;
use crate::tasks::{LiveTask, TaskKind};

pub struct CheckInClient {
    passport: PassportClient,
}

impl CheckInClient {
    pub fn new(passport: PassportClient) -> Self {
        Self { passport }
    }

    /// Whether today's check-in has already been claimed.
    pub async fn has_checked_in_today(&mut self) -> Result<bool> {
        let body: serde_json::Value = self
            .passport
            .get(&self.passport.live_url("/sign/GetSignInfo"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        let status = body
            .get("data")
            .and_then(|d| d.get("status"))
            .and_then(|s| s.as_i64())
            .unwrap_or(0);
        Ok(status != 0)
    }

    /// Submit the check-in; `true` when the server accepted it.
    pub async fn perform_check_in(&mut self) -> Result<bool> {
        let body: serde_json::Value = self
            .passport
            .get(&self.passport.live_url("/sign/doSign"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        Ok(body.get("code").and_then(|c| c.as_i64()) == Some(0))
    }
}

#[async_trait]
impl LiveTask for CheckInClient {
    fn kind(&self) -> TaskKind {
        TaskKind::CheckIn
    }

    /// Idempotent by construction: the check-in is only submitted when the
    /// server says today's is still outstanding, so repeating the cycle
    /// within the same day is a no-op.
    async fn run_cycle(&mut self) -> Result<()> {
        self.passport.login().await?;

        if self.has_checked_in_today().await? {
            debug!(account = %self.passport.account(), "already checked in today");
            return Ok(());
        }

        if self.perform_check_in().await? {
            info!(account = %self.passport.account(), "daily check-in done");
        } else {
            warn!(account = %self.passport.account(), "check-in submission not accepted");
        }
        Ok(())
    }
}
