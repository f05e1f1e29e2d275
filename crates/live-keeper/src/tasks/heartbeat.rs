//! Presence heartbeat: keeps the account counted as a live viewer.

use async_trait::async_trait;
use reqwest::header::REFERER;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{KeeperError, Result};
use crate::passport::PassportClient;
use crate::tasks::{LiveTask, TaskKind};

/// Intimacy is earned at a fixed rate per heartbeat; used only for the
/// progress log line.
const INTIMACY_PER_HEARTBEAT: i64 = 3000;

/// Pulses still needed to reach the next level, rounding up; a threshold
/// that is already met reads as zero.
fn pulses_to_next_level(intimacy: i64, next_intimacy: i64) -> i64 {
    let remaining = (next_intimacy - intimacy).max(0);
    (remaining + INTIMACY_PER_HEARTBEAT - 1) / INTIMACY_PER_HEARTBEAT
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    pub uname: String,
    pub user_level: i64,
    pub user_next_level: i64,
    pub user_intimacy: i64,
    pub user_next_intimacy: i64,
}

pub struct HeartbeatClient {
    passport: PassportClient,
}

impl HeartbeatClient {
    pub fn new(passport: PassportClient) -> Self {
        Self { passport }
    }

    /// Post one presence pulse.
    ///
    /// The endpoint wants the room page as referer; when the room id is not
    /// resolvable yet the pulse is sent without it.
    pub async fn send_heartbeat(&mut self) -> Result<()> {
        let room_id = self.passport.resolve_room_id().await?;

        let mut request = self
            .passport
            .post(&self.passport.live_url("/User/userOnlineHeart"));
        if let Some(room_id) = room_id {
            request = request.header(
                REFERER,
                self.passport.live_url(&format!("/{}", room_id)),
            );
        }

        let body: serde_json::Value = request
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        let code = body.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        if code != 0 {
            let message = body
                .get("msg")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error")
                .to_string();
            return Err(KeeperError::Api { code, message });
        }
        Ok(())
    }

    /// Fetch the account's live-user profile; `None` when the server does
    /// not recognize the session or the payload is unusable.
    pub async fn get_user_info(&mut self) -> Result<Option<UserInfo>> {
        let body: serde_json::Value = self
            .passport
            .get(&self.passport.live_url("/User/getUserInfo"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        if body.get("code").and_then(|c| c.as_str()) != Some("REPONSE_OK") {
            return Ok(None);
        }
        let Some(data) = body.get("data") else {
            return Ok(None);
        };
        Ok(serde_json::from_value(data.clone()).ok())
    }
}

#[async_trait]
impl LiveTask for HeartbeatClient {
    fn kind(&self) -> TaskKind {
        TaskKind::Heartbeat
    }

    async fn run_cycle(&mut self) -> Result<()> {
        self.passport.login().await?;
        self.send_heartbeat().await?;

        match self.get_user_info().await? {
            Some(user) => {
                let pulses_left =
                    pulses_to_next_level(user.user_intimacy, user.user_next_intimacy);
                info!(
                    account = %self.passport.account(),
                    uname = %user.uname,
                    level = user.user_level,
                    next_level = user.user_next_level,
                    intimacy = user.user_intimacy,
                    next_intimacy = user.user_next_intimacy,
                    pulses_to_next_level = pulses_left,
                    "heartbeat sent"
                );
            }
            None => debug!(
                account = %self.passport.account(),
                "heartbeat sent, user info unavailable"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pulses_round_up() {
        assert_eq!(pulses_to_next_level(1000, 10000), 3);
        assert_eq!(pulses_to_next_level(0, 3000), 1);
        assert_eq!(pulses_to_next_level(0, 3001), 2);
    }

    #[test]
    fn test_met_threshold_needs_no_pulses() {
        assert_eq!(pulses_to_next_level(3000, 3000), 0);
        assert_eq!(pulses_to_next_level(5000, 3000), 0);
    }
}
