//! Gift dispatch: donates bag items that lapse at the end of the day to the
//! account's live room.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{KeeperError, Result};
use crate::passport::PassportClient;
use crate::room;
use crate::tasks::{LiveTask, TaskKind};

/// The platform marks bag items that lapse at midnight with this literal
/// label rather than a timestamp.
pub const EXPIRES_TODAY: &str = "今日";

/// The session cookie the gift endpoint wants echoed back as a form field.
const TOKEN_COOKIE: &str = "LIVE_LOGIN_DATA";

/// One entry of the account's gift bag. Fetched fresh every cycle; the
/// platform mutates the bag behind our back, so nothing here is cached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GiftItem {
    /// Bag entry id (distinct from the gift type id).
    pub id: u64,
    pub gift_id: u64,
    #[serde(default)]
    pub gift_name: String,
    pub gift_num: u64,
    #[serde(default)]
    pub expireat: String,
}

/// A dispatch target: canonical room id, its owner, and the page nonce the
/// send endpoint requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRoom {
    pub room_id: String,
    pub master_id: u64,
    pub danmu_rnd: String,
}

/// Keep only the items the platform flags as expiring today.
///
/// This is the explicit business filter for dispatch eligibility, not a
/// date computation.
pub fn expiring_today(items: Vec<GiftItem>) -> Vec<GiftItem> {
    items
        .into_iter()
        .filter(|item| item.expireat == EXPIRES_TODAY)
        .collect()
}

pub struct GiftClient {
    passport: PassportClient,
}

impl GiftClient {
    pub fn new(passport: PassportClient) -> Self {
        Self { passport }
    }

    /// Renewal ping for seasonal bag items; purely best-effort.
    pub async fn renewal_ping(&mut self) {
        let result = self
            .passport
            .get(&self.passport.live_url("/summer/heart"))
            .send()
            .await;
        if let Err(e) = result {
            debug!(account = %self.passport.account(), error = %e, "renewal ping failed");
        }
    }

    /// Fetch the current gift bag. An absent `data` field reads as empty.
    pub async fn list_owned_gifts(&mut self) -> Result<Vec<GiftItem>> {
        let body: serde_json::Value = self
            .passport
            .get(&self.passport.live_url("/gift/playerBag"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        match body.get("data") {
            Some(data) if data.is_array() => {
                serde_json::from_value(data.clone()).map_err(KeeperError::Json)
            }
            _ => Ok(Vec::new()),
        }
    }

    /// Resolve the dispatch target for this cycle.
    ///
    /// Any miss along the chain (no room id, nonce absent from the page,
    /// room-info lookup rejected) is `None`: the whole cycle is skipped and
    /// retried at the next interval, never sooner.
    pub async fn resolve_active_room(&mut self) -> Result<Option<ActiveRoom>> {
        let Some(room_id) = self.passport.resolve_room_id().await? else {
            return Ok(None);
        };

        let html = self
            .passport
            .get(&self.passport.live_url(&format!("/{}", room_id)))
            .send()
            .await?
            .text()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;
        let Some(meta) = room::extract_room_meta(&html) else {
            debug!(account = %self.passport.account(), room_id = %room_id, "room page exposed no metadata");
            return Ok(None);
        };

        let body: serde_json::Value = self
            .passport
            .post(&self.passport.live_url("/live/getInfo"))
            .form(&[("roomid", meta.room_id.as_str())])
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        if body.get("code").and_then(|c| c.as_i64()) != Some(0) {
            debug!(account = %self.passport.account(), room_id = %meta.room_id, "room info lookup rejected");
            return Ok(None);
        }
        let Some(master_id) = body
            .get("data")
            .and_then(|d| d.get("MASTERID"))
            .and_then(|m| m.as_u64())
        else {
            return Ok(None);
        };

        Ok(Some(ActiveRoom {
            room_id: meta.room_id,
            master_id,
            danmu_rnd: meta.danmu_rnd,
        }))
    }

    /// Donate one bag item to `room`; `true` when the server accepted it.
    pub async fn send_gift(&mut self, item: &GiftItem, room: &ActiveRoom) -> Result<bool> {
        let token = self
            .passport
            .session_cookie(TOKEN_COOKIE)
            .ok_or_else(|| {
                KeeperError::Parse(format!("{} cookie missing from session", TOKEN_COOKIE))
            })?
            .to_string();

        let form = [
            ("roomid", room.room_id.clone()),
            ("ruid", room.master_id.to_string()),
            ("giftId", item.gift_id.to_string()),
            ("num", item.gift_num.to_string()),
            ("Bag_id", item.id.to_string()),
            ("coinType", "silver".to_string()),
            ("timestamp", Utc::now().timestamp().to_string()),
            ("rnd", room.danmu_rnd.clone()),
            ("token", token),
        ];

        let body: serde_json::Value = self
            .passport
            .post(&self.passport.live_url("/giftBag/send"))
            .form(&form)
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        Ok(body.get("code").and_then(|c| c.as_i64()) == Some(0))
    }
}

#[async_trait]
impl LiveTask for GiftClient {
    fn kind(&self) -> TaskKind {
        TaskKind::Gift
    }

    async fn run_cycle(&mut self) -> Result<()> {
        self.passport.login().await?;
        self.renewal_ping().await;

        let eligible = expiring_today(self.list_owned_gifts().await?);
        if eligible.is_empty() {
            debug!(account = %self.passport.account(), "nothing expiring today");
            return Ok(());
        }

        let Some(active) = self.resolve_active_room().await? else {
            debug!(account = %self.passport.account(), "no dispatch target this cycle");
            return Ok(());
        };

        for item in &eligible {
            if self.send_gift(item, &active).await? {
                info!(
                    account = %self.passport.account(),
                    bag_id = item.id,
                    gift = %item.gift_name,
                    num = item.gift_num,
                    room_id = %active.room_id,
                    "gift sent"
                );
            } else {
                warn!(
                    account = %self.passport.account(),
                    bag_id = item.id,
                    gift = %item.gift_name,
                    "gift dispatch not accepted"
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, expireat: &str) -> GiftItem {
        GiftItem {
            id,
            gift_id: 1,
            gift_name: "辣条".to_string(),
            gift_num: 10,
            expireat: expireat.to_string(),
        }
    }

    #[test]
    fn test_only_items_expiring_today_are_kept() {
        let items = vec![item(1, "今日"), item(2, "3日"), item(3, "今日"), item(4, "")];
        let eligible = expiring_today(items);
        assert_eq!(
            eligible.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    #[test]
    fn test_empty_bag_yields_nothing() {
        assert!(expiring_today(Vec::new()).is_empty());
    }

    #[test]
    fn test_bag_payload_deserializes() {
        let data = serde_json::json!([
            {"id": 7, "gift_id": 1, "gift_name": "辣条", "gift_num": 10, "expireat": "今日", "gift_price": 100}
        ]);
        let items: Vec<GiftItem> = serde_json::from_value(data).unwrap();
        assert_eq!(items[0].id, 7);
        assert_eq!(items[0].expireat, EXPIRES_TODAY);
    }
}
