//! Periodic task clients built on top of an authenticated passport session.

mod checkin;
mod gift;
mod heartbeat;

pub use checkin::CheckInClient;
pub use gift::{ActiveRoom, EXPIRES_TODAY, GiftClient, GiftItem, expiring_today};
pub use heartbeat::{HeartbeatClient, UserInfo};

use async_trait::async_trait;
use strum::{Display, EnumIter};

use crate::error::Result;
use crate::passport::PassportClient;

/// The three periodic actions the keeper runs per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum TaskKind {
    Heartbeat,
    Gift,
    CheckIn,
}

/// One periodic action bound to a passport session.
///
/// `run_cycle` is one scheduler pass; errors it returns are absorbed by the
/// scheduler (transient ones skip the cycle, auth failures stop the
/// account's task set).
#[async_trait]
pub trait LiveTask: Send {
    fn kind(&self) -> TaskKind;

    async fn run_cycle(&mut self) -> Result<()>;
}

/// Bind `kind` to a passport session.
pub fn build_task(kind: TaskKind, passport: PassportClient) -> Box<dyn LiveTask> {
    match kind {
        TaskKind::Heartbeat => Box::new(HeartbeatClient::new(passport)),
        TaskKind::Gift => Box::new(GiftClient::new(passport)),
        TaskKind::CheckIn => Box::new(CheckInClient::new(passport)),
    }
}
