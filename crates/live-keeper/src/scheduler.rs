//! Per-account task fan-out and the fixed-interval cycle loops.

use std::collections::HashMap;
use std::time::Duration;

use strum::IntoEnumIterator;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Account;
use crate::passport::{ApiHosts, PassportClient};
use crate::session::SessionStore;
use crate::tasks::{self, TaskKind};

/// Interval between cycles; must exceed the platform's presence expiry
/// window or the viewer presence flaps.
pub const CYCLE_INTERVAL: Duration = Duration::from_secs(5 * 60 + 30);

/// Delay between unit launches so a many-account start does not turn into a
/// login burst.
pub const LAUNCH_STAGGER: Duration = Duration::from_secs(3);

/// One (account, task-kind) pairing, run as an independent loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub account: Account,
    pub kind: TaskKind,
}

/// Expand the configured accounts into the full unit registry: every task
/// kind for every account.
pub fn build_units(accounts: &[Account]) -> Vec<UnitSpec> {
    accounts
        .iter()
        .flat_map(|account| {
            TaskKind::iter().map(move |kind| UnitSpec {
                account: account.clone(),
                kind,
            })
        })
        .collect()
}

/// Spawns one loop per (account, task-kind) pair and keeps them alive for
/// the life of the process.
///
/// Units never share a passport client, even within an account; a stuck
/// call in one task cannot stall a sibling. The session store file is the
/// only state they share.
pub struct Scheduler {
    store: SessionStore,
    hosts: ApiHosts,
    interval: Duration,
    stagger: Duration,
}

impl Scheduler {
    pub fn new(store: SessionStore, hosts: ApiHosts) -> Self {
        Self {
            store,
            hosts,
            interval: CYCLE_INTERVAL,
            stagger: LAUNCH_STAGGER,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    /// Launch every unit and wait for them; under normal operation this
    /// never returns. A fatal login failure stops the affected account's
    /// units while every other account keeps running.
    pub async fn run(&self, units: Vec<UnitSpec>) {
        // One token per account: a fatal failure in any of its units cancels
        // the siblings, and nothing else.
        let mut account_tokens: HashMap<String, CancellationToken> = HashMap::new();
        let mut handles = Vec::new();

        for unit in units {
            let token = account_tokens
                .entry(unit.account.username.clone())
                .or_default()
                .clone();
            handles.push(tokio::spawn(run_unit(
                unit,
                self.store.clone(),
                self.hosts.clone(),
                self.interval,
                token,
            )));
            sleep(self.stagger).await;
        }

        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn run_unit(
    unit: UnitSpec,
    store: SessionStore,
    hosts: ApiHosts,
    interval: Duration,
    token: CancellationToken,
) {
    let account = unit.account.username.clone();

    // A sibling unit may have already failed this account's login while we
    // were waiting out the launch stagger.
    if token.is_cancelled() {
        return;
    }

    let mut passport = match PassportClient::new(&unit.account, store, hosts) {
        Ok(passport) => passport,
        Err(e) => {
            error!(account = %account, task = %unit.kind, error = %e, "could not build http client");
            token.cancel();
            return;
        }
    };

    match passport.login().await {
        Ok(_) => info!(account = %account, task = %unit.kind, "unit started"),
        Err(e) if e.is_fatal_for_account() => {
            error!(
                account = %account,
                task = %unit.kind,
                error = %e,
                "login rejected; stopping all tasks for this account"
            );
            token.cancel();
            return;
        }
        Err(e) => {
            warn!(
                account = %account,
                task = %unit.kind,
                error = %e,
                "initial login did not complete; retrying next cycle"
            );
        }
    }

    let mut task = tasks::build_task(unit.kind, passport);

    loop {
        if token.is_cancelled() {
            info!(account = %account, task = %unit.kind, "unit stopped");
            return;
        }

        if let Err(e) = task.run_cycle().await {
            if e.is_fatal_for_account() {
                // A rejected re-login mid-run; never tight-loop it.
                error!(
                    account = %account,
                    task = %unit.kind,
                    error = %e,
                    "session no longer accepted; stopping all tasks for this account"
                );
                token.cancel();
                return;
            }
            warn!(account = %account, task = %unit.kind, error = %e, "cycle skipped");
        }

        tokio::select! {
            _ = token.cancelled() => {
                info!(account = %account, task = %unit.kind, "unit stopped");
                return;
            }
            _ = sleep(interval) => {}
        }
    }
}
