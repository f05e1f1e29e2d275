//! Per-account passport client: owns the HTTP session, performs the
//! encrypted login exchange and session-validity checks.

use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::crypto;
use crate::error::{KeeperError, Result};
use crate::room;
use crate::session::SessionStore;
use crate::{Account, Session};

pub(crate) const DEFAULT_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// The live API signals success on the user-info endpoint with this literal
/// (misspelling included).
const RESPONSE_OK: &str = "REPONSE_OK";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URLs for the live and passport hosts.
///
/// Overridable so tests (and mirrors) can point a client at another server.
#[derive(Debug, Clone)]
pub struct ApiHosts {
    pub live: String,
    pub passport: String,
}

impl Default for ApiHosts {
    fn default() -> Self {
        Self {
            live: "https://live.bilibili.com".to_string(),
            passport: "https://passport.bilibili.com".to_string(),
        }
    }
}

/// Authentication state of a passport client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not yet checked against the server.
    Unknown,
    /// The server confirmed the session on the last check.
    Authenticated,
    /// A submitted login was rejected; terminal for this client.
    LoginFailed,
}

/// One account's authenticated HTTP session.
///
/// Each scheduler unit owns a private instance; instances for the same
/// account are deliberately not shared, so a stuck call in one task can
/// never stall another. The shared [`SessionStore`] file is the only
/// synchronization point between them.
pub struct PassportClient {
    account: String,
    password: String,
    room_override: Option<String>,
    hosts: ApiHosts,
    client: Client,
    session: Session,
    store: SessionStore,
    state: SessionState,
    cached_room_id: Option<String>,
}

impl PassportClient {
    pub fn new(account: &Account, store: SessionStore, hosts: ApiHosts) -> Result<Self> {
        let client = Client::builder()
            .user_agent(DEFAULT_UA)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let session = store.load(&account.username);

        Ok(Self {
            account: account.username.clone(),
            password: account.password.clone(),
            room_override: account.room_id.clone(),
            hosts,
            client,
            session,
            store,
            state: SessionState::Unknown,
            cached_room_id: None,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Read a raw cookie value from the session.
    ///
    /// Gift dispatch is the only caller; the platform expects the
    /// server-issued login token echoed back as a form field.
    pub fn session_cookie(&self, name: &str) -> Option<&str> {
        self.session.get(name)
    }

    pub(crate) fn live_url(&self, path: &str) -> String {
        format!("{}{}", self.hosts.live, path)
    }

    fn passport_url(&self, path: &str) -> String {
        format!("{}{}", self.hosts.passport, path)
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        self.with_session(self.client.get(url))
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        self.with_session(self.client.post(url))
    }

    fn with_session(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.session.is_empty() {
            builder
        } else {
            builder.header(COOKIE, self.session.to_cookie_header())
        }
    }

    /// Lightweight authenticated probe; `true` means the current session is
    /// recognized by the server.
    pub async fn check_session(&mut self) -> Result<bool> {
        let body: serde_json::Value = self
            .get(&self.live_url("/User/getUserInfo"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        let ok = body.get("code").and_then(|c| c.as_str()) == Some(RESPONSE_OK);
        if ok {
            self.state = SessionState::Authenticated;
        }
        Ok(ok)
    }

    /// Establish an authenticated session.
    ///
    /// Short-circuits without touching the passport host when the existing
    /// session still checks out; login is the expensive, rate-limit-sensitive
    /// path and is kept to one call per expiry. A successful fresh login is
    /// persisted through the session store; a rejected one is
    /// [`KeeperError::Auth`] and terminal for this client.
    pub async fn login(&mut self) -> Result<bool> {
        // LoginFailed is terminal: re-submitting known-rejected credentials
        // would only hammer the passport host.
        if self.state == SessionState::LoginFailed {
            return Err(KeeperError::Auth {
                account: self.account.clone(),
                reason: "previous login was rejected; not retrying".to_string(),
            });
        }

        if self.check_session().await? {
            debug!(account = %self.account, "existing session still valid");
            return Ok(true);
        }

        let key: serde_json::Value = self
            .get(&self.passport_url("/login?act=getkey"))
            .send()
            .await?
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;
        let hash = key
            .get("hash")
            .and_then(|h| h.as_str())
            .ok_or_else(|| KeeperError::Parse("missing hash in key response".to_string()))?;
        let pem = key
            .get("key")
            .and_then(|k| k.as_str())
            .ok_or_else(|| KeeperError::Parse("missing key in key response".to_string()))?;
        let pwd = crypto::encrypt_password(pem, hash, &self.password)?;

        // Touch the mini-login page first so the server seeds its pre-login
        // cookies into our session.
        let response = self
            .get(&self.passport_url("/ajax/miniLogin/minilogin"))
            .send()
            .await?;
        self.session.apply_set_cookies(response.headers());

        let form = [
            ("keep", "1"),
            ("captcha", ""),
            ("userid", self.account.as_str()),
            ("pwd", pwd.as_str()),
        ];
        let response = self
            .post(&self.passport_url("/ajax/miniLogin/login"))
            .form(&form)
            .send()
            .await?;
        self.session.apply_set_cookies(response.headers());

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;
        let status = body
            .get("status")
            .and_then(|s| s.as_bool())
            .unwrap_or(false);

        if !status {
            self.state = SessionState::LoginFailed;
            let reason = body
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("rejected by server")
                .to_string();
            return Err(KeeperError::Auth {
                account: self.account.clone(),
                reason,
            });
        }

        self.state = SessionState::Authenticated;
        debug!(account = %self.account, "login accepted");

        if let Err(e) = self.store.save(&self.account, &self.session) {
            warn!(
                account = %self.account,
                error = %e,
                "session not persisted; continuing with in-memory cookies"
            );
        }
        Ok(true)
    }

    /// The account's live room id: the configured override if any, else a
    /// cached or freshly scraped landing-page value.
    ///
    /// `None` means the page did not expose a room id this time; callers
    /// retry on a later cycle.
    pub async fn resolve_room_id(&mut self) -> Result<Option<String>> {
        if let Some(id) = &self.room_override {
            return Ok(Some(id.clone()));
        }
        if let Some(id) = &self.cached_room_id {
            return Ok(Some(id.clone()));
        }

        let html = self
            .get(&self.live_url("/"))
            .send()
            .await?
            .text()
            .await
            .map_err(|e| KeeperError::Parse(e.to_string()))?;

        let found = room::extract_room_id(&html);
        match &found {
            Some(id) => self.cached_room_id = Some(id.clone()),
            None => debug!(account = %self.account, "no room id on landing page yet"),
        }
        Ok(found)
    }
}
