//! Cookie session types shared by the passport client and the session store.

mod store;

pub use store::SessionStore;

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, SET_COOKIE};
use serde::{Deserialize, Serialize};

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            domain: String::new(),
            path: default_path(),
            expires: None,
        }
    }
}

/// An account's cookie set, ordered by cookie name.
///
/// A session is either *valid* (the server has confirmed it) or *unknown*;
/// validity is tracked by the owning passport client, never assumed here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Session {
    cookies: BTreeMap<String, CookieRecord>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, record: CookieRecord) {
        self.cookies.insert(name.into(), record);
    }

    /// Build a `Cookie` request header value (`name=value; ...`).
    pub fn to_cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, record)| format!("{}={}", name, record.value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Merge cookies from `Set-Cookie` response headers into this session,
    /// keeping the Domain/Path/Expires attributes the server sent.
    pub fn apply_set_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(SET_COOKIE) {
            let Ok(cookie_str) = value.to_str() else {
                continue;
            };
            if let Some((name, record)) = parse_set_cookie(cookie_str) {
                self.cookies.insert(name, record);
            }
        }
    }
}

/// Parse a single `Set-Cookie` header value into a name and record.
fn parse_set_cookie(cookie_str: &str) -> Option<(String, CookieRecord)> {
    let mut parts = cookie_str.split(';');

    let (name, value) = parts.next()?.trim().split_once('=')?;
    if name.is_empty() {
        return None;
    }
    let mut record = CookieRecord::new(value);

    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k, v),
            None => (attr, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" => record.domain = val.to_string(),
            "path" => record.path = val.to_string(),
            "expires" => record.expires = Some(val.to_string()),
            _ => {}
        }
    }

    Some((name.to_string(), record))
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_cookie_header_is_ordered_by_name() {
        let mut session = Session::default();
        session.insert("b", CookieRecord::new("2"));
        session.insert("a", CookieRecord::new("1"));

        assert_eq!(session.to_cookie_header(), "a=1; b=2");
    }

    #[test]
    fn test_apply_set_cookies_captures_attributes() {
        let mut headers = HeaderMap::new();
        headers.append(
            SET_COOKIE,
            HeaderValue::from_static(
                "LIVE_LOGIN_DATA=tok; Domain=.bilibili.com; Path=/; Expires=Sat, 01 Jan 2028 00:00:00 GMT; HttpOnly",
            ),
        );
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=abc"));

        let mut session = Session::default();
        session.apply_set_cookies(&headers);

        assert_eq!(session.get("LIVE_LOGIN_DATA"), Some("tok"));
        assert_eq!(session.get("sid"), Some("abc"));
        let header = session.to_cookie_header();
        assert!(header.contains("LIVE_LOGIN_DATA=tok"));
        assert!(header.contains("sid=abc"));
    }

    #[test]
    fn test_set_cookie_overwrites_existing_value() {
        let mut session = Session::default();
        session.insert("sid", CookieRecord::new("old"));

        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("sid=new; Path=/"));
        session.apply_set_cookies(&headers);

        assert_eq!(session.get("sid"), Some("new"));
    }

    #[test]
    fn test_malformed_set_cookie_is_skipped() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("garbage-without-eq"));

        let mut session = Session::default();
        session.apply_set_cookies(&headers);

        assert!(session.is_empty());
    }
}
