//! Best-effort extraction of room metadata from live pages.
//!
//! The page structure is outside our control, so a missing match is a normal
//! outcome (`None`) and never an error; callers retry on a later cycle.

use std::sync::LazyLock;

use regex::Regex;

static ROOM_LINK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-room-id="(\d+)""#).unwrap());

static ROOM_META_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)var ROOMID = (\d+);.*?var DANMU_RND = (\d+);").unwrap());

/// A canonical room id with the per-page nonce some endpoints require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomMeta {
    pub room_id: String,
    pub danmu_rnd: String,
}

/// Find the featured room id on the live landing page.
pub fn extract_room_id(html: &str) -> Option<String> {
    ROOM_LINK_REGEX
        .captures(html)
        .map(|captures| captures[1].to_string())
}

/// Pull the canonical room id and danmaku nonce out of a room page.
pub fn extract_room_meta(html: &str) -> Option<RoomMeta> {
    ROOM_META_REGEX.captures(html).map(|captures| RoomMeta {
        room_id: captures[1].to_string(),
        danmu_rnd: captures[2].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_room_id() {
        let html = r#"<a class="live-card" data-room-id="92052" href="/92052">"#;
        assert_eq!(extract_room_id(html), Some("92052".to_string()));
    }

    #[test]
    fn test_extract_room_id_absent() {
        assert_eq!(extract_room_id("<html><body>nothing here</body></html>"), None);
    }

    #[test]
    fn test_extract_room_meta() {
        let html = "<script>\nvar ROOMID = 5279;\nvar AREAID = 0;\nvar DANMU_RND = 1471766374;\n</script>";
        assert_eq!(
            extract_room_meta(html),
            Some(RoomMeta {
                room_id: "5279".to_string(),
                danmu_rnd: "1471766374".to_string(),
            })
        );
    }

    #[test]
    fn test_extract_room_meta_requires_both_fields() {
        let html = "<script>var ROOMID = 5279;</script>";
        assert_eq!(extract_room_meta(html), None);
    }
}
