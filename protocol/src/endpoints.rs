//! Client-server API paths handled or called by the proxy.

/// Prefix shared by every client-server endpoint the proxy knows about.
pub const CLIENT_PREFIX: &str = "/_matrix/client/r0";

pub const LOGIN_PATH: &str = "/_matrix/client/r0/login";
pub const SYNC_PATH: &str = "/_matrix/client/r0/sync";
pub const KEYS_UPLOAD_PATH: &str = "/_matrix/client/r0/keys/upload";
pub const KEYS_QUERY_PATH: &str = "/_matrix/client/r0/keys/query";

/// Route template for sending a room event, with `room_id`, `event_type`
/// and `txnid` path parameters.
pub const ROOM_SEND_PATTERN: &str = "/_matrix/client/r0/rooms/{room_id}/send/{event_type}/{txnid}";

/// Splits a fixed endpoint path into its segments, dropping the leading slash.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_start_matches('/').split('/')
}

/// Unencoded path segments of the room send endpoint. Callers are expected to
/// percent-encode each segment when building a URL.
#[must_use]
pub fn room_send_segments<'a>(room_id: &'a str, event_type: &'a str, txn_id: &'a str) -> [&'a str; 8] {
    [
        "_matrix", "client", "r0", "rooms", room_id, "send", event_type, txn_id,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_paths_share_prefix() {
        for path in [LOGIN_PATH, SYNC_PATH, KEYS_UPLOAD_PATH, KEYS_QUERY_PATH, ROOM_SEND_PATTERN] {
            assert!(path.starts_with(CLIENT_PREFIX), "{path}");
        }
    }

    #[test]
    fn segments_skip_leading_slash() {
        let parts: Vec<&str> = segments(SYNC_PATH).collect();
        assert_eq!(parts, vec!["_matrix", "client", "r0", "sync"]);
    }

    #[test]
    fn room_send_segments_keep_raw_values() {
        let parts = room_send_segments("!room:example.org", "m.room.message", "txn 1");
        assert_eq!(parts[4], "!room:example.org");
        assert_eq!(parts[6], "m.room.message");
        assert_eq!(parts[7], "txn 1");
    }
}
