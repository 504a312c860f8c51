//! Sync query handling and the parts of the sync response the proxy reads.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Best-effort decode of the `filter` query parameter.
///
/// Anything that does not decode to a JSON object is treated as no filter,
/// including filter ids such as `filter=42`.
pub fn decode_filter(raw: Option<&str>) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw?) {
        Ok(Value::Object(filter)) => Some(filter),
        _ => None,
    }
}

/// Slice of a sync response consumed by the session to track its position
/// and which users need their device lists refreshed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct SyncSummary {
    pub next_batch: String,
    #[serde(default)]
    pub device_lists: DeviceLists,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct DeviceLists {
    #[serde(default)]
    pub changed: BTreeSet<String>,
    #[serde(default)]
    pub left: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_filter_is_kept() {
        let filter = decode_filter(Some(r#"{"room":{"timeline":{"limit":10}}}"#)).unwrap();
        assert_eq!(filter["room"]["timeline"]["limit"], 10);
    }

    #[test]
    fn undecodable_or_scalar_filter_is_dropped() {
        assert!(decode_filter(Some("not-json")).is_none());
        assert!(decode_filter(Some("42")).is_none());
        assert!(decode_filter(Some("\"abc\"")).is_none());
        assert!(decode_filter(None).is_none());
    }

    #[test]
    fn summary_defaults_missing_device_lists() {
        let summary: SyncSummary = serde_json::from_str(r#"{"next_batch":"s1"}"#).unwrap();
        assert_eq!(summary.next_batch, "s1");
        assert!(summary.device_lists.changed.is_empty());
    }
}
