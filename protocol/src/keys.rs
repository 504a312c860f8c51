//! Device key query and upload shapes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default server-side timeout for key queries, in milliseconds.
pub const KEYS_QUERY_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysQueryRequest {
    /// User id to device ids; an empty list asks for every device.
    pub device_keys: BTreeMap<String, Vec<String>>,
    pub timeout: u64,
}

impl KeysQueryRequest {
    pub fn all_devices<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            device_keys: users
                .into_iter()
                .map(|user| (user.into(), Vec::new()))
                .collect(),
            timeout: KEYS_QUERY_TIMEOUT_MS,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct KeysQueryResponse {
    #[serde(default)]
    pub device_keys: BTreeMap<String, BTreeMap<String, DeviceKeys>>,
    #[serde(default)]
    pub failures: BTreeMap<String, Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceKeys {
    pub user_id: String,
    pub device_id: String,
    #[serde(default)]
    pub algorithms: Vec<String>,
    #[serde(default)]
    pub keys: BTreeMap<String, String>,
    #[serde(default)]
    pub unsigned: Option<UnsignedDeviceInfo>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnsignedDeviceInfo {
    #[serde(default)]
    pub device_display_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeysUploadResponse {
    #[serde(default)]
    pub one_time_key_counts: BTreeMap<String, u64>,
}
