//! Chat-protocol wire types shared by the proxy server and its tests.
//!
//! Only the slices of the client-server API the proxy routes, transforms or
//! calls itself are modelled here; everything else passes through as bytes.

pub mod endpoints;
pub mod error;
pub mod keys;
pub mod login;
pub mod sync;

pub use error::{ErrorBody, ErrorCode};
pub use keys::{DeviceKeys, KeysQueryRequest, KeysQueryResponse, KeysUploadResponse};
pub use login::{BodyError, LoginRequest, LoginResponse, PasswordLogin, UserIdentifier};
pub use sync::{decode_filter, DeviceLists, SyncSummary};

/// Returns the protocol crate version string.
pub fn protocol_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
