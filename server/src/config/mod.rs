use reqwest::Url;
use serde::Deserialize;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;

use crate::error::{ProxyError, Result};
use crate::proxy::transport::OutboundSettings;

pub const DEFAULT_LISTEN_PORT: u16 = 8009;
pub const DEFAULT_DEVICE_DISPLAY_NAME: &str = "veil";
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// What to do with devices that show up in a key query during sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum DeviceTrustPolicy {
    /// Trust on first use: every non-deleted device is verified.
    #[default]
    #[serde(rename = "auto")]
    AutoTrust,
    /// Leave verification to the user.
    #[serde(rename = "manual")]
    Manual,
}

impl FromStr for DeviceTrustPolicy {
    type Err = ProxyError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::AutoTrust),
            "manual" => Ok(Self::Manual),
            other => Err(ProxyError::Config(format!(
                "Unknown device trust policy '{}', expected 'auto' or 'manual'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub homeserver: String,
    pub listen_address: IpAddr,
    pub listen_port: u16,
    pub proxy: Option<String>,
    pub ssl_insecure: bool,
    pub device_trust: DeviceTrustPolicy,
    pub device_display_name: String,
    pub max_body_bytes: usize,
}

/// On-disk shape; every field may also come from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    homeserver: Option<String>,
    listen_address: Option<IpAddr>,
    listen_port: Option<u16>,
    proxy: Option<String>,
    ssl_insecure: Option<bool>,
    device_trust: Option<DeviceTrustPolicy>,
    device_display_name: Option<String>,
    max_body_bytes: Option<usize>,
}

impl ProxyConfig {
    pub fn new(homeserver: impl Into<String>) -> Self {
        Self {
            homeserver: homeserver.into(),
            listen_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            listen_port: DEFAULT_LISTEN_PORT,
            proxy: None,
            ssl_insecure: false,
            device_trust: DeviceTrustPolicy::default(),
            device_display_name: DEFAULT_DEVICE_DISPLAY_NAME.to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = read_file(path.as_ref())?;
        Self::resolve(file, |_| None)
    }

    /// Loads the TOML file if it exists, then applies `VEIL_*` environment
    /// overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let file = if path.exists() {
            read_file(path)?
        } else {
            log::debug!("No config file at '{}', using environment only", path.display());
            FileConfig::default()
        };

        Self::resolve(file, env)
    }

    fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let homeserver = env("VEIL_HOMESERVER")
            .or(file.homeserver)
            .ok_or_else(|| ProxyError::Config("No homeserver configured".to_string()))?;

        let mut config = Self::new(homeserver);

        if let Some(address) = env("VEIL_LISTEN_ADDRESS") {
            config.listen_address = address.parse().map_err(|e| {
                ProxyError::Config(format!("Invalid listen address '{}': {}", address, e))
            })?;
        } else if let Some(address) = file.listen_address {
            config.listen_address = address;
        }

        if let Some(port) = env("VEIL_LISTEN_PORT") {
            config.listen_port = port
                .parse()
                .map_err(|e| ProxyError::Config(format!("Invalid listen port '{}': {}", port, e)))?;
        } else if let Some(port) = file.listen_port {
            config.listen_port = port;
        }

        config.proxy = env("VEIL_PROXY").or(file.proxy).filter(|p| !p.is_empty());

        if let Some(flag) = env("VEIL_SSL_INSECURE") {
            config.ssl_insecure = parse_flag(&flag)?;
        } else if let Some(flag) = file.ssl_insecure {
            config.ssl_insecure = flag;
        }

        if let Some(policy) = env("VEIL_DEVICE_TRUST") {
            config.device_trust = policy.parse()?;
        } else if let Some(policy) = file.device_trust {
            config.device_trust = policy;
        }

        if let Some(name) = file.device_display_name {
            config.device_display_name = name;
        }

        if let Some(limit) = file.max_body_bytes {
            config.max_body_bytes = limit;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        http_url("homeserver", &self.homeserver)?;
        if let Some(proxy) = &self.proxy {
            http_url("proxy", proxy)?;
        }
        Ok(())
    }

    pub fn homeserver_url(&self) -> Result<Url> {
        http_url("homeserver", &self.homeserver)
    }

    /// Homeserver base without a trailing slash, ready to have a request path
    /// appended.
    pub fn homeserver_base(&self) -> &str {
        self.homeserver.trim_end_matches('/')
    }

    pub fn outbound(&self) -> OutboundSettings {
        OutboundSettings {
            proxy: self.proxy.clone(),
            ssl_insecure: self.ssl_insecure,
        }
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| ProxyError::Config(format!("Failed to read config file: {}", e)))?;

    toml::from_str(&content)
        .map_err(|e| ProxyError::Config(format!("Failed to parse config file: {}", e)))
}

fn http_url(field: &str, value: &str) -> Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| ProxyError::Config(format!("Invalid {} URL '{}': {}", field, value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ProxyError::Config(format!(
            "Invalid {} URL scheme '{}', only http(s) is allowed",
            field, scheme
        ))),
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(ProxyError::Config(format!("Invalid boolean '{}'", other))),
    }
}
