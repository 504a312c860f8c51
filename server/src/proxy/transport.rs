/// Settings applied to every outbound client talking to the homeserver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundSettings {
    /// Forward proxy URL used for all upstream calls.
    pub proxy: Option<String>,
    /// Skip TLS certificate verification for the homeserver connection.
    pub ssl_insecure: bool,
}

impl OutboundSettings {
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder();

        if let Some(proxy) = &self.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }

        if self.ssl_insecure {
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_client() {
        assert!(OutboundSettings::default().build_client().is_ok());
    }

    #[test]
    fn builds_client_with_proxy_and_insecure_tls() {
        let settings = OutboundSettings {
            proxy: Some("http://127.0.0.1:3128".to_string()),
            ssl_insecure: true,
        };
        assert!(settings.build_client().is_ok());
    }
}
