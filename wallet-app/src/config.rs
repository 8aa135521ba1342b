//! Configuration loading from environment.

use std::env;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_FAKE_PAYMENT_PROVIDER_URL: &str = "http://localhost:4000";

/// Application configuration.
#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared secret PSP callbacks must present in `X-PSP-API-Key`.
    pub psp_api_key: String,
    /// Public base URL of this service, used to build PSP callback URLs.
    pub callback_base_url: String,
    pub fake_payment_provider_url: String,
    /// OTLP collector; telemetry export is off when unset.
    pub otel_endpoint: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid PORT {:?}: {}", raw, e))?,
            None => DEFAULT_PORT,
        };

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let psp_api_key = lookup("PSP_API_KEY")
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("PSP_API_KEY environment variable is required"))?;

        let callback_base_url =
            lookup("CALLBACK_BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port));

        let fake_payment_provider_url = lookup("FAKE_PAYMENT_PROVIDER_URL")
            .unwrap_or_else(|| DEFAULT_FAKE_PAYMENT_PROVIDER_URL.to_string());

        let otel_endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|e| !e.is_empty());

        Ok(Self {
            port,
            database_url,
            psp_api_key,
            callback_base_url,
            fake_payment_provider_url,
            otel_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("PSP_API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.callback_base_url, "http://localhost:3000");
        assert_eq!(config.fake_payment_provider_url, "http://localhost:4000");
        assert!(config.otel_endpoint.is_none());
    }

    #[test]
    fn test_callback_base_follows_port() {
        let config = load(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("PSP_API_KEY", "secret"),
        ])
        .unwrap();

        assert_eq!(config.callback_base_url, "http://localhost:8080");
    }

    #[test]
    fn test_required_variables() {
        assert!(load(&[("PSP_API_KEY", "secret")]).is_err());
        assert!(load(&[("DATABASE_URL", "sqlite::memory:")]).is_err());
        assert!(load(&[("DATABASE_URL", "sqlite::memory:"), ("PSP_API_KEY", "")]).is_err());
    }

    #[test]
    fn test_invalid_port() {
        let result = load(&[
            ("PORT", "http"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("PSP_API_KEY", "secret"),
        ]);

        assert!(result.is_err());
    }
}
