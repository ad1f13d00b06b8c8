use anyhow::{bail, Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://llama-model-server:8000";
pub const DEFAULT_MODEL: &str = "llama-3.2-3b";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const MAX_RETRIES_LIMIT: u32 = 5;

/// Process-wide settings, read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Base URL of the inference backend, without a trailing slash.
    pub backend_url: String,
    pub model: String,
    pub temperature: f64,
    /// Upper bound on a single backend attempt.
    pub request_timeout: Duration,
    /// Extra attempts after a connection failure. Zero disables retry.
    pub max_retries: u32,
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 0,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl GatewayConfig {
    /// Reads the configuration from the process environment (after `.env` has been loaded).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let backend_url = lookup("LLM_BACKEND_URL").unwrap_or(defaults.backend_url);
        let model = lookup("LLM_MODEL").unwrap_or(defaults.model);
        let temperature = parse_var(&lookup, "LLM_TEMPERATURE", defaults.temperature)?;
        let timeout_secs = parse_var(&lookup, "LLM_REQUEST_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let max_retries = parse_var(&lookup, "LLM_MAX_RETRIES", defaults.max_retries)?;
        let host = lookup("GATEWAY_HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "GATEWAY_PORT", defaults.port)?;

        let config = Self {
            backend_url: backend_url.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            temperature,
            request_timeout: Duration::from_secs(timeout_secs),
            max_retries,
            host: host.trim().to_string(),
            port,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            bail!(
                "LLM_BACKEND_URL must start with http:// or https://, got '{}'",
                self.backend_url
            );
        }
        if self.model.is_empty() {
            bail!("LLM_MODEL must not be empty");
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            bail!(
                "LLM_TEMPERATURE must be between 0 and 2, got {}",
                self.temperature
            );
        }
        if self.request_timeout.is_zero() {
            bail!("LLM_REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_retries > MAX_RETRIES_LIMIT {
            bail!(
                "LLM_MAX_RETRIES must be at most {}, got {}",
                MAX_RETRIES_LIMIT,
                self.max_retries
            );
        }
        Ok(())
    }

    /// Full URL of the backend's chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }

    /// Resolves `host:port` to the address to bind. Hostnames such as `localhost` are looked up.
    pub async fn listen_addr(&self) -> Result<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("cannot resolve listen host '{}'", self.host))?
            .next()
            .with_context(|| format!("listen host '{}' resolved to no addresses", self.host))
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[tokio::test]
    async fn defaults_match_reference_deployment() {
        let config = GatewayConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, GatewayConfig::default());
        assert_eq!(
            config.completions_url(),
            "http://llama-model-server:8000/v1/chat/completions"
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.listen_addr().await.unwrap().port(), 8080);
    }

    #[tokio::test]
    async fn overrides_are_applied() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("LLM_BACKEND_URL", "http://localhost:9000/"),
            ("LLM_MODEL", "tiny"),
            ("LLM_TEMPERATURE", "0.2"),
            ("LLM_REQUEST_TIMEOUT_SECS", "5"),
            ("LLM_MAX_RETRIES", "2"),
            ("GATEWAY_HOST", "127.0.0.1"),
            ("GATEWAY_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url, "http://localhost:9000");
        assert_eq!(config.completions_url(), "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.model, "tiny");
        assert_eq!(config.temperature, 0.2);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.max_retries, 2);
        assert_eq!(
            config.listen_addr().await.unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn rejects_invalid_values() {
        let cases: &[(&str, &str)] = &[
            ("LLM_BACKEND_URL", "llama-model-server:8000"),
            ("LLM_MODEL", "  "),
            ("LLM_TEMPERATURE", "3.5"),
            ("LLM_TEMPERATURE", "NaN"),
            ("LLM_REQUEST_TIMEOUT_SECS", "0"),
            ("LLM_REQUEST_TIMEOUT_SECS", "soon"),
            ("GATEWAY_PORT", "70000"),
            ("LLM_MAX_RETRIES", "-1"),
            ("LLM_MAX_RETRIES", "6"),
        ];
        for &(key, value) in cases {
            let result = GatewayConfig::from_lookup(lookup_from(&[(key, value)]));
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn max_retries_limit_is_inclusive() {
        let config = GatewayConfig::from_lookup(lookup_from(&[("LLM_MAX_RETRIES", "5")])).unwrap();
        assert_eq!(config.max_retries, MAX_RETRIES_LIMIT);
    }

    #[tokio::test]
    async fn listen_host_accepts_hostnames() {
        let config = GatewayConfig::from_lookup(lookup_from(&[
            ("GATEWAY_HOST", "localhost"),
            ("GATEWAY_PORT", "9090"),
        ]))
        .unwrap();
        let addr = config.listen_addr().await.unwrap();
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 9090);
    }

    #[tokio::test]
    async fn bad_host_fails_at_listen_addr() {
        let config = GatewayConfig::from_lookup(lookup_from(&[("GATEWAY_HOST", "not a host")])).unwrap();
        assert!(config.listen_addr().await.is_err());
    }
}
