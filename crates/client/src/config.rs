//! Client configuration: transport endpoints, timeouts and reconnect policy.

use relieflink_shared::ConfigError;
use url::Url;

/// GraphQL HTTP endpoint for queries and mutations.
pub const HTTP_ENDPOINT_VAR: &str = "RELIEFLINK_GRAPHQL_ENDPOINT";
/// GraphQL WebSocket endpoint for subscriptions.
pub const WS_ENDPOINT_VAR: &str = "RELIEFLINK_GRAPHQL_WS_ENDPOINT";
/// Optional one-shot request timeout in milliseconds.
pub const TIMEOUT_VAR: &str = "RELIEFLINK_REQUEST_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Configuration for auto-reconnect behavior
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Maximum number of reconnect attempts (0 = infinite)
    pub max_attempts: u32,
    /// Initial delay in milliseconds
    pub initial_delay_ms: u32,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u32,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 1.5,
        }
    }
}

impl ReconnectConfig {
    /// Calculate delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> u32 {
        let delay = self.initial_delay_ms as f32 * self.backoff_multiplier.powi(attempt as i32);
        (delay as u32).min(self.max_delay_ms)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub http_endpoint: Url,
    pub ws_endpoint: Url,
    pub request_timeout_ms: u64,
    pub reconnect: ReconnectConfig,
}

impl ClientConfig {
    /// Build from explicit endpoint strings.
    pub fn new(http_endpoint: &str, ws_endpoint: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            http_endpoint: parse_endpoint(HTTP_ENDPOINT_VAR, http_endpoint, &["http", "https"])?,
            ws_endpoint: parse_endpoint(WS_ENDPOINT_VAR, ws_endpoint, &["ws", "wss"])?,
            request_timeout_ms: DEFAULT_TIMEOUT_MS,
            reconnect: ReconnectConfig::default(),
        })
    }

    /// Read configuration from the environment.
    ///
    /// Environment variables:
    /// - `RELIEFLINK_GRAPHQL_ENDPOINT`: http(s) URL (required)
    /// - `RELIEFLINK_GRAPHQL_WS_ENDPOINT`: ws(s) URL (required)
    /// - `RELIEFLINK_REQUEST_TIMEOUT_MS`: one-shot timeout (default: 30000)
    ///
    /// In the browser the values are baked in at build time.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let http = lookup(HTTP_ENDPOINT_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(HTTP_ENDPOINT_VAR))?;
        let ws = lookup(WS_ENDPOINT_VAR)
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing(WS_ENDPOINT_VAR))?;

        let mut config = Self::new(&http, &ws)?;
        if let Some(raw) = lookup(TIMEOUT_VAR).filter(|v| !v.trim().is_empty()) {
            config.request_timeout_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                name: TIMEOUT_VAR,
                found: raw.clone(),
            })?;
        }
        Ok(config)
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

fn parse_endpoint(
    name: &'static str,
    raw: &str,
    expected: &'static [&'static str],
) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    if !expected.contains(&url.scheme()) {
        return Err(ConfigError::UnsupportedScheme {
            name,
            expected,
            found: url.scheme().to_string(),
        });
    }
    Ok(url)
}

#[cfg(not(target_arch = "wasm32"))]
fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[cfg(target_arch = "wasm32")]
fn env_lookup(name: &str) -> Option<String> {
    let value = match name {
        HTTP_ENDPOINT_VAR => option_env!("RELIEFLINK_GRAPHQL_ENDPOINT"),
        WS_ENDPOINT_VAR => option_env!("RELIEFLINK_GRAPHQL_WS_ENDPOINT"),
        TIMEOUT_VAR => option_env!("RELIEFLINK_REQUEST_TIMEOUT_MS"),
        _ => None,
    };
    value.map(str::to_string)
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn reads_both_endpoints() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            (HTTP_ENDPOINT_VAR, "https://api.example.org/v1/graphql"),
            (WS_ENDPOINT_VAR, "wss://api.example.org/v1/graphql"),
            (TIMEOUT_VAR, "5000"),
        ]))
        .unwrap();
        assert_eq!(config.http_endpoint.as_str(), "https://api.example.org/v1/graphql");
        assert_eq!(config.ws_endpoint.scheme(), "wss");
        assert_eq!(config.request_timeout_ms, 5000);
    }

    #[test]
    fn missing_endpoint_is_a_config_error() {
        let err = ClientConfig::from_lookup(lookup_from(&[(
            HTTP_ENDPOINT_VAR,
            "https://api.example.org/v1/graphql",
        )]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing(WS_ENDPOINT_VAR));
    }

    #[test]
    fn unparsable_timeout_is_a_config_error() {
        let endpoints = [
            (HTTP_ENDPOINT_VAR, "https://api.example.org/v1/graphql"),
            (WS_ENDPOINT_VAR, "wss://api.example.org/v1/graphql"),
        ];
        let err = ClientConfig::from_lookup(lookup_from(&[endpoints[0], endpoints[1], (TIMEOUT_VAR, "5s")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                name: TIMEOUT_VAR,
                found: "5s".into(),
            }
        );

        let config = ClientConfig::from_lookup(lookup_from(&endpoints)).unwrap();
        assert_eq!(config.request_timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = ClientConfig::new("ws://api.example.org", "ws://api.example.org").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { name: HTTP_ENDPOINT_VAR, .. }));

        let err = ClientConfig::new("http://api.example.org", "not a url").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { name: WS_ENDPOINT_VAR, .. }));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let config = ReconnectConfig::default();
        assert_eq!(config.delay_for_attempt(0), 1000);
        assert_eq!(config.delay_for_attempt(1), 1500);
        assert_eq!(config.delay_for_attempt(20), 30000);
        assert!(config.allows(1_000));

        let bounded = ReconnectConfig {
            max_attempts: 3,
            ..ReconnectConfig::default()
        };
        assert!(bounded.allows(2));
        assert!(!bounded.allows(3));
    }
}
