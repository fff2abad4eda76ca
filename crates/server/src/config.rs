use std::{env, str::FromStr, time::Duration};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (default: "redis://localhost:6379").
    /// A comma separated list of seed nodes selects cluster mode when the
    /// `redis-cluster` feature is enabled.
    /// Note: Only used when the `redis` feature is enabled.
    #[cfg_attr(not(feature = "redis"), allow(dead_code))]
    pub redis_url: String,
    /// Global key prefix shared by every namespace (default: "reqscope")
    pub redis_prefix: String,
    /// Session TTL in seconds, slid on every request (default: 86,400)
    pub session_ttl_seconds: u64,
    /// Captcha challenge TTL in seconds (default: 300)
    pub captcha_ttl_seconds: u64,
    /// Session cookie name (default: "sid")
    pub cookie_name: String,
    /// Mark the session cookie `Secure` (default: false)
    pub cookie_secure: bool,
    /// Maximum keys held by the in-memory store (default: 10,000)
    #[cfg_attr(not(feature = "memory"), allow(dead_code))]
    pub store_max_entries: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `REDIS_URL` - Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_PREFIX` - Global key prefix (default: "reqscope")
    /// - `SESSION_TTL_SECONDS` - Session TTL in seconds (default: 86,400)
    /// - `CAPTCHA_TTL_SECONDS` - Captcha TTL in seconds (default: 300)
    /// - `COOKIE_NAME` - Session cookie name (default: "sid")
    /// - `COOKIE_SECURE` - "true" or "1" to set the Secure flag (default: false)
    /// - `STORE_MAX_ENTRIES` - In-memory store capacity (default: 10,000)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            redis_prefix: lookup("REDIS_PREFIX")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "reqscope".to_string()),
            session_ttl_seconds: parse_var(&lookup, "SESSION_TTL_SECONDS").unwrap_or(86_400),
            captcha_ttl_seconds: parse_var(&lookup, "CAPTCHA_TTL_SECONDS").unwrap_or(300),
            cookie_name: lookup("COOKIE_NAME")
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "sid".to_string()),
            cookie_secure: lookup("COOKIE_SECURE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                .unwrap_or(false),
            store_max_entries: parse_var(&lookup, "STORE_MAX_ENTRIES").unwrap_or(10_000),
        }
    }

    /// Get session TTL as a Duration.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// Get captcha TTL as a Duration.
    pub fn captcha_ttl(&self) -> Duration {
        Duration::from_secs(self.captcha_ttl_seconds)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);

        assert_eq!(config.redis_url, "redis://localhost:6379");
        assert_eq!(config.redis_prefix, "reqscope");
        assert_eq!(config.session_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.captcha_ttl(), Duration::from_secs(300));
        assert_eq!(config.cookie_name, "sid");
        assert!(!config.cookie_secure);
        assert_eq!(config.store_max_entries, 10_000);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("REDIS_URL", "redis://cache:6380"),
            ("REDIS_PREFIX", "svc"),
            ("SESSION_TTL_SECONDS", "600"),
            ("CAPTCHA_TTL_SECONDS", " 60 "),
            ("COOKIE_NAME", "session"),
            ("COOKIE_SECURE", "TRUE"),
            ("STORE_MAX_ENTRIES", "50"),
        ]);

        assert_eq!(config.redis_url, "redis://cache:6380");
        assert_eq!(config.redis_prefix, "svc");
        assert_eq!(config.session_ttl(), Duration::from_secs(600));
        assert_eq!(config.captcha_ttl(), Duration::from_secs(60));
        assert_eq!(config.cookie_name, "session");
        assert!(config.cookie_secure);
        assert_eq!(config.store_max_entries, 50);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[("SESSION_TTL_SECONDS", "soon"), ("COOKIE_NAME", "")]);

        assert_eq!(config.session_ttl_seconds, 86_400);
        assert_eq!(config.cookie_name, "sid");
    }
}
