// src/config.rs
//! Process configuration, read once at startup from the environment.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Settings for the job poller
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
    pub lipsync_max_attempts: u32,
    pub max_consecutive_errors: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub public_base_url: String,
    pub media_dir: String,
    pub jwt_secret: String,

    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub elevenlabs_api_key: Option<String>,
    pub fal_key: Option<String>,
    pub a2e_api_key: Option<String>,
    pub steve_ai_api_key: Option<String>,
    pub steve_ai_base_url: String,
    pub replicate_api_token: Option<String>,
    pub pexels_api_key: Option<String>,
    pub getty_api_key: Option<String>,
    pub apify_token: Option<String>,
    pub apify_listening_actor: String,

    pub google_oauth_client_id: Option<String>,
    pub google_oauth_client_secret: Option<String>,
    pub google_oauth_redirect_uri: String,

    pub poll: PollSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None => {
                tracing::warn!("JWT_SECRET not set, falling back to an insecure default");
                "default_secret".to_string()
            }
        };

        let poll = PollSettings {
            interval: Duration::from_secs(parse_positive(&get, "POLL_INTERVAL_SECS", 5)?),
            max_attempts: parse_positive(&get, "POLL_MAX_ATTEMPTS", 120)?,
            lipsync_max_attempts: parse_positive(&get, "LIPSYNC_MAX_ATTEMPTS", 60)?,
            max_consecutive_errors: parse_number(&get, "POLL_MAX_CONSECUTIVE_ERRORS", 5)?,
        };

        Ok(Self {
            database_url,
            bind_addr: or("BIND_ADDR", "0.0.0.0:3000"),
            public_base_url: or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            media_dir: or("MEDIA_DIR", "media"),
            jwt_secret,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: or("OPENAI_MODEL", "gpt-4o-mini"),
            elevenlabs_api_key: get("ELEVEN_LABS_API_KEY"),
            fal_key: get("FAL_KEY"),
            a2e_api_key: get("A2E_API_KEY"),
            steve_ai_api_key: get("STEVE_AI_API_KEY"),
            steve_ai_base_url: or("STEVE_AI_BASE_URL", "https://api.steve.ai/v1"),
            replicate_api_token: get("REPLICATE_API_TOKEN"),
            pexels_api_key: get("PEXELS_API_KEY"),
            getty_api_key: get("GETTY_API_KEY"),
            apify_token: get("APIFY_TOKEN"),
            apify_listening_actor: or("APIFY_LISTENING_ACTOR", "apify~social-media-scraper"),
            google_oauth_client_id: get("GOOGLE_OAUTH_CLIENT_ID"),
            google_oauth_client_secret: get("GOOGLE_OAUTH_CLIENT_SECRET"),
            google_oauth_redirect_uri: or(
                "GOOGLE_OAUTH_REDIRECT_URI",
                "http://localhost:3000/youtube/callback",
            ),
            poll,
        })
    }

    /// Absolute URL for a file stored under the media directory
    pub fn media_url(&self, file_name: &str) -> String {
        format!("{}/media/{}", self.public_base_url, file_name)
    }
}

fn parse_number<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}

/// Like [`parse_number`] but zero is rejected
fn parse_positive<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default + std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let value = parse_number(get, name, default)?;
    if value == T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/studio")])).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.poll.interval, Duration::from_secs(5));
        assert_eq!(config.poll.max_attempts, 120);
        assert_eq!(config.poll.lipsync_max_attempts, 60);
        assert_eq!(config.openai_model, "gpt-4o-mini");
        assert!(config.fal_key.is_none());
    }

    #[test]
    fn test_missing_database_url() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("FAL_KEY", "   "),
            ("OPENAI_API_KEY", "sk-test"),
        ]))
        .unwrap();
        assert!(config.fal_key.is_none());
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("POLL_INTERVAL_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "POLL_INTERVAL_SECS", .. }));
    }

    #[test]
    fn test_zero_poll_settings_rejected() {
        for name in ["POLL_INTERVAL_SECS", "POLL_MAX_ATTEMPTS", "LIPSYNC_MAX_ATTEMPTS"] {
            let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/studio"), (name, "0")]))
                .unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { name: n, ref value } if n == name && value == "0"),
                "{}",
                name
            );
        }

        // Zero tolerated errors just means fail on the first one
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("POLL_MAX_CONSECUTIVE_ERRORS", "0"),
        ]))
        .unwrap();
        assert_eq!(config.poll.max_consecutive_errors, 0);
    }

    #[test]
    fn test_media_url_strips_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/studio"),
            ("PUBLIC_BASE_URL", "https://studio.example.com/"),
        ]))
        .unwrap();
        assert_eq!(config.media_url("a.mp3"), "https://studio.example.com/media/a.mp3");
    }
}
