//! rk-listener specific configuration
//!
//! Converts the bootstrap [`TomlConfig`] (after command-line overrides) into
//! typed, validated settings used to construct the session.

use crate::connection::BackoffConfig;
use crate::error::{Error, Result};
use rk_common::config::TomlConfig;
use std::time::Duration;
use url::Url;

/// Listener configuration
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    /// Real-time channel URL (credential is appended per attempt)
    pub ws_url: Url,
    /// Base URL of the REST control API
    pub api_base_url: Url,
    /// HTTP audio stream endpoint (cache-busting key is appended per attempt)
    pub stream_url: Url,
    pub backoff: BackoffConfig,
    /// Local volume until the first server state is seen
    pub initial_volume: f32,
    pub position_sample_interval: Duration,
    /// Output may start without a user gesture
    pub autoplay: bool,
    pub donation_preview_ttl: Duration,
    pub notice_ttl: Duration,
    pub log_level: String,
}

impl ListenerSettings {
    /// Build settings from bootstrap config
    pub fn from_toml(config: &TomlConfig) -> Result<Self> {
        let settings = Self {
            ws_url: Url::parse(&config.ws_url)?,
            api_base_url: Url::parse(&config.api_base_url)?,
            stream_url: Url::parse(&config.stream_url)?,
            backoff: BackoffConfig {
                min_delay: Duration::from_millis(config.reconnect.min_delay_ms),
                max_delay: Duration::from_millis(config.reconnect.max_delay_ms),
                growth_factor: config.reconnect.growth_factor,
                jitter_max: Duration::from_millis(config.reconnect.jitter_max_ms),
            },
            initial_volume: config.playback.initial_volume,
            position_sample_interval: Duration::from_millis(config.playback.position_sample_ms),
            autoplay: config.playback.autoplay,
            donation_preview_ttl: Duration::from_millis(config.display.donation_preview_ms),
            notice_ttl: Duration::from_millis(config.display.notice_ttl_ms),
            log_level: config.logging.level.clone(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        match self.ws_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::Config(format!(
                    "ws_url must use ws or wss, got {}",
                    other
                )))
            }
        }
        for (name, url) in [("api_base_url", &self.api_base_url), ("stream_url", &self.stream_url)] {
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "{} must use http or https, got {}",
                    name,
                    url.scheme()
                )));
            }
        }
        if self.backoff.min_delay > self.backoff.max_delay {
            return Err(Error::Config(format!(
                "reconnect min_delay {:?} exceeds max_delay {:?}",
                self.backoff.min_delay, self.backoff.max_delay
            )));
        }
        if !self.backoff.growth_factor.is_finite() || self.backoff.growth_factor < 1.0 {
            return Err(Error::Config(format!(
                "reconnect growth_factor must be >= 1.0, got {}",
                self.backoff.growth_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "initial_volume must be within 0..=1, got {}",
                self.initial_volume
            )));
        }
        if self.position_sample_interval.is_zero() {
            return Err(Error::Config("position_sample_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Copy of `base` with query parameter `key` replaced by `value`
///
/// Other parameters keep their order; `None` only removes `key`.
pub fn with_query_param(base: &Url, key: &str, value: Option<&str>) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = base.clone();
    url.set_query(None);
    if !kept.is_empty() || value.is_some() {
        let mut query = url.query_pairs_mut();
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        if let Some(value) = value {
            query.append_pair(key, value);
        }
    }
    url
}
