use std::str::FromStr;
use std::time::Duration;

use brewpost_client::weather::WeatherApi;
use brewpost_core::progress::ProgressConfig;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Studio configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    /// Base URL of the image-generation backend.
    pub generation_api_url: String,
    pub generation_timeout: Duration,
    /// Also send the selected copy text with the photo.
    pub send_prompt: bool,
    /// Render variants locally instead of calling the backend.
    pub use_local_renderer: bool,
    pub copy_expected: Duration,
    pub image_expected: Duration,
    pub progress_tick: Duration,
    /// Simulated latency of the template copywriter.
    pub copy_latency: Duration,
    pub copy_reveal_delay: Duration,
    pub image_settle_delay: Duration,
    pub notice_dismiss: Duration,
    /// Weather endpoint; the lookup is skipped when unset.
    pub weather_api_url: Option<String>,
    /// Session token sent as the `access_token` cookie on weather lookups.
    pub weather_access_token: Option<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            generation_api_url: "http://127.0.0.1:5000".to_string(),
            generation_timeout: Duration::from_secs(120),
            send_prompt: false,
            use_local_renderer: false,
            copy_expected: Duration::from_millis(60_000),
            image_expected: Duration::from_millis(60_000),
            progress_tick: Duration::from_millis(50),
            copy_latency: Duration::from_millis(1500),
            copy_reveal_delay: Duration::from_millis(1000),
            image_settle_delay: Duration::from_millis(1200),
            notice_dismiss: Duration::from_millis(3000),
            weather_api_url: None,
            weather_access_token: None,
        }
    }
}

impl StudioConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `GENERATION_API_URL`      | `http://127.0.0.1:5000` |
    /// | `GENERATION_TIMEOUT_SECS` | `120`                   |
    /// | `GENERATION_SEND_PROMPT`  | `false`                 |
    /// | `USE_LOCAL_RENDERER`      | `false`                 |
    /// | `COPY_EXPECTED_MS`        | `60000`                 |
    /// | `IMAGE_EXPECTED_MS`       | `60000`                 |
    /// | `PROGRESS_TICK_MS`        | `50`                    |
    /// | `COPY_LATENCY_MS`         | `1500`                  |
    /// | `COPY_REVEAL_DELAY_MS`    | `1000`                  |
    /// | `IMAGE_SETTLE_DELAY_MS`   | `1200`                  |
    /// | `NOTICE_DISMISS_MS`       | `3000`                  |
    /// | `WEATHER_API_URL`         | unset                   |
    /// | `WEATHER_ACCESS_TOKEN`    | unset                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let millis = |name: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            match var(name) {
                Some(v) => parse::<u64>(name, v, "a non-negative integer").map(Duration::from_millis),
                None => Ok(default),
            }
        };
        let flag = |name: &'static str, default: bool| -> Result<bool, ConfigError> {
            match var(name) {
                Some(v) => parse_bool(name, v),
                None => Ok(default),
            }
        };

        let generation_timeout = match var("GENERATION_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(parse::<u64>(
                "GENERATION_TIMEOUT_SECS",
                v,
                "a non-negative integer",
            )?),
            None => defaults.generation_timeout,
        };

        let progress_tick = millis("PROGRESS_TICK_MS", defaults.progress_tick)?;
        if progress_tick.is_zero() {
            return Err(ConfigError::Invalid {
                var: "PROGRESS_TICK_MS",
                value: "0".to_string(),
                expected: "greater than zero",
            });
        }

        Ok(Self {
            generation_api_url: var("GENERATION_API_URL").unwrap_or(defaults.generation_api_url),
            generation_timeout,
            send_prompt: flag("GENERATION_SEND_PROMPT", defaults.send_prompt)?,
            use_local_renderer: flag("USE_LOCAL_RENDERER", defaults.use_local_renderer)?,
            copy_expected: millis("COPY_EXPECTED_MS", defaults.copy_expected)?,
            image_expected: millis("IMAGE_EXPECTED_MS", defaults.image_expected)?,
            progress_tick,
            copy_latency: millis("COPY_LATENCY_MS", defaults.copy_latency)?,
            copy_reveal_delay: millis("COPY_REVEAL_DELAY_MS", defaults.copy_reveal_delay)?,
            image_settle_delay: millis("IMAGE_SETTLE_DELAY_MS", defaults.image_settle_delay)?,
            notice_dismiss: millis("NOTICE_DISMISS_MS", defaults.notice_dismiss)?,
            weather_api_url: var("WEATHER_API_URL"),
            weather_access_token: var("WEATHER_ACCESS_TOKEN"),
        })
    }

    pub fn copy_progress(&self) -> ProgressConfig {
        ProgressConfig {
            tick: self.progress_tick,
            ..ProgressConfig::with_expected(self.copy_expected)
        }
    }

    pub fn image_progress(&self) -> ProgressConfig {
        ProgressConfig {
            tick: self.progress_tick,
            ..ProgressConfig::with_expected(self.image_expected)
        }
    }

    /// Weather client carrying the session cookie, if a URL is configured.
    pub fn weather_api(&self) -> Option<WeatherApi> {
        let url = self.weather_api_url.clone()?;
        let api = WeatherApi::new(url);
        Some(match &self.weather_access_token {
            Some(token) => api.with_access_token(token.clone()),
            None => api,
        })
    }
}

fn parse<T: FromStr>(var: &'static str, value: String, expected: &'static str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { var, value, expected })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            expected: "a boolean",
        }),
    }
}
