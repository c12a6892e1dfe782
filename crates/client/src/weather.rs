//! Weather forecast lookup for the dashboard card.
//!
//! Independent of the content workflow.  The backend identifies the
//! store from the session cookie, so requests carry the stored
//! credentials.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One day of the forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub max_temp: i32,
    pub condition: String,
    /// Chance of rain in percent.
    pub rain_prob: i32,
}

/// Forecast for the store's city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub status: String,
    pub city: String,
    #[serde(default)]
    pub data: Vec<DailyForecast>,
}

impl WeatherReport {
    /// The warmest upcoming day, if any.
    pub fn warmest(&self) -> Option<&DailyForecast> {
        self.data.iter().max_by_key(|d| d.max_temp)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WeatherApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Weather API error ({status}): {body}")]
    ApiError { status: u16, body: String },

    /// The envelope parsed but its status was not `"success"`.
    #[error("Weather lookup rejected: {0}")]
    Rejected(String),
}

/// HTTP client for the weather endpoint.
pub struct WeatherApi {
    client: reqwest::Client,
    url: String,
    access_token: Option<String>,
}

impl WeatherApi {
    /// * `url` - Full endpoint URL, e.g. `http://host:5000/api/weather`.
    pub fn new(url: String) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Reuse an existing client (e.g. one with a cookie store).
    pub fn with_client(client: reqwest::Client, url: String) -> Self {
        Self {
            client,
            url,
            access_token: None,
        }
    }

    /// Send `access_token` as the session cookie.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub async fn forecast(&self) -> Result<WeatherReport, WeatherApiError> {
        let mut request = self.client.get(&self.url);
        if let Some(token) = &self.access_token {
            request = request.header(reqwest::header::COOKIE, format!("access_token={token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(WeatherApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let report: WeatherReport = response.json().await?;
        if report.status != "success" {
            return Err(WeatherApiError::Rejected(report.status));
        }

        tracing::debug!(city = %report.city, days = report.data.len(), "Weather forecast loaded");
        Ok(report)
    }
}
