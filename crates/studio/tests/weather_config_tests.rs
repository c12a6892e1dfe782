//! The driver's weather client, built from environment configuration,
//! against an endpoint that only answers logged-in sessions.

use std::collections::HashMap;

use assert_matches::assert_matches;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use brewpost_client::weather::WeatherApiError;
use brewpost_studio::config::StudioConfig;

const TOKEN: &str = "shop-7";

async fn weather(headers: HeaderMap) -> impl IntoResponse {
    let authorised = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|c| c.contains(&format!("access_token={TOKEN}")));

    if authorised {
        (
            StatusCode::OK,
            r#"{"status":"success","city":"Tainan","data":[{"date":"2026-10-18","max_temp":31,"condition":"Sunny","rain_prob":0}]}"#,
        )
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"status":"error"}"#)
    }
}

async fn spawn_endpoint() -> String {
    let app = Router::new().route("/api/weather", get(weather));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api/weather")
}

fn config(pairs: &[(&str, &str)]) -> StudioConfig {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    StudioConfig::from_lookup(|k| env.get(k).cloned()).unwrap()
}

#[tokio::test]
async fn configured_token_is_sent_as_session_cookie() {
    let url = spawn_endpoint().await;
    let config = config(&[("WEATHER_API_URL", &url), ("WEATHER_ACCESS_TOKEN", TOKEN)]);

    let report = config.weather_api().unwrap().forecast().await.unwrap();

    assert_eq!(report.city, "Tainan");
    assert_eq!(report.warmest().unwrap().max_temp, 31);
}

#[tokio::test]
async fn lookup_without_token_is_refused() {
    let url = spawn_endpoint().await;
    let config = config(&[("WEATHER_API_URL", &url)]);

    let err = config.weather_api().unwrap().forecast().await.unwrap_err();

    assert_matches!(err, WeatherApiError::ApiError { status: 401, .. });
}
