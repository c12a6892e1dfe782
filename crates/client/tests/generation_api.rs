//! Integration tests for the generation HTTP client against an in-process
//! backend.
//!
//! The backend records every multipart field it receives and answers
//! with a canned status and body.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use image::{ImageFormat, Rgba, RgbaImage};

use brewpost_client::generation::{
    GenerationApi, GenerationApiError, DEFAULT_FAILURE_MESSAGE, FIELD_FILE, FIELD_PROMPT,
    GENERATE_PATH, UPLOAD_FILE_NAME,
};
use brewpost_core::error::CoreError;
use brewpost_core::generator::{ImageGenerator, ImageRequest};
use brewpost_core::upload::inspect_upload;

// ---------------------------------------------------------------------------
// Test backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ReceivedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone)]
struct Backend {
    status: StatusCode,
    body: &'static str,
    seen: Arc<Mutex<Vec<ReceivedField>>>,
}

async fn generate(State(backend): State<Backend>, mut multipart: Multipart) -> impl IntoResponse {
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        backend.seen.lock().unwrap().push(ReceivedField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    (
        backend.status,
        [(header::CONTENT_TYPE, "application/json")],
        backend.body,
    )
}

/// Start a backend answering `status`/`body`; returns its base URL and
/// the log of received fields.
async fn spawn_backend(
    status: StatusCode,
    body: &'static str,
) -> (String, Arc<Mutex<Vec<ReceivedField>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(GENERATE_PATH, post(generate))
        .with_state(Backend {
            status,
            body,
            seen: Arc::clone(&seen),
        });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

fn sample_request() -> ImageRequest {
    let mut png = Cursor::new(Vec::new());
    RgbaImage::from_pixel(8, 8, Rgba([200, 120, 80, 255]))
        .write_to(&mut png, ImageFormat::Png)
        .unwrap();
    let image = inspect_upload("latte.png", "image/png", png.into_inner()).unwrap();

    ImageRequest {
        image,
        copy_id: "literary".to_string(),
        style_name: "Literary".to_string(),
        prompt: "A winter afternoon, a cup of latte.".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Test: success envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn success_returns_image_data_and_uploads_original_bytes() {
    let (url, seen) = spawn_backend(
        StatusCode::OK,
        r#"{"status":"success","image_data":"https://cdn.example/out.png"}"#,
    )
    .await;
    let request = sample_request();

    let image_url = GenerationApi::new(url)
        .upload_and_generate(&request)
        .await
        .unwrap();

    assert_eq!(image_url, "https://cdn.example/out.png");

    let fields = seen.lock().unwrap().clone();
    assert_eq!(fields.len(), 1, "only the photo is sent by default");
    let file = &fields[0];
    assert_eq!(file.name, FIELD_FILE);
    assert_eq!(file.file_name.as_deref(), Some(UPLOAD_FILE_NAME));
    assert_eq!(file.content_type.as_deref(), Some("image/png"));
    assert_eq!(file.data, *request.image.bytes);
}

#[tokio::test]
async fn prompt_is_sent_when_enabled() {
    let (url, seen) = spawn_backend(
        StatusCode::OK,
        r#"{"status":"success","image_data":"data:image/png;base64,AAAA"}"#,
    )
    .await;
    let request = sample_request();

    GenerationApi::new(url)
        .with_prompt(true)
        .upload_and_generate(&request)
        .await
        .unwrap();

    let fields = seen.lock().unwrap().clone();
    let prompt = fields
        .iter()
        .find(|f| f.name == FIELD_PROMPT)
        .expect("prompt field should be present");
    assert_eq!(prompt.data, request.prompt.as_bytes());
}

#[tokio::test]
async fn trait_impl_wraps_result_with_style_name() {
    let (url, _seen) = spawn_backend(
        StatusCode::OK,
        r#"{"status":"success","image_data":"https://cdn.example/out.png"}"#,
    )
    .await;

    let generated = GenerationApi::new(url)
        .generate_image(&sample_request())
        .await
        .unwrap();

    assert_eq!(generated.url, "https://cdn.example/out.png");
    assert_eq!(generated.source_style_name, "Literary");
    assert!(!generated.id.is_empty());
}

// ---------------------------------------------------------------------------
// Test: failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_error_message_is_surfaced() {
    let (url, _seen) = spawn_backend(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"status":"error","error":"GPU busy, try again"}"#,
    )
    .await;
    let api = GenerationApi::new(url);

    let err = api.upload_and_generate(&sample_request()).await.unwrap_err();
    assert_matches!(
        &err,
        GenerationApiError::Rejected { status: 500, message: Some(m) } if m == "GPU busy, try again"
    );

    let err = api.generate_image(&sample_request()).await.unwrap_err();
    assert_eq!(err, CoreError::Generation("GPU busy, try again".to_string()));
}

#[tokio::test]
async fn error_status_in_ok_response_is_a_failure() {
    let (url, _seen) = spawn_backend(StatusCode::OK, r#"{"status":"error"}"#).await;

    let err = GenerationApi::new(url)
        .upload_and_generate(&sample_request())
        .await
        .unwrap_err();

    assert_matches!(err, GenerationApiError::Rejected { status: 200, message: None });
    assert_eq!(err.user_message(), DEFAULT_FAILURE_MESSAGE);
}

#[tokio::test]
async fn non_json_body_is_invalid() {
    let (url, _seen) = spawn_backend(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").await;

    let err = GenerationApi::new(url)
        .upload_and_generate(&sample_request())
        .await
        .unwrap_err();

    assert_matches!(err, GenerationApiError::InvalidBody { status: 502, .. });
}

#[tokio::test]
async fn success_without_image_data_is_missing_image() {
    let (url, _seen) = spawn_backend(StatusCode::OK, r#"{"status":"success"}"#).await;

    let err = GenerationApi::new(url)
        .upload_and_generate(&sample_request())
        .await
        .unwrap_err();

    assert_matches!(err, GenerationApiError::MissingImage);
}

#[tokio::test]
async fn unreachable_backend_maps_to_default_message() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = GenerationApi::new(format!("http://{addr}"))
        .generate_image(&sample_request())
        .await
        .unwrap_err();

    assert_eq!(err, CoreError::Generation(DEFAULT_FAILURE_MESSAGE.to_string()));
}
