//! HTTP client for the image-generation backend.
//!
//! Uploads the original product photo as multipart form data to
//! `POST /api/upload_and_generate` and reads back a JSON envelope
//! (`{"status": "success", "image_data": ...}` on success).  The HTTP
//! status code is not trusted on its own: only a `"success"` envelope
//! with image data counts as a result.

use async_trait::async_trait;
use serde::Deserialize;

use brewpost_core::error::CoreError;
use brewpost_core::generator::{GeneratedImage, ImageGenerator, ImageRequest};

/// Path of the generation endpoint, relative to the API base URL.
pub const GENERATE_PATH: &str = "/api/upload_and_generate";

/// Multipart field carrying the photo.
pub const FIELD_FILE: &str = "file";

/// Multipart field carrying the copy text, when enabled.
pub const FIELD_PROMPT: &str = "prompt";

/// File name attached to the uploaded photo part.
pub const UPLOAD_FILE_NAME: &str = "product_image.jpg";

/// Shown when the backend gives no usable reason.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Image generation failed";

const STATUS_SUCCESS: &str = "success";

/// HTTP client for the image-generation endpoint.
pub struct GenerationApi {
    client: reqwest::Client,
    api_url: String,
    send_prompt: bool,
}

/// JSON envelope returned by the generation endpoint.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub status: String,
    /// Remote URL or `data:` URI of the generated image.
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// Some backend routes report failures under `message` instead.
    #[serde(default)]
    pub message: Option<String>,
}

/// Errors from the generation HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum GenerationApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered, but not with a success envelope.
    #[error("Generation rejected ({status}): {}", .message.as_deref().unwrap_or(DEFAULT_FAILURE_MESSAGE))]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the backend, if any.
        message: Option<String>,
    },

    /// The body was not the expected JSON envelope.
    #[error("Unexpected response ({status}): {body}")]
    InvalidBody {
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A success envelope without image data.
    #[error("Generation succeeded without image data")]
    MissingImage,
}

impl GenerationApiError {
    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(m), ..
            } if !m.trim().is_empty() => m.clone(),
            _ => DEFAULT_FAILURE_MESSAGE.to_string(),
        }
    }
}

impl From<GenerationApiError> for CoreError {
    fn from(e: GenerationApiError) -> Self {
        CoreError::Generation(e.user_message())
    }
}

impl GenerationApi {
    /// Create a client for a backend.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://127.0.0.1:5000`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (timeouts and cookies are configured there).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            send_prompt: false,
        }
    }

    /// Also send the selected copy text as the `prompt` field.
    pub fn with_prompt(mut self, send_prompt: bool) -> Self {
        self.send_prompt = send_prompt;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Upload `request.image` and return the generated image URL.
    pub async fn upload_and_generate(
        &self,
        request: &ImageRequest,
    ) -> Result<String, GenerationApiError> {
        let image = &request.image;
        let part = reqwest::multipart::Part::bytes(image.bytes.to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(&image.mime)?;
        let mut form = reqwest::multipart::Form::new().part(FIELD_FILE, part);
        if self.send_prompt {
            form = form.text(FIELD_PROMPT, request.prompt.clone());
        }

        tracing::info!(
            copy_id = %request.copy_id,
            byte_size = image.byte_size,
            send_prompt = self.send_prompt,
            "Submitting image generation request",
        );

        let response = self
            .client
            .post(format!("{}{GENERATE_PATH}", self.api_url))
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Interpret the JSON envelope regardless of HTTP status.
    async fn parse_response(response: reqwest::Response) -> Result<String, GenerationApiError> {
        let status = response.status().as_u16();
        let body = response.text().await?;

        let envelope: GenerateResponse = serde_json::from_str(&body)
            .map_err(|_| GenerationApiError::InvalidBody { status, body })?;

        if envelope.status != STATUS_SUCCESS {
            return Err(GenerationApiError::Rejected {
                status,
                message: envelope.error.or(envelope.message),
            });
        }

        envelope
            .image_data
            .filter(|d| !d.is_empty())
            .ok_or(GenerationApiError::MissingImage)
    }
}

#[async_trait]
impl ImageGenerator for GenerationApi {
    async fn generate_image(&self, request: &ImageRequest) -> Result<GeneratedImage, CoreError> {
        match self.upload_and_generate(request).await {
            Ok(url) => Ok(GeneratedImage {
                id: uuid::Uuid::new_v4().to_string(),
                url,
                source_style_name: request.style_name.clone(),
            }),
            Err(e) => {
                tracing::warn!(copy_id = %request.copy_id, error = %e, "Image generation failed");
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_with_message_surfaces_it() {
        let e = GenerationApiError::Rejected {
            status: 500,
            message: Some("Model overloaded".into()),
        };
        assert_eq!(e.user_message(), "Model overloaded");
    }

    #[test]
    fn rejected_without_message_uses_fallback() {
        let e = GenerationApiError::Rejected {
            status: 200,
            message: None,
        };
        assert_eq!(e.user_message(), DEFAULT_FAILURE_MESSAGE);

        let blank = GenerationApiError::Rejected {
            status: 200,
            message: Some("  ".into()),
        };
        assert_eq!(blank.user_message(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn invalid_body_uses_fallback() {
        let e = GenerationApiError::InvalidBody {
            status: 502,
            body: "<html>bad gateway</html>".into(),
        };
        assert_eq!(e.user_message(), DEFAULT_FAILURE_MESSAGE);
    }

    #[test]
    fn converts_to_generation_error() {
        let e: CoreError = GenerationApiError::MissingImage.into();
        assert_eq!(e, CoreError::Generation(DEFAULT_FAILURE_MESSAGE.to_string()));
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let r: GenerateResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(r.status, "error");
        assert!(r.image_data.is_none() && r.error.is_none() && r.message.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = GenerationApi::new("http://localhost:5000/".into());
        assert_eq!(api.api_url(), "http://localhost:5000");
    }
}
