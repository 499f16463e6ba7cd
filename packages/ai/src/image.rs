//! Image generation (Imagen `predict`).

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::AiError;

/// Model used when `IMAGE_MODEL` is unset.
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";

/// Attempts made by [`generate_with_retry`].
pub const IMAGE_ATTEMPTS: u32 = 2;

/// A generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    /// MIME type reported by the model.
    pub mime_type: String,
}

/// Trait for image generators.
#[async_trait::async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image.
    ///
    /// `aspect_ratio` is one of `1:1`, `4:3`, `3:4`, `16:9`, `9:16`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError`] if the request fails or no image is returned.
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, AiError>;
}

/// Calls `generator` up to [`IMAGE_ATTEMPTS`] times, returning the first
/// success.
///
/// # Errors
///
/// Returns the last error if every attempt fails.
pub async fn generate_with_retry(
    generator: &dyn ImageGenerator,
    prompt: &str,
    aspect_ratio: &str,
) -> Result<GeneratedImage, AiError> {
    let mut last_error = None;
    for attempt in 1..=IMAGE_ATTEMPTS {
        match generator.generate_image(prompt, aspect_ratio).await {
            Ok(image) => return Ok(image),
            Err(e) => {
                log::warn!("Image generation attempt {attempt}/{IMAGE_ATTEMPTS} failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| AiError::Provider {
        message: "image generation was not attempted".to_string(),
    }))
}

/// Imagen via the Generative Language API.
pub struct ImagenGenerator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl ImagenGenerator {
    /// Creates a new generator.
    #[must_use]
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            base_url: crate::providers::gemini::DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the generator at a different API host.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

/// Creates an image generator from `GOOGLE_API_KEY`/`GEMINI_API_KEY`,
/// `IMAGE_MODEL`, and `GEMINI_BASE_URL`.
///
/// # Errors
///
/// Returns [`AiError::Config`] if no API key is set.
pub fn create_image_generator_from_env() -> Result<Box<dyn ImageGenerator>, AiError> {
    let api_key = crate::providers::google_api_key()?;
    let model = std::env::var("IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string());
    let mut generator = ImagenGenerator::new(api_key, model);
    if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
        generator = generator.with_base_url(base_url);
    }
    Ok(Box::new(generator))
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters<'a>,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    prompt: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters<'a> {
    sample_count: u32,
    aspect_ratio: &'a str,
    person_generation: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
    mime_type: Option<String>,
}

/// Decodes the first image of a `predict` response.
fn decode_prediction(response: PredictResponse) -> Result<GeneratedImage, AiError> {
    let prediction = response
        .predictions
        .into_iter()
        .find(|p| p.bytes_base64_encoded.is_some())
        .ok_or_else(|| AiError::Provider {
            message: "No image returned. The prompt may have been filtered.".to_string(),
        })?;

    let encoded = prediction.bytes_base64_encoded.unwrap_or_default();
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes())?;

    Ok(GeneratedImage {
        bytes,
        mime_type: prediction
            .mime_type
            .unwrap_or_else(|| "image/png".to_string()),
    })
}

#[async_trait::async_trait]
impl ImageGenerator for ImagenGenerator {
    async fn generate_image(
        &self,
        prompt: &str,
        aspect_ratio: &str,
    ) -> Result<GeneratedImage, AiError> {
        let url = format!("{}/v1beta/models/{}:predict", self.base_url, self.model);
        let request = PredictRequest {
            instances: [PredictInstance { prompt }],
            parameters: PredictParameters {
                sample_count: 1,
                aspect_ratio,
                person_generation: "allow_adult",
            },
        };

        log::info!("Generating {aspect_ratio} image with {}", self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AiError::Provider {
                message: format!("HTTP {status}: {body}"),
            });
        }

        decode_prediction(serde_json::from_str(&body)?)
    }
}
