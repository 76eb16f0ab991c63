use std::sync::Arc;

use serde_json::Value;
use tokio::task;
use tracing::{debug, info, warn};

use crate::brands::BrandCatalog;
use crate::critique::normalize::parse_reply;
use crate::critique::prompt::build_prompt;
use crate::critique::types::review_reply;
use crate::llm::{prepare_image, ImageError, PreparedImage, VisionModel};

#[derive(Debug, Clone)]
pub struct CritiqueRequest {
    pub image: Vec<u8>,
    pub brand_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CritiqueOutcome {
    /// Parsed model reply, exactly as the model produced it.
    Critique(Value),
    BrandNotFound { message: String },
    MalformedReply { raw_response: String, details: String },
}

#[derive(Debug, thiserror::Error)]
pub enum CritiqueError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("{0:#}")]
    Model(anyhow::Error),
    #[error("Image preparation task failed: {0}")]
    Task(#[from] task::JoinError),
}

/// Decodes the upload on the blocking pool so large images do not stall
/// the runtime workers.
async fn prepare_image_blocking(bytes: Vec<u8>) -> Result<PreparedImage, CritiqueError> {
    let image = task::spawn_blocking(move || prepare_image(bytes)).await??;
    Ok(image)
}

pub struct CritiqueService {
    catalog: Arc<BrandCatalog>,
    model: Arc<dyn VisionModel>,
}

impl CritiqueService {
    pub fn new(catalog: Arc<BrandCatalog>, model: Arc<dyn VisionModel>) -> Self {
        CritiqueService { catalog, model }
    }

    pub async fn critique(&self, request: CritiqueRequest) -> Result<CritiqueOutcome, CritiqueError> {
        let Some(profile) = self.catalog.lookup(&request.brand_key) else {
            info!("Rejected critique for unknown brand '{}'", request.brand_key);
            return Ok(CritiqueOutcome::BrandNotFound {
                message: format!(
                    "Brand '{}' not found. Available: {}",
                    request.brand_key,
                    self.catalog.describe_keys()
                ),
            });
        };

        let image = prepare_image_blocking(request.image).await?;
        debug!(
            "Prepared {} image ({} bytes, dimensions={:?}) for brand {}",
            image.mime_type,
            image.bytes.len(),
            image.dimensions,
            profile.name
        );

        let prompt = build_prompt(profile);
        let reply = self
            .model
            .generate(&prompt, &image)
            .await
            .map_err(CritiqueError::Model)?;

        match parse_reply(&reply) {
            Ok(value) => {
                let findings = review_reply(&value);
                if !findings.is_empty() {
                    warn!(
                        "Critique from {} for {} deviates from the requested layout: {}",
                        self.model.name(),
                        profile.name,
                        findings.join("; ")
                    );
                }
                debug!("Critique for {}: {}", profile.name, value);
                Ok(CritiqueOutcome::Critique(value))
            }
            Err(err) => {
                warn!(
                    "Failed to parse reply from {} as JSON: {}",
                    self.model.name(),
                    err
                );
                Ok(CritiqueOutcome::MalformedReply {
                    raw_response: reply,
                    details: err.to_string(),
                })
            }
        }
    }
}
