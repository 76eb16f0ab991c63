use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use crate::critique::{CritiqueOutcome, CritiqueRequest};
use crate::error::ApiError;
use crate::state::AppState;
use crate::utils::timing::{complete_request_timer, RequestTimer};

#[derive(Debug, Default)]
struct CritiqueForm {
    file: Option<Vec<u8>>,
    file_name: Option<String>,
    content_type: Option<String>,
    brand: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<CritiqueForm, ApiError> {
    let mut form = CritiqueForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.file = Some(field.bytes().await?.to_vec());
            }
            Some("brand") => {
                form.brand = Some(field.text().await?);
            }
            _ => {}
        }
    }
    Ok(form)
}

impl IntoResponse for CritiqueOutcome {
    fn into_response(self) -> Response {
        match self {
            CritiqueOutcome::Critique(value) => Json(value).into_response(),
            // Unknown brands share the success status with critiques.
            CritiqueOutcome::BrandNotFound { message } => {
                Json(json!({ "error": message })).into_response()
            }
            CritiqueOutcome::MalformedReply {
                raw_response,
                details,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to parse AI response",
                    "raw_response": raw_response,
                    "details": details,
                })),
            )
                .into_response(),
        }
    }
}

fn outcome_status(outcome: &CritiqueOutcome) -> &'static str {
    match outcome {
        CritiqueOutcome::Critique(_) => "success",
        CritiqueOutcome::BrandNotFound { .. } => "brand_not_found",
        CritiqueOutcome::MalformedReply { .. } => "malformed_reply",
    }
}

pub async fn critique_ad(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<CritiqueOutcome, ApiError> {
    let form = read_form(multipart).await?;
    let image = form.file.ok_or(ApiError::MissingField("file"))?;
    let brand = form.brand.ok_or(ApiError::MissingField("brand"))?;

    let mut timer = RequestTimer::new("/critique").with_upload(
        &brand,
        form.file_name.as_deref(),
        image.len(),
    );
    timer.log_received();
    info!(
        "Critique requested for brand '{}' (file={:?}, content_type={:?}, bytes={})",
        brand,
        form.file_name,
        form.content_type,
        image.len()
    );

    let result = state
        .critique
        .critique(CritiqueRequest {
            image,
            brand_key: brand,
        })
        .await;

    match &result {
        Ok(outcome) => complete_request_timer(&mut timer, outcome_status(outcome), None),
        Err(err) => complete_request_timer(&mut timer, "error", Some(err.to_string())),
    }
    result.map_err(ApiError::from)
}
