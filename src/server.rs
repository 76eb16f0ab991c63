use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::info;

use crate::handlers::{brands, critique};
use crate::state::AppState;

/// Any origin, method and header, with credentials. The request values are
/// mirrored because a wildcard origin cannot be sent alongside credentials.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(brands::root))
        .route("/brands", get(brands::list_brands))
        .route("/brands/{key}", get(brands::get_brand))
        .route("/critique", post(critique::critique_ad))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(cors_layer())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

pub async fn serve(address: &str, router: Router) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use image::ImageFormat;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::brands::BrandCatalog;
    use crate::llm::testing::{encode_test_image, StubModel};

    const BOUNDARY: &str = "brandai-test-boundary";
    const REPLY: &str = r#"{"overall_score": 87.5, "brand_alignment": {"score": 90, "feedback": "Swoosh is visible."}, "visual_quality": {"score": 85, "feedback": "Sharp."}, "message_clarity": {"score": 80, "feedback": "Clear."}, "safety_ethics": {"score": 95, "feedback": "Safe."}, "strengths": ["a", "b", "c"], "issues": ["d", "e"], "suggestions": ["f", "g", "h"]}"#;

    fn app(model: Arc<StubModel>) -> Router {
        build_router(AppState::new(BrandCatalog::builtin(), model), 1024 * 1024)
    }

    fn multipart_body(file: Option<&[u8]>, brand: Option<&str>) -> Body {
        let mut body = Vec::new();
        if let Some(bytes) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"ad.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(brand) = brand {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"brand\"\r\n\r\n{brand}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(body)
    }

    fn critique_request(file: Option<&[u8]>, brand: Option<&str>) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/critique")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart_body(file, brand))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn root_reports_running() {
        let response = app(Arc::new(StubModel::replying(REPLY)))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "message": "BrandAI Critique API is running" })
        );
    }

    #[tokio::test]
    async fn lists_brand_keys() {
        let response = app(Arc::new(StubModel::replying(REPLY)))
            .oneshot(Request::builder().uri("/brands").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "brands": ["nike", "apple", "cocacola"] })
        );
    }

    #[tokio::test]
    async fn returns_single_brand_profile() {
        let router = app(Arc::new(StubModel::replying(REPLY)));
        let response = router
            .clone()
            .oneshot(Request::builder().uri("/brands/Apple").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["tagline"], json!("Think Different"));

        let response = router
            .oneshot(Request::builder().uri("/brands/pepsi").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Brand 'pepsi' not found" })
        );
    }

    #[tokio::test]
    async fn critique_returns_model_reply_verbatim() {
        let model = Arc::new(StubModel::replying(&format!("```json\n{REPLY}\n```")));
        let png = encode_test_image(ImageFormat::Png);
        let response = app(model.clone())
            .oneshot(critique_request(Some(&png), Some("Nike")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let expected: Value = serde_json::from_str(REPLY).unwrap();
        assert_eq!(bytes, serde_json::to_vec(&expected).unwrap());
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_brand_is_reported_with_success_status() {
        let model = Arc::new(StubModel::replying(REPLY));
        let png = encode_test_image(ImageFormat::Png);
        let response = app(model.clone())
            .oneshot(critique_request(Some(&png), Some("pepsi")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Brand 'pepsi' not found. Available: ['nike', 'apple', 'cocacola']" })
        );
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn unparseable_reply_returns_raw_text() {
        let raw = "Here is my critique: the ad is bold.";
        let png = encode_test_image(ImageFormat::Png);
        let response = app(Arc::new(StubModel::replying(raw)))
            .oneshot(critique_request(Some(&png), Some("apple")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], json!("Failed to parse AI response"));
        assert_eq!(body["raw_response"], json!(raw));
        assert!(body["details"].as_str().unwrap().contains("expected value"));
    }

    #[tokio::test]
    async fn model_fault_returns_error_message() {
        let png = encode_test_image(ImageFormat::Png);
        let response = app(Arc::new(StubModel::failing("Gemini request timed out after 120s")))
            .oneshot(critique_request(Some(&png), Some("nike")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Gemini request timed out after 120s" })
        );
    }

    #[tokio::test]
    async fn undecodable_upload_is_a_server_error() {
        let model = Arc::new(StubModel::replying(REPLY));
        let response = app(model.clone())
            .oneshot(critique_request(Some(b"plain text, not pixels"), Some("nike")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Cannot identify image file"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let png = encode_test_image(ImageFormat::Png);
        let router = app(Arc::new(StubModel::replying(REPLY)));

        let response = router
            .clone()
            .oneshot(critique_request(Some(&png), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await,
            json!({ "error": "Missing form field 'brand'" })
        );

        let response = router
            .oneshot(critique_request(None, Some("nike")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn cors_allows_any_origin_with_credentials() {
        let response = app(Arc::new(StubModel::replying(REPLY)))
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/critique")
                    .header(header::ORIGIN, "https://ads.example.com")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-custom")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://ads.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "x-custom");
    }
}
