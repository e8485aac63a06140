use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{
    error::MediaError,
    orchestrator::{GenerateRequest, MediaRef, Orchestrator},
};

/// HTTP-facing wrapper around [`MediaError`].
#[derive(Debug)]
pub struct ApiError(MediaError);

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        Self(e)
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MediaError::Validation(_) => StatusCode::BAD_REQUEST,
            MediaError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let payload = ErrorPayload {
            error: self.0.public_message(),
        };
        (status, Json(payload)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_body(body: &Bytes) -> ApiResult<Value> {
    serde_json::from_slice(body)
        .map_err(|e| MediaError::validation(format!("Invalid JSON body: {e}")).into())
}

/// The non-empty string `prompt` field of a request body.
fn prompt_of(body: &Value) -> ApiResult<String> {
    body.get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .ok_or_else(|| MediaError::validation("Missing prompt").into())
}

async fn improve(State(o): State<Arc<Orchestrator>>, body: Bytes) -> ApiResult<Json<Value>> {
    let prompt = prompt_of(&parse_body(&body)?)?;
    let improved = o.improve(&prompt).await?;
    Ok(Json(json!({ "improved": improved })))
}

async fn image(State(o): State<Arc<Orchestrator>>, body: Bytes) -> ApiResult<Json<Value>> {
    let prompt = prompt_of(&parse_body(&body)?)?;
    let url = o.generate_image(&prompt).await?;
    Ok(Json(json!({ "url": url })))
}

async fn video(State(o): State<Arc<Orchestrator>>, body: Bytes) -> ApiResult<Json<Value>> {
    let prompt = prompt_of(&parse_body(&body)?)?;
    let url = o.provider_video(&prompt).await?;
    Ok(Json(json!({ "url": url })))
}

/// Either `improved` or `prompt` must be a non-empty string; `improved` wins unless it is blank.
async fn generate(State(o): State<Arc<Orchestrator>>, body: Bytes) -> ApiResult<Json<MediaRef>> {
    let body = parse_body(&body)?;
    let improved = body.get("improved").and_then(Value::as_str);
    if improved.is_none_or(|s| s.trim().is_empty()) {
        prompt_of(&body)?;
    }
    let req: GenerateRequest = serde_json::from_value(body)
        .map_err(|e| MediaError::validation(format!("Invalid generate request: {e}")))?;
    Ok(Json(o.generate(&req).await?))
}

fn media_id(raw: &str) -> ApiResult<Uuid> {
    let unknown = |_| ApiError(MediaError::not_found(format!("no media with id {raw}")));
    Uuid::parse_str(raw).map_err(unknown)
}

fn download_name(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "video.mp4",
        "image/gif" => "video.gif",
        _ => "video.webm",
    }
}

async fn get_media(
    State(o): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let clip = o.clip(&media_id(&id)?)?;
    let content_type = HeaderValue::from_str(&clip.mime_type)
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    let name = download_name(&clip.mime_type);
    let disposition = format!("attachment; filename=\"{name}\"");
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_str(&disposition)
                    .unwrap_or(HeaderValue::from_static("attachment")),
            ),
        ],
        clip.data,
    )
        .into_response())
}

async fn delete_media(
    State(o): State<Arc<Orchestrator>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    o.release(&media_id(&id)?)?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/api/improve", post(improve))
        .route("/api/image", post(image))
        .route("/api/video", post(video))
        .route("/api/generate", post(generate))
        .route("/media/:id", get(get_media).delete(delete_media))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, orchestrator: Arc<Orchestrator>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "agentic-media listening");
    axum::serve(listener, router(orchestrator))
        .await
        .context("http server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_must_be_a_non_empty_string() {
        assert!(prompt_of(&json!({ "prompt": "a cat" })).is_ok());
        for bad in [json!({}), json!({ "prompt": "" }), json!({ "prompt": 3 })] {
            let err = prompt_of(&bad).unwrap_err();
            assert_eq!(err.0.public_message(), "Missing prompt");
        }
    }

    #[test]
    fn error_status_codes() {
        let status = |e: MediaError| ApiError(e).into_response().status();
        assert_eq!(status(MediaError::validation("x")), StatusCode::BAD_REQUEST);
        assert_eq!(status(MediaError::not_found("x")), StatusCode::NOT_FOUND);
        let internal = StatusCode::INTERNAL_SERVER_ERROR;
        assert_eq!(status(MediaError::provider("x")), internal);
        assert_eq!(status(MediaError::capability("x")), internal);
    }
}
