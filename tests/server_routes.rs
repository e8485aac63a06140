mod common;

use std::sync::Arc;

use agentic_media::{
    ImageProvider, MediaError, MediaResult, Orchestrator, Providers, VideoProvider,
    providers::HeuristicImprover, server,
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt as _;
use serde_json::{Value, json};
use tower::ServiceExt as _;

struct StubImages;

#[async_trait]
impl ImageProvider for StubImages {
    async fn generate(&self, _prompt: &str) -> MediaResult<String> {
        Ok("data:image/png;base64,iVBORw0KGgo=".to_string())
    }
}

struct FailingVideos;

#[async_trait]
impl VideoProvider for FailingVideos {
    async fn generate(&self, _prompt: &str) -> MediaResult<Option<String>> {
        Err(MediaError::provider("replicate returned 502 Bad Gateway"))
    }
}

fn app_with(videos: Option<Arc<dyn VideoProvider>>) -> Router {
    let providers = Providers {
        improver: Arc::new(HeuristicImprover),
        images: Arc::new(StubImages),
        videos,
    };
    let synth = common::synthesizer(common::MemoryRecorder::default(), None);
    server::router(Arc::new(Orchestrator::new(providers, synth)))
}

fn app() -> Router {
    app_with(None)
}

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn missing_prompt_is_a_400() {
    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": 42 })] {
        for uri in ["/api/improve", "/api/image", "/api/video", "/api/generate"] {
            let resp = app().oneshot(post(uri, body.to_string())).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri} {body}");
            assert_eq!(json_body(resp).await, json!({ "error": "Missing prompt" }));
        }
    }
}

#[tokio::test]
async fn malformed_json_is_a_400() {
    let resp = app()
        .oneshot(post("/api/improve", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn improve_returns_the_rewrite() {
    let body = json!({ "prompt": "a lighthouse" });
    let resp = app()
        .oneshot(post("/api/improve", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let reply = json_body(resp).await;
    let improved = reply["improved"].as_str().unwrap();
    assert!(improved.starts_with("a lighthouse, photorealistic"));
}

#[tokio::test]
async fn image_returns_a_url() {
    let body = json!({ "prompt": "a lighthouse" });
    let resp = app()
        .oneshot(post("/api/image", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "url": "data:image/png;base64,iVBORw0KGgo=" })
    );
}

#[tokio::test]
async fn video_without_provider_returns_null_url() {
    let body = json!({ "prompt": "a lighthouse" });
    let resp = app()
        .oneshot(post("/api/video", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "url": null }));
}

#[tokio::test]
async fn video_provider_failure_is_a_500_with_message() {
    let body = json!({ "prompt": "a lighthouse" });
    let resp = app_with(Some(Arc::new(FailingVideos)))
        .oneshot(post("/api/video", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(resp).await,
        json!({ "error": "replicate returned 502 Bad Gateway" })
    );
}

#[tokio::test]
async fn generate_uses_the_improved_prompt_when_the_idea_is_empty() {
    let body = json!({ "prompt": "", "improved": "a lighthouse at dusk" });
    let resp = app()
        .oneshot(post("/api/generate", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let media = json_body(resp).await;
    assert_eq!(media["url"], "data:image/png;base64,iVBORw0KGgo=");
    assert_eq!(media["origin"], "provider");

    let body = json!({ "prompt": "", "improved": "   " });
    let resp = app()
        .oneshot(post("/api/generate", body.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(start_paused = true)]
async fn generated_clip_can_be_downloaded_and_released() {
    let app = app();
    let resp = app
        .clone()
        .oneshot(post(
            "/api/generate",
            json!({ "prompt": "a lighthouse", "kind": "video" }).to_string(),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let media = json_body(resp).await;
    assert_eq!(media["origin"], "fallback");
    assert_eq!(media["mime_type"], "video/webm");
    let url = media["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/media/"));

    let resp = app
        .clone()
        .oneshot(Request::get(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/webm");
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"video.webm\""
    );
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(common::HEADER));

    let delete = || Request::delete(&url).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = app.clone().oneshot(delete()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(Request::get(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_media_is_a_404() {
    let malformed = "/media/not-a-uuid";
    let missing = "/media/6c1f6a4e-0000-4000-8000-000000000000";
    for uri in [malformed, missing] {
        let resp = app()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert!(json_body(resp).await["error"].is_string());
    }
}
