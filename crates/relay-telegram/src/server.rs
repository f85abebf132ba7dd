//! Health check and webhook intake over axum.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use teloxide::types::Update;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{handlers, router::AppState};

pub const READY_TEXT: &str = "Bot is running";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/webhook", post(webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.cfg.host, state.cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, READY_TEXT)
}

/// Always `200 ok`, so Telegram never redelivers an update we failed to parse.
async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => handlers::dispatch_update(state, update),
        Err(e) => warn!(error = %e, bytes = body.len(), "discarding undecodable webhook body"),
    }
    (StatusCode::OK, "ok")
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::router::tests::test_state;

    async fn call(req: Request<Body>) -> (StatusCode, String) {
        let resp = router(test_state()).oneshot(req).await.unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), 1024).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn health_reports_ready() {
        let (status, body) = call(Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, READY_TEXT);
    }

    #[tokio::test]
    async fn webhook_accepts_garbage_with_ok() {
        let req = Request::post("/webhook")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn webhook_accepts_unhandled_update_kind_with_ok() {
        let update = serde_json::json!({
            "update_id": 10,
            "edited_message": {
                "message_id": 1,
                "date": 1_700_000_000,
                "edit_date": 1_700_000_100,
                "chat": { "id": 42, "type": "private", "first_name": "Ann" },
                "text": "edited"
            }
        });
        let req = Request::post("/webhook")
            .body(Body::from(update.to_string()))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn get_on_webhook_is_not_allowed() {
        let (status, _) = call(Request::get("/webhook").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
