//! HTTP Surface
//!
//! One endpoint: `POST /v1/ranker/query` with body `{"user_query": "..."}`.
//! Decode errors, missing fields, and a not-yet-ready index all reply 400
//! with a structured `{"success": false, "error": "..."}` body. `OPTIONS`
//! returns 200 with permissive CORS headers; every other method is a 400.
//!
//! A panic inside a handler indicates a corrupted pipeline invariant; the
//! process-wide panic hook installed in `main` turns it into a process exit
//! instead of a per-request recovery.

use crate::pipeline::{Application, ApplicationTask};

use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Deserialize)]
struct RankingQueryRequest {
    // Option so a missing field is distinguishable from a decode error
    user_query: Option<String>,
}

#[derive(Serialize)]
struct RankingQueryReply {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn serve(app: Arc<Application>, shutdown: CancellationToken) -> anyhow::Result<()> {
    let router = Router::new()
        .route("/v1/ranker/query", any(ranker_query_handler))
        .layer(Extension(app.clone()));

    let general = &app.config().general;
    let listen_address = format!("{}:{}", general.listen_addr, general.listen_port);
    let listener = TcpListener::bind(&listen_address).await?;
    tracing::info!("Server listening on http://{}", listen_address);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}

pub(crate) async fn ranker_query_handler(
    method: Method,
    Extension(app): Extension<Arc<Application>>,
    body: String,
) -> Response {
    let headers = common_headers();

    match method {
        Method::OPTIONS => (StatusCode::OK, headers).into_response(),
        Method::POST => {
            let request: RankingQueryRequest = match serde_json::from_str(&body) {
                Ok(request) => request,
                Err(_) => return error_reply(headers, "json decode error"),
            };

            let Some(user_query) = request.user_query else {
                return error_reply(headers, "json field missing");
            };

            if app.state_snapshot().task != ApplicationTask::ReadyToSearch {
                return error_reply(headers, "index not yet ready");
            }

            match app.rank(&user_query).await {
                Ok(()) => (
                    StatusCode::OK,
                    headers,
                    Json(RankingQueryReply {
                        success: true,
                        error: None,
                    }),
                )
                    .into_response(),
                Err(error) => error_reply(headers, &error.to_string()),
            }
        }
        _ => (StatusCode::BAD_REQUEST, headers).into_response(),
    }
}

fn error_reply(headers: HeaderMap, error: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        headers,
        Json(RankingQueryReply {
            success: false,
            error: Some(error.to_string()),
        }),
    )
        .into_response()
}

fn common_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Vary", HeaderValue::from_static("*"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers
}
