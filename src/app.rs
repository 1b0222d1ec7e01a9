use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::Span;

use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(users::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(log_response),
        )
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %req.method(),
        path = req.uri().path(),
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    )
}

/// 5xx responses log at error level, everything else at info.
fn log_response(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", status.as_u16());
    span.record("latency_ms", latency.as_millis() as u64);
    if status.is_server_error() {
        tracing::error!(%status, "request failed");
    } else {
        tracing::info!(%status, "request served");
    }
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "userforest listening");
    axum::serve(listener, app).await?;
    Ok(())
}
