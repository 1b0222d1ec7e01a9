mod app;
mod auth;
mod config;
mod error;
mod state;
mod users;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` picks the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("userforest=debug,tower_http=info"));
    let fmt = tracing_subscriber::fmt().with_env_filter(filter);
    match std::env::var("LOG_FORMAT").as_deref() {
        Ok("json") => fmt.json().with_current_span(true).init(),
        _ => fmt.compact().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let state = state::AppState::init().await?;
    let addr = state.config.listen_addr;
    app::serve(app::build_app(state), addr).await
}
