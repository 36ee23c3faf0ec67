use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

mod choropleth;
mod colormap;
mod compose;
mod config;
mod dashboard;
mod error;
mod fetch;
mod models;
mod projection;
mod stats;
mod table;
mod template_engine;

use config::Config;
use dashboard::Dashboard;
use fetch::{BrowserClient, GeoSource};
use template_engine::TemplateEngine;

struct AppState {
    dashboard: Dashboard<BrowserClient>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    let config = Config::load()?;
    let thread_count = config.thread_count.unwrap_or_else(num_cpus::get);

    info!("starting server with {} threads", thread_count);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(thread_count)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

async fn log_request_response(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    let method = req.method().to_string();
    info!("incoming request: {} {}", method, path);
    let response = next.run(req).await;
    info!("request result: {} for {} {}", response.status(), method, path);
    response
}

async fn async_main(config: Config) -> anyhow::Result<()> {
    let template_engine = TemplateEngine::new(&config.template_dir())?;
    let http_client = BrowserClient::new(config.user_agent())?;
    let addr = config.listen_addr().to_string();

    let state = Arc::new(AppState {
        dashboard: Dashboard::new(GeoSource::new(http_client), config, template_engine),
    });

    let app = Router::new()
        .route("/", get(get_dashboard))
        .route("/health", get(|| async { "ok" }))
        .layer(middleware::from_fn(log_request_response))
        .with_state(state);

    info!("listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// --- Handlers ---

async fn get_dashboard(State(state): State<Arc<AppState>>) -> Response {
    match state.dashboard.render().await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("dashboard error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("error rendering dashboard: {}", e)).into_response()
        },
    }
}
