//! HTTP scoring service (actix-web).
//!
//! The scorer is loaded once at startup and shared read-only across workers.

use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::error::JsonPayloadError;
use actix_web::{App, HttpRequest, HttpServer, middleware, web};
use tracing::info;

use crate::app::pipeline::load_scorer;
use crate::error::AppError;
use crate::models::Scorer;

pub mod models;
pub mod routes;

pub use models::*;
pub use routes::configure_routes;

/// Largest accepted JSON body.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model: PathBuf,
    pub max_batch: usize,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<Scorer>,
    pub max_batch: usize,
}

/// JSON extractor config: body limit plus JSON error bodies.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(handle_json_payload_error)
}

fn handle_json_payload_error(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    info!(path = req.path(), error = %err, "rejected JSON payload");
    match err {
        JsonPayloadError::OverflowKnownLength { .. } | JsonPayloadError::Overflow { .. } => {
            ApiError::payload_too_large(err.to_string()).into()
        }
        _ => ApiError::bad_request(format!("Invalid JSON: {err}")).into(),
    }
}

/// Load the model and serve until the process is stopped.
pub fn run(settings: ServerSettings) -> Result<(), AppError> {
    if settings.workers == 0 {
        return Err(AppError::new(2, "workers must be >= 1."));
    }
    if settings.max_batch == 0 {
        return Err(AppError::new(2, "max_batch must be >= 1."));
    }

    let scorer = load_scorer(&settings.model)?;
    let summary = scorer.summary();
    info!(
        model = %settings.model.display(),
        features = summary.feature_count,
        threshold = summary.threshold,
        "model loaded"
    );

    let state = AppState {
        scorer: Arc::new(scorer),
        max_batch: settings.max_batch,
    };

    let listener = TcpListener::bind((settings.host.as_str(), settings.port)).map_err(|e| {
        AppError::new(
            5,
            format!("Failed to bind {}:{}: {e}", settings.host, settings.port),
        )
    })?;
    info!(host = %settings.host, port = settings.port, workers = settings.workers, "starting HTTP server");
    actix_web::rt::System::new()
        .block_on(serve(state, listener, settings.workers))
        .map_err(|e| AppError::new(5, format!("HTTP server failed: {e}")))
}

/// Serve on an already bound listener until the system stops.
pub(crate) async fn serve(
    state: AppState,
    listener: TcpListener,
    workers: usize,
) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .workers(workers)
    .listen(listener)?
    .run()
    .await
}
