use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

use murmur_application::{PipelineUseCase, UploadUseCase};
use murmur_configuration::ServerConfig;
use murmur_domain::{MediaStore, MetadataStore};

pub mod error;
pub mod handlers;

pub use error::{domain_error_mapper, error_mapper, HttpError};

#[derive(Clone)]
pub struct AppState {
    pub uploads: Arc<UploadUseCase>,
    pub pipeline: Arc<PipelineUseCase>,
    pub metadata: Arc<dyn MetadataStore>,
    pub media: Arc<dyn MediaStore>,
}

pub fn create_app_routes(state: AppState, upload_body_limit_bytes: usize) -> Router {
    // chunk uploads are the only large payloads; raise the limit there only
    let chunk_route = put(handlers::upload_chunk).layer(DefaultBodyLimit::max(upload_body_limit_bytes));

    Router::new()
        .route("/upload", post(handlers::open_upload))
        .route("/upload/{transcription_id}", chunk_route)
        .route("/transcribe/{transcription_id}", get(handlers::transcribe))
        .route(
            "/transcription/{transcription_id}",
            get(handlers::transcription),
        )
        .route(
            "/transcription/{transcription_id}/track",
            put(handlers::patch_track),
        )
        .route("/export/{transcription_id}", get(handlers::export))
        .route("/media/{transcription_id}", get(handlers::media))
        .with_state(state)
}

pub async fn serve(state: AppState, server: &ServerConfig) -> anyhow::Result<()> {
    let router = create_app_routes(state, server.upload_body_limit_bytes);
    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port)).await?;
    tracing::info!(host = %server.host, port = server.port, "listening");
    axum::serve(listener, router).await?;
    Ok(())
}
