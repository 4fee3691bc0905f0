use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub mod error;
pub mod handlers;
pub mod newsletter;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use newsletter::{BeehiivClient, BeehiivConfig, NewsletterProvider, SignupOutcome};
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/briefings", get(handlers::get_briefings))
        .route("/api/briefings/dates", get(handlers::list_dates))
        .route("/api/briefings/generate", post(handlers::generate_briefing))
        .route("/api/cron/daily", get(handlers::cron_daily))
        .route("/api/admin/generate-historical", post(handlers::generate_historical))
        .route("/api/newsletter", post(handlers::subscribe_newsletter))
        .route(
            "/api/push/subscribe",
            get(handlers::push_public_key)
                .post(handlers::push_subscribe)
                .delete(handlers::push_unsubscribe),
        )
        .route("/api/usage", get(handlers::tts_usage))
        .route("/api/tts/voices", get(handlers::tts_voices))
        .route("/audio/:file", get(handlers::get_audio))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> mb_core::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("🌐 Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use mb_core::{Error, Result};
    pub use crate::{create_app, AppState};
}
