mod config;
mod error;
mod llm;
mod router;
mod routes;
mod services;
mod session;
mod shell;
mod state;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::llm::TextGenerator;
use crate::services::realtime_db::RealtimeDbReviews;
use crate::services::reviews::{MemoryReviewStore, ReviewStore};
use crate::session::firebase::FirebaseIdentity;
use crate::session::local::LocalIdentity;
use crate::session::{IdentityProvider, SessionStore};

#[tokio::main]
async fn main() {
    // A missing .env file is fine; real env vars win either way.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");
    let shutdown = CancellationToken::new();

    let provider: Arc<dyn IdentityProvider> = match &config.firebase_auth {
        Some(firebase) => {
            tracing::info!(base_url = %firebase.identity_base_url, "using hosted identity provider");
            Arc::new(
                FirebaseIdentity::new(firebase.api_key.clone(), &firebase.identity_base_url, &firebase.token_url)
                    .expect("identity provider init failed"),
            )
        }
        None => {
            tracing::info!("FIREBASE_API_KEY not set; using in-process identity provider");
            Arc::new(LocalIdentity::new())
        }
    };
    let session = SessionStore::start(provider, config.auth_timeout);

    let reviews: Arc<dyn ReviewStore> = match &config.realtime_db {
        Some(db) => {
            let store = Arc::new(RealtimeDbReviews::new(&db.database_url).expect("review store init failed"));
            if let Err(e) = store.refresh().await {
                tracing::warn!(error = %e, "initial review fetch failed; the live stream will retry");
            }
            let _live = store.spawn_live(db.poll_interval, shutdown.clone());
            tracing::info!(retry_secs = db.poll_interval.as_secs(), "using hosted review store");
            store
        }
        None => {
            tracing::info!("FIREBASE_DATABASE_URL not set; reviews are kept in memory");
            Arc::new(MemoryReviewStore::new())
        }
    };

    let llm: Option<Arc<dyn TextGenerator>> = match llm::client_from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "generative model configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "generative model unavailable; AI features disabled");
            None
        }
    };

    let state = state::AppState::new(session.clone(), reviews, llm, shutdown.clone());
    let app = routes::app(state);
    let bind_address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .expect("failed to bind");

    tracing::info!(addr = %bind_address, "dyann listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            shutdown.cancel();
        })
        .await
        .expect("server failed");

    session.shutdown();
}
