//! HTTP server: shared state and router

mod handlers;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::recommend::Recommender;
use crate::retrieval::RetrievalOrchestrator;
use crate::search::CaseSearchService;
use crate::store::Store;
use crate::stream::StreamController;

/// Process-scoped services shared by all request handlers; constructed once
/// at startup and cloned per request
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub search: Arc<CaseSearchService>,
    pub retrieval: Arc<RetrievalOrchestrator>,
    pub controller: Arc<StreamController>,
    pub recommender: Arc<Recommender>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(handlers::status_handler))
        .route("/api/search", post(handlers::search_handler))
        .route("/api/chat/new", get(handlers::new_chat_handler))
        .route("/api/chat/question", post(handlers::new_question_handler))
        .route("/api/chat/retrieve", post(handlers::retrieve_handler))
        .route("/api/chat/stream", post(handlers::stream_chat_handler))
        .route("/api/chat/recommend", post(handlers::recommend_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
