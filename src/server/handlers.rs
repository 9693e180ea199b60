//! Request handlers

use axum::body::Body;
use axum::extract::{Json, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::AppState;
use crate::error::ServiceError;
use crate::prompt;
use crate::store::QuestionContent;

/// Default result count for case search
const DEFAULT_TOP_K: usize = 5;

/// Health check and status endpoint
pub async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "corpus_size": state.search.corpus_size(),
    }))
}

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: Option<usize>,
}

pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>, ServiceError> {
    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    let hits = state.search.search(&request.query, top_k).await?;
    Ok(Json(json!({ "results": hits })))
}

/// Create a new chat session
pub async fn new_chat_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, ServiceError> {
    let session_id = Uuid::new_v4().simple().to_string();
    state
        .store
        .create_session(&session_id)
        .await
        .map_err(ServiceError::Internal)?;
    Ok(Json(json!({ "session_id": session_id })))
}

#[derive(Deserialize)]
pub struct NewQuestionRequest {
    pub session_id: String,
    pub user_question: String,
    #[serde(default)]
    pub ocr_text: Option<String>,
}

pub async fn new_question_handler(
    State(state): State<AppState>,
    Json(request): Json<NewQuestionRequest>,
) -> Result<Json<Value>, ServiceError> {
    if request.session_id.trim().is_empty() {
        return Err(ServiceError::Validation("session_id must not be empty".into()));
    }
    if request.user_question.trim().is_empty() {
        return Err(ServiceError::Validation("user_question must not be empty".into()));
    }

    let content = QuestionContent {
        user_question: request.user_question,
        ocr_text: request.ocr_text,
    };
    let question_id = state.store.add_question(&request.session_id, &content).await?;

    Ok(Json(json!({ "question_id": question_id })))
}

#[derive(Deserialize)]
pub struct QuestionRef {
    pub question_id: i64,
}

/// Run the retrieval steps for a question and report what they produced
pub async fn retrieve_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRef>,
) -> Result<Json<Value>, ServiceError> {
    let question = state
        .store
        .get_question(request.question_id)
        .await
        .map_err(ServiceError::Internal)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("question {} does not exist", request.question_id))
        })?;

    let outcome = state.retrieval.retrieve(&question).await;

    Ok(Json(json!({
        "web": outcome.web.is_some(),
        "rag": outcome.rag.is_some(),
        "web_items": outcome.web,
    })))
}

/// Suggest follow-up questions based on a question's persisted answer
pub async fn recommend_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRef>,
) -> Result<Json<Value>, ServiceError> {
    let question = state
        .store
        .get_question(request.question_id)
        .await
        .map_err(ServiceError::Internal)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("question {} does not exist", request.question_id))
        })?;

    let answer = question.answer.ok_or_else(|| {
        ServiceError::Validation(format!(
            "question {} has no answer yet",
            request.question_id
        ))
    })?;

    let items = state.recommender.suggest(&answer).await;
    Ok(Json(json!({ "recommend_items": items })))
}

/// Stream the generated answer for a question as plain text
pub async fn stream_chat_handler(
    State(state): State<AppState>,
    Json(request): Json<QuestionRef>,
) -> Result<impl IntoResponse, ServiceError> {
    let question = state
        .store
        .get_question(request.question_id)
        .await
        .map_err(ServiceError::Internal)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("question {} does not exist", request.question_id))
        })?;

    let artifacts = state
        .store
        .get_artifacts(question.id)
        .await
        .map_err(ServiceError::Internal)?;

    let messages = prompt::assemble(&question.content, &artifacts);
    let rx = state.controller.run(question, messages).await?;

    let stream =
        ReceiverStream::new(rx).map(|fragment| Ok::<_, Infallible>(Bytes::from(fragment)));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(stream),
    ))
}
