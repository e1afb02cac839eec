//! The question-answering entry surface.
//!
//! One JSON endpoint: `POST /ask` takes `{"question": "..."}` and returns
//! `{"answer": "..."}`. A blank question short-circuits to a static
//! prompt-to-enter-a-question message; workflow failures map to user-safe
//! interface errors with a correlation id for log lookup.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use retaily_agent::workflow::{AnswerWorkflow, WorkflowError};
use retaily_agent::CompletionClient;
use retaily_core::errors::{ApplicationError, InterfaceError};
use retaily_core::store::TabularStore;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

const EMPTY_QUESTION_MESSAGE: &str = "Please enter a question.";

pub struct AskState<C, S> {
    workflow: Arc<AnswerWorkflow<C, S>>,
}

impl<C, S> Clone for AskState<C, S> {
    fn clone(&self) -> Self {
        Self { workflow: Arc::clone(&self.workflow) }
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct AskErrorResponse {
    pub error: String,
    pub correlation_id: String,
}

pub fn router<C, S>(workflow: Arc<AnswerWorkflow<C, S>>) -> Router
where
    C: CompletionClient + 'static,
    S: TabularStore + 'static,
{
    Router::new().route("/ask", post(ask::<C, S>)).with_state(AskState { workflow })
}

pub async fn ask<C, S>(
    State(state): State<AskState<C, S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, (StatusCode, Json<AskErrorResponse>)>
where
    C: CompletionClient + 'static,
    S: TabularStore + 'static,
{
    if request.question.trim().is_empty() {
        return Ok(Json(AskResponse { answer: EMPTY_QUESTION_MESSAGE.to_string() }));
    }

    let correlation_id = Uuid::new_v4().to_string();
    info!(
        event_name = "server.ask.received",
        correlation_id = %correlation_id,
        "question received"
    );

    match state.workflow.run(&request.question).await {
        Ok(record) => {
            info!(
                event_name = "server.ask.answered",
                correlation_id = %correlation_id,
                can_answer = record.can_answer.unwrap_or(false),
                "workflow produced an answer"
            );
            let answer = record.answer.unwrap_or_else(|| "No answer was produced.".to_string());
            Ok(Json(AskResponse { answer }))
        }
        Err(workflow_error) => {
            error!(
                event_name = "server.ask.failed",
                correlation_id = %correlation_id,
                error = %workflow_error,
                "workflow failed"
            );

            let application_error = match &workflow_error {
                WorkflowError::Completion(inner) => {
                    ApplicationError::Completion(inner.to_string())
                }
                WorkflowError::Template(inner) => {
                    ApplicationError::Configuration(inner.to_string())
                }
            };
            let interface = application_error.into_interface(correlation_id);
            let status = match &interface {
                InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };

            Err((
                status,
                Json(AskErrorResponse {
                    error: interface.user_message().to_string(),
                    correlation_id: interface.correlation_id().to_string(),
                }),
            ))
        }
    }
}
