use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdf_answer_core::{AnswerRecord, DocumentSource, QueryError};
use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::server::AppState;

pub(crate) const RUN_ENDPOINT: &str = "/hackrx/run";
const SERVICE_NAME: &str = "pdf-answer";

#[derive(Debug, Deserialize)]
pub(crate) struct RunRequest {
    pub documents: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct AnswerItem {
    pub answer: String,
    pub justification: String,
}

impl From<AnswerRecord> for AnswerItem {
    fn from(record: AnswerRecord) -> Self {
        Self {
            answer: record.answer,
            justification: record.justification,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RunResponse {
    pub answers: Vec<AnswerItem>,
}

#[derive(Serialize)]
struct RootResponse {
    message: &'static str,
    version: &'static str,
    endpoint: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    uptime_secs: u64,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Maps a failed batch to a status code and a `{ "detail": .. }` body.
#[derive(Debug)]
pub(crate) struct ApiError(pub QueryError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            QueryError::Document(_) | QueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            QueryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub(crate) async fn run_handler(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "run",
        %request_id,
        question_count = request.questions.len()
    );

    async move {
        if request.documents.trim().is_empty() {
            let reason = "documents must not be empty".to_string();
            return Err(ApiError(QueryError::InvalidRequest(reason)));
        }
        // remote callers never get to name files on this host
        if let Err(error) = DocumentSource::parse_remote(&request.documents) {
            warn!(error = %error, "run request rejected");
            return Err(ApiError(QueryError::Document(error)));
        }

        info!(document = %request.documents, "run request received");
        let records = match state
            .orchestrator
            .run(&request.documents, &request.questions)
            .await
        {
            Ok(records) => records,
            Err(error) => {
                match &error {
                    QueryError::Config(_) => error!(error = %error, "run request failed"),
                    _ => warn!(error = %error, "run request rejected"),
                }
                return Err(ApiError(error));
            }
        };

        let failed = records.iter().filter(|record| record.synthesis_failed).count();
        info!(answer_count = records.len(), failed, "run request answered");

        Ok(Json(RunResponse {
            answers: records.into_iter().map(AnswerItem::from).collect(),
        }))
    }
    .instrument(span)
    .await
}

pub(crate) async fn root_handler() -> impl IntoResponse {
    Json(RootResponse {
        message: "PDF question answering service",
        version: env!("CARGO_PKG_VERSION"),
        endpoint: RUN_ENDPOINT,
    })
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: SERVICE_NAME,
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
