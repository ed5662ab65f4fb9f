//! Handlers for starting pipeline runs and querying their status.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderName, StatusCode};
use axum::Json;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use tabrun_core::error::CoreError;
use tabrun_core::job::{InstanceId, JobDescriptor};
use tabrun_pipeline::InstanceStatus;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Path the status of an instance is served under.
const STATUS_PATH: &str = "/api/v1/orchestrations";

/// Everything outside the RFC 3986 unreserved set.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Body of a successful start request.
#[derive(Debug, Serialize)]
pub struct StartedOrchestration {
    pub id: InstanceId,
    /// Relative URI to poll for the instance's status.
    pub status_query_uri: String,
}

/// `202 Accepted` with `Location` and the started instance.
type StartResponse = (
    StatusCode,
    [(HeaderName, String); 1],
    Json<DataResponse<StartedOrchestration>>,
);

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /orchestrations
///
/// Validate the job descriptor and start a pipeline run. Responds `202` with
/// a `Location` header pointing at the status endpoint, `409` while a run for
/// the same server and model is still in flight.
pub async fn start_orchestration(
    State(state): State<AppState>,
    payload: Result<Json<JobDescriptor>, JsonRejection>,
) -> AppResult<StartResponse> {
    let Json(descriptor) = payload?;

    let id = state.orchestrator.start(descriptor).await?;
    let status_query_uri = status_uri(&id);

    Ok((
        StatusCode::ACCEPTED,
        [(LOCATION, status_query_uri.clone())],
        Json(DataResponse {
            data: StartedOrchestration {
                id,
                status_query_uri,
            },
        }),
    ))
}

/// GET /orchestrations
///
/// Status snapshots of every known instance.
pub async fn list_orchestrations(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<InstanceStatus>>>> {
    let instances = state.orchestrator.registry().list().await;
    Ok(Json(DataResponse { data: instances }))
}

/// GET /orchestrations/{id}
pub async fn get_orchestration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<InstanceStatus>>> {
    let instance_id = InstanceId::from_raw(id);
    let status = state
        .orchestrator
        .status(&instance_id)
        .await
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Orchestration",
                id: instance_id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: status }))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn status_uri(id: &InstanceId) -> String {
    format!("{STATUS_PATH}/{}", encode_path_segment(id.as_str()))
}

fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ids_are_unchanged() {
        assert_eq!(
            status_uri(&InstanceId::derive("srv1", "m1")),
            "/api/v1/orchestrations/Process-srv1-m1"
        );
    }

    #[test]
    fn reserved_characters_are_escaped() {
        assert_eq!(encode_path_segment("Sales Model/v2"), "Sales%20Model%2Fv2");
        assert_eq!(encode_path_segment("ü"), "%C3%BC");
    }

    #[test]
    fn escaped_ids_keep_their_tildes() {
        let id = InstanceId::derive("a-b", "c");
        assert_eq!(status_uri(&id), "/api/v1/orchestrations/Process-a~-b-c");
    }
}
