use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use metrics::counter;
use tracing::{error, info};

use reactivities_core::types::{Activity, NewActivity};
use reactivities_storage::ActivityError;

use crate::problem::ProblemResponse;
use crate::router::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list).post(create))
        .route("/activities/:id", get(details).put(edit).delete(remove))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Activity>>, ProblemResponse> {
    let activities = state
        .storage()
        .activities()
        .list()
        .await
        .map_err(|err| store_failure("list", err))?;

    track("list", "ok");
    Ok(Json(activities))
}

async fn details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Activity>, ProblemResponse> {
    let activity = state
        .storage()
        .activities()
        .fetch(&id)
        .await
        .map_err(|err| store_failure("details", err))?
        .ok_or_else(|| missing("details", &id))?;

    track("details", "ok");
    Ok(Json(activity))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewActivity>, JsonRejection>,
) -> Result<(StatusCode, Json<Activity>), ProblemResponse> {
    let Json(changes) = payload.map_err(|err| invalid_payload("create", err))?;
    let activity = state
        .storage()
        .activities()
        .insert(changes)
        .await
        .map_err(|err| store_failure("create", err))?;

    info!(stage = "api", id = %activity.id, "activity created");
    track("create", "ok");
    Ok((StatusCode::CREATED, Json(activity)))
}

async fn edit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NewActivity>, JsonRejection>,
) -> Result<Json<Activity>, ProblemResponse> {
    let Json(changes) = payload.map_err(|err| invalid_payload("edit", err))?;
    let activity = state
        .storage()
        .activities()
        .update(&id, changes)
        .await
        .map_err(|err| store_failure("edit", err))?
        .ok_or_else(|| missing("edit", &id))?;

    track("edit", "ok");
    Ok(Json(activity))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ProblemResponse> {
    let deleted = state
        .storage()
        .activities()
        .delete(&id)
        .await
        .map_err(|err| store_failure("delete", err))?;
    if !deleted {
        return Err(missing("delete", &id));
    }

    info!(stage = "api", %id, "activity deleted");
    track("delete", "ok");
    Ok(StatusCode::NO_CONTENT)
}

fn track(op: &'static str, result: &'static str) {
    counter!("api_activities_requests_total", "op" => op, "result" => result).increment(1);
}

fn store_failure(op: &'static str, err: ActivityError) -> ProblemResponse {
    error!(stage = "api", op, error = %err, "activity store request failed");
    track(op, "error");
    ProblemResponse::from(&err)
}

fn missing(op: &'static str, id: &str) -> ProblemResponse {
    track(op, "not_found");
    ProblemResponse::not_found("activity_not_found", format!("no activity with id {id}"))
}

fn invalid_payload(op: &'static str, err: JsonRejection) -> ProblemResponse {
    track(op, "invalid");
    ProblemResponse::new(err.status(), "invalid_payload", err.body_text())
}
