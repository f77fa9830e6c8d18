//! HTTP request handlers for the salary grading API.
//!
//! Every handler generates a correlation id, logs the request on entry and
//! exit, and maps [`EngineError`]s onto JSON error bodies through
//! [`ApiErrorResponse`].

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculation::{ScenarioMetrics, calculate_grades, parse_decimal, validate_inputs};
use crate::error::EngineError;
use crate::models::{DisplayGradeRow, GradePoint, GradeTable};
use crate::repository::NewScenario;

use super::request::{Actor, CalculateRequest, ListParams, SaveDraftRequest};
use super::response::{ApiError, ApiErrorResponse, CalculateFailure, CalculateResponse};
use super::state::AppState;

type HandlerResult = Result<Response, ApiErrorResponse>;

/// Creates the API router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/position-levels", get(position_levels_handler))
        .route("/grading-systems/:system/structure", get(structure_handler))
        .route("/grading-systems/:system/calculate", post(calculate_handler))
        .route(
            "/grading-systems/:system/scenarios",
            post(save_draft_handler).get(list_scenarios_handler),
        )
        .route(
            "/grading-systems/:system/scenarios/current",
            get(current_scenario_handler),
        )
        .route("/grading-systems/:system/history", get(system_history_handler))
        .route("/scenarios/:id", get(get_scenario_handler))
        .route("/scenarios/:id/history", get(scenario_history_handler))
        .route("/scenarios/:id/comparison", get(comparison_handler))
        .route("/scenarios/:id/calculate", post(recalculate_handler))
        .route("/scenarios/:id/apply", post(apply_handler))
        .route("/scenarios/:id/archive", post(archive_handler))
        .route("/scenarios/:id/duplicate", post(duplicate_handler))
        .with_state(state)
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        Json(body),
    )
        .into_response()
}

/// Logs an engine failure and converts it for the client.
fn failure(correlation_id: Uuid, err: EngineError) -> ApiErrorResponse {
    warn!(correlation_id = %correlation_id, error = %err, "Request failed");
    err.into()
}

fn json_rejection(correlation_id: Uuid, rejection: JsonRejection) -> ApiErrorResponse {
    let error = match rejection {
        JsonRejection::JsonDataError(err) => {
            // The body text carries serde's detailed message.
            let body_text = err.body_text();
            warn!(
                correlation_id = %correlation_id,
                error = %body_text,
                "JSON data error"
            );
            if body_text.contains("missing field") {
                ApiError::validation_error(body_text)
            } else {
                ApiError::malformed_json(body_text)
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            warn!(
                correlation_id = %correlation_id,
                error = %err,
                "JSON syntax error"
            );
            ApiError::malformed_json(format!("Invalid JSON syntax: {}", err))
        }
        JsonRejection::MissingJsonContentType(_) => {
            ApiError::new("MISSING_CONTENT_TYPE", "Content-Type must be application/json")
        }
        _ => ApiError::malformed_json("Failed to parse request body"),
    };
    ApiErrorResponse::bad_request(error)
}

fn scenario_id(
    correlation_id: Uuid,
    path: Result<Path<Uuid>, PathRejection>,
) -> Result<Uuid, ApiErrorResponse> {
    path.map(|Path(id)| id).map_err(|rejection| {
        warn!(correlation_id = %correlation_id, error = %rejection, "Invalid scenario id");
        ApiErrorResponse::bad_request(ApiError::with_details(
            "INVALID_SCENARIO_ID",
            "Scenario id must be a UUID",
            rejection.body_text(),
        ))
    })
}

/// True when the client's grades equal the server's, treating blank points as zero.
fn client_outputs_match(client: &Value, grades: &GradeTable) -> bool {
    let Some(levels) = client.as_object() else {
        return false;
    };
    grades.iter().all(|(level, row)| {
        let Some(points) = levels.get(level).and_then(Value::as_object) else {
            return false;
        };
        GradePoint::ALL.iter().all(|&point| {
            let supplied = points
                .get(point.label())
                .and_then(parse_decimal)
                .unwrap_or(Decimal::ZERO);
            supplied == row.get(point)
        })
    })
}

/// Handler for GET /position-levels.
async fn position_levels_handler(State(state): State<AppState>) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, "Listing position levels");
    let levels = state
        .repository()
        .hierarchy()
        .list_active_levels()
        .map_err(|err| failure(correlation_id, err))?;
    info!(correlation_id = %correlation_id, levels = levels.len(), "Listed position levels");
    Ok(json_response(StatusCode::OK, levels))
}

/// Handler for GET /grading-systems/:system/structure.
async fn structure_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, "Fetching current structure");
    let system = state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    let structure = state
        .repository()
        .current_structure(&system)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        grading_system = %system,
        rows = structure.rows.len(),
        "Served current structure"
    );
    Ok(json_response(StatusCode::OK, structure))
}

/// Handler for POST /grading-systems/:system/calculate.
///
/// Validates the submitted rates and returns the derived grades without
/// storing anything. Validation failures answer `{ errors, success: false }`.
async fn calculate_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, "Processing calculation request");

    state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    let Json(request) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;

    let start_time = Instant::now();
    let levels = state
        .repository()
        .hierarchy()
        .list_active_levels()
        .map_err(|err| failure(correlation_id, err))?;

    let inputs = match validate_inputs(
        &request.base_value,
        &request.rates,
        request.global_horizontal_intervals.as_ref(),
        &levels,
    ) {
        Ok(inputs) => inputs,
        Err(EngineError::Validation { errors }) => {
            warn!(
                correlation_id = %correlation_id,
                error_count = errors.len(),
                "Calculation inputs failed validation"
            );
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                CalculateFailure {
                    errors,
                    success: false,
                },
            ));
        }
        Err(err) => return Err(failure(correlation_id, err)),
    };

    let calculation = calculate_grades(inputs.base_value, &levels, &inputs.rates)
        .map_err(|err| failure(correlation_id, err))?;
    let metrics = ScenarioMetrics::from_rates(&calculation.level_order, &inputs.rates);

    info!(
        correlation_id = %correlation_id,
        levels = calculation.level_order.len(),
        duration_us = start_time.elapsed().as_micros(),
        "Calculation completed successfully"
    );

    Ok(json_response(
        StatusCode::OK,
        CalculateResponse {
            calculated_outputs: calculation
                .grades
                .into_iter()
                .map(|(level, row)| (level, DisplayGradeRow::from(row)))
                .collect(),
            level_order: calculation.level_order,
            metrics,
            success: true,
        },
    ))
}

/// Handler for POST /grading-systems/:system/scenarios.
///
/// Stores a DRAFT scenario whose grades are recalculated on the server.
async fn save_draft_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
    Actor(actor): Actor,
    payload: Result<Json<SaveDraftRequest>, JsonRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, actor = %actor, "Saving draft scenario");

    let system = state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    let Json(request) = payload.map_err(|rejection| json_rejection(correlation_id, rejection))?;

    let levels = state
        .repository()
        .hierarchy()
        .list_active_levels()
        .map_err(|err| failure(correlation_id, err))?;
    let inputs = validate_inputs(
        &request.base_value,
        &request.rates,
        request.global_horizontal_intervals.as_ref(),
        &levels,
    )
    .map_err(|err| failure(correlation_id, err))?;

    let scenario = state
        .repository()
        .save_draft(
            NewScenario {
                grading_system_id: system,
                name: request.name,
                description: request.description,
                base_value: inputs.base_value,
                level_order: request.level_order,
                rate_inputs: inputs.rates,
                global_horizontal_intervals: inputs.global_horizontal_intervals,
            },
            &actor,
        )
        .map_err(|err| failure(correlation_id, err))?;

    if let (Some(client), Some(grades)) = (&request.calculated_outputs, &scenario.calculated_grades) {
        if !client_outputs_match(client, grades) {
            warn!(
                correlation_id = %correlation_id,
                scenario_id = %scenario.id,
                "Submitted outputs differ from the server calculation; stored the server result"
            );
        }
    }

    info!(correlation_id = %correlation_id, scenario_id = %scenario.id, "Draft scenario saved");
    Ok(json_response(StatusCode::CREATED, scenario))
}

/// Handler for GET /grading-systems/:system/scenarios.
async fn list_scenarios_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, "Listing scenarios");
    let system = state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    let Query(params) = params.map_err(|rejection| {
        warn!(correlation_id = %correlation_id, error = %rejection, "Invalid query string");
        ApiErrorResponse::bad_request(ApiError::validation_error(rejection.body_text()))
    })?;

    let query = params
        .into_query(state.config().service())
        .map_err(|err| failure(correlation_id, err))?;
    let page = state
        .repository()
        .list(&system, &query)
        .map_err(|err| failure(correlation_id, err))?;

    info!(
        correlation_id = %correlation_id,
        grading_system = %system,
        total = page.total,
        "Listed scenarios"
    );
    Ok(json_response(StatusCode::OK, page))
}

/// Handler for GET /grading-systems/:system/scenarios/current.
async fn current_scenario_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, "Fetching current scenario");
    let system = state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    match state
        .repository()
        .current_scenario(&system)
        .map_err(|err| failure(correlation_id, err))?
    {
        Some(scenario) => {
            info!(
                correlation_id = %correlation_id,
                scenario_id = %scenario.id,
                "Served current scenario"
            );
            Ok(json_response(StatusCode::OK, scenario))
        }
        None => {
            warn!(correlation_id = %correlation_id, grading_system = %system, "No current scenario");
            Err(ApiErrorResponse::not_found(ApiError::new(
                "NO_CURRENT_SCENARIO",
                format!("Grading system '{}' has no current scenario", system),
            )))
        }
    }
}

/// Handler for GET /grading-systems/:system/history.
async fn system_history_handler(
    State(state): State<AppState>,
    Path(system): Path<String>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    info!(correlation_id = %correlation_id, grading_system = %system, "Fetching system history");
    let system = state
        .grading_system(&system)
        .map_err(|err| failure(correlation_id, err))?;
    let history = state
        .repository()
        .system_history(&system)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        grading_system = %system,
        entries = history.len(),
        "Served system history"
    );
    Ok(json_response(StatusCode::OK, history))
}

/// Handler for GET /scenarios/:id.
async fn get_scenario_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, "Fetching scenario");
    let scenario = state
        .repository()
        .get(id)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        scenario_id = %id,
        status = ?scenario.status,
        "Served scenario"
    );
    Ok(json_response(StatusCode::OK, scenario))
}

/// Handler for GET /scenarios/:id/history.
async fn scenario_history_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, "Fetching scenario history");
    let history = state
        .repository()
        .history(id)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        scenario_id = %id,
        entries = history.len(),
        "Served scenario history"
    );
    Ok(json_response(StatusCode::OK, history))
}

/// Handler for GET /scenarios/:id/comparison.
async fn comparison_handler(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, "Comparing scenario");
    let comparison = state
        .repository()
        .comparison(id)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        scenario_id = %id,
        risk_level = ?comparison.risk_level,
        "Compared scenario with current structure"
    );
    Ok(json_response(StatusCode::OK, comparison))
}

/// Handler for POST /scenarios/:id/calculate.
async fn recalculate_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, actor = %actor, "Recalculating scenario");
    let start_time = Instant::now();
    let scenario = state
        .repository()
        .calculate(id, &actor)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        scenario_id = %id,
        duration_us = start_time.elapsed().as_micros(),
        "Scenario recalculated"
    );
    Ok(json_response(StatusCode::OK, scenario))
}

/// Handler for POST /scenarios/:id/apply.
async fn apply_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, actor = %actor, "Applying scenario");
    let scenario = state
        .repository()
        .apply(id, &actor)
        .map_err(|err| failure(correlation_id, err))?;
    info!(correlation_id = %correlation_id, scenario_id = %id, "Scenario applied");
    Ok(json_response(StatusCode::OK, scenario))
}

/// Handler for POST /scenarios/:id/archive.
async fn archive_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, actor = %actor, "Archiving scenario");
    let scenario = state
        .repository()
        .archive(id, &actor)
        .map_err(|err| failure(correlation_id, err))?;
    info!(correlation_id = %correlation_id, scenario_id = %id, "Scenario archived");
    Ok(json_response(StatusCode::OK, scenario))
}

/// Handler for POST /scenarios/:id/duplicate.
async fn duplicate_handler(
    State(state): State<AppState>,
    Actor(actor): Actor,
    path: Result<Path<Uuid>, PathRejection>,
) -> HandlerResult {
    let correlation_id = Uuid::new_v4();
    let id = scenario_id(correlation_id, path)?;
    info!(correlation_id = %correlation_id, scenario_id = %id, actor = %actor, "Duplicating scenario");
    let scenario = state
        .repository()
        .duplicate(id, &actor)
        .map_err(|err| failure(correlation_id, err))?;
    info!(
        correlation_id = %correlation_id,
        source_scenario_id = %id,
        scenario_id = %scenario.id,
        "Scenario duplicated"
    );
    Ok(json_response(StatusCode::CREATED, scenario))
}
