// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]
#![allow(clippy::multiple_crate_versions)]

mod fixtures;
mod live;

use axum::{
    Json, Router,
    extract::{Path, Query, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use crudeline::{
    BoardSnapshot, Clock, Command, CommandOutcome, CoreError, DEFAULT_EVENT_BUFFER, Engine,
    EntityRef, LedgerSnapshot, LevelBoard, RecomputationTrigger, Record, SystemClock,
    WorkflowView,
};
use crudeline_audit::{Actor, AuditEvent, AuditSubject, Cause};
use crudeline_domain::{
    DomainError, Operation, OperationEdits, OperationId, OperationKind, RefiningRun,
    RefiningRunId, SectionEstimate, Tank, TankEstimate, TankId, Tower, TowerId, TransitionError,
    WorkflowState,
};
use fixtures::Fixtures;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Crudeline Server - HTTP server for refinery receptions, dispatches, and tank levels
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Port to bind the server to
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Recompute events buffered per subscriber before it must resync
    #[arg(long, default_value_t = DEFAULT_EVENT_BUFFER)]
    event_buffer: usize,

    /// JSON file with the tanks, towers, and seed records to load at startup
    #[arg(short, long)]
    fixtures: Option<PathBuf>,
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    /// The lifecycle engine holding the ledger.
    engine: Arc<Engine>,
    /// Cached figures for every tank and tower known at startup.
    board: Arc<LevelBoard>,
}

impl AppState {
    /// Wraps `engine` and attaches a level board to its current tanks and towers.
    fn new(engine: Arc<Engine>) -> Result<Self, CoreError> {
        let entities: Vec<EntityRef> = engine
            .tanks()
            .iter()
            .map(|tank| EntityRef::Tank(tank.id))
            .chain(engine.towers().iter().map(|tower| EntityRef::Tower(tower.id)))
            .collect();
        let board: LevelBoard = LevelBoard::attach(&engine, &entities)?;
        Ok(Self {
            engine,
            board: Arc::new(board),
        })
    }
}

/// API request for creating a reception or dispatch.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct CreateOperationApiRequest {
    /// The actor ID performing this action.
    actor_id: String,
    /// The type of the actor.
    actor_type: String,
    /// The cause ID for this action.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// The operation, in its initial state.
    operation: Operation,
}

/// API request for moving an operation to another workflow state.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct TransitionApiRequest {
    /// The actor ID performing this action.
    actor_id: String,
    /// The type of the actor.
    actor_type: String,
    /// The cause ID for this action.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// Target state as `transport:<state>` or `load:<state>`.
    target: String,
    /// Field values captured by the form, applied with the transition.
    #[serde(default)]
    edits: OperationEdits,
}

/// API request for soft-deleting or restoring an operation or refining run.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct SetActiveApiRequest {
    /// The actor ID performing this action.
    actor_id: String,
    /// The type of the actor.
    actor_type: String,
    /// The cause ID for this action.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// Whether the record counts towards tank levels.
    active: bool,
}

/// API request for recording a refining run.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct RecordRefiningRunApiRequest {
    /// The actor ID performing this action.
    actor_id: String,
    /// The type of the actor.
    actor_type: String,
    /// The cause ID for this action.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// The run to record.
    run: RefiningRun,
}

/// API request for correcting a recorded refining run.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct UpdateRefiningRunApiRequest {
    /// The actor ID performing this action.
    actor_id: String,
    /// The type of the actor.
    actor_type: String,
    /// The cause ID for this action.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// The corrected run; its id must match the path.
    run: RefiningRun,
}

/// Query parameters for listing operations.
#[derive(Debug, Deserialize)]
struct ListOperationsQuery {
    /// Only operations of this kind (`reception` or `dispatch`).
    kind: Option<String>,
    /// Include soft-deleted operations.
    #[serde(default)]
    include_inactive: bool,
}

/// Query parameters for the audit log.
#[derive(Debug, Deserialize)]
struct AuditQuery {
    /// Only events about this operation.
    operation_id: Option<i64>,
    /// Only events about this refining run.
    refining_run_id: Option<i64>,
}

/// API response for an accepted command.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct CommandApiResponse {
    /// Whether the command was accepted.
    success: bool,
    /// A human-readable message.
    message: String,
    /// Audit event ID, absent when nothing changed.
    event_id: Option<u64>,
    /// Sequence of the recompute the command published, if any.
    sequence: Option<u64>,
    /// Tanks and towers whose figures changed.
    affected: Vec<EntityRef>,
    /// The operation after the command, for operation commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<Operation>,
    /// The recorded run, for refining run commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    refining_run: Option<RefiningRun>,
}

/// API response for an audit event.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct AuditEventResponse {
    /// Position in the audit log.
    event_id: Option<u64>,
    /// The record the event is about.
    subject: String,
    /// The actor ID.
    actor_id: String,
    /// The actor type.
    actor_type: String,
    /// The cause ID.
    cause_id: String,
    /// The cause description.
    cause_description: String,
    /// The action name.
    action: String,
    /// Optional action details.
    details: Option<String>,
    /// Record summary before the change.
    before: String,
    /// Record summary after the change.
    after: String,
    /// When the change was accepted (RFC 3339).
    occurred_at: String,
}

/// API error response.
#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    /// Error indicator.
    error: bool,
    /// Error message.
    message: String,
    /// Every reason a transition was rejected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    violations: Vec<TransitionError>,
}

/// HTTP error wrapper that implements `IntoResponse`.
struct HttpError {
    /// The HTTP status code.
    status: StatusCode,
    /// The error message.
    message: String,
    /// Transition violations, if any.
    violations: Vec<TransitionError>,
}

impl HttpError {
    const fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
            violations: Vec::new(),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body: Json<ErrorResponse> = Json(ErrorResponse {
            error: true,
            message: self.message,
            violations: self.violations,
        });
        (self.status, body).into_response()
    }
}

impl From<CoreError> for HttpError {
    fn from(err: CoreError) -> Self {
        let status: StatusCode = match &err {
            CoreError::OperationNotFound(_)
            | CoreError::TankNotFound(_)
            | CoreError::TowerNotFound(_)
            | CoreError::RefiningRunNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::DuplicateOperation(_) | CoreError::DuplicateRefiningRun(_) => {
                StatusCode::CONFLICT
            }
            CoreError::DomainViolation(_) | CoreError::TransitionRejected { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::NoRuntime => {
                error!(error = %err, "Engine error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let violations: Vec<TransitionError> = match &err {
            CoreError::TransitionRejected { errors, .. } => errors.clone(),
            _ => Vec::new(),
        };
        Self {
            status,
            message: err.to_string(),
            violations,
        }
    }
}

impl From<DomainError> for HttpError {
    fn from(err: DomainError) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// Builds the actor and cause of a request, rejecting blank identifiers.
fn attribution(
    actor_id: String,
    actor_type: String,
    cause_id: String,
    cause_description: String,
) -> Result<(Actor, Cause), HttpError> {
    if actor_id.trim().is_empty() {
        return Err(HttpError::bad_request(String::from(
            "actor_id must not be empty",
        )));
    }
    if cause_id.trim().is_empty() {
        return Err(HttpError::bad_request(String::from(
            "cause_id must not be empty",
        )));
    }
    Ok((
        Actor::new(actor_id, actor_type),
        Cause::new(cause_id, cause_description),
    ))
}

/// Converts a `CommandOutcome` to a `CommandApiResponse`.
fn outcome_to_response(outcome: CommandOutcome) -> CommandApiResponse {
    let message: String = outcome
        .audit_event
        .as_ref()
        .map_or_else(
            || String::from("No change"),
            |event| {
                event
                    .action
                    .details
                    .clone()
                    .unwrap_or_else(|| event.action.name.clone())
            },
        );
    let event_id: Option<u64> = outcome.audit_event.as_ref().and_then(|event| event.event_id);
    let (operation, refining_run) = match outcome.record {
        Record::Operation(operation) => (Some(operation), None),
        Record::RefiningRun(run) => (None, Some(run)),
    };

    CommandApiResponse {
        success: true,
        message,
        event_id,
        sequence: outcome.sequence,
        affected: outcome.affected,
        operation,
        refining_run,
    }
}

/// Converts an `AuditEvent` to an `AuditEventResponse`.
fn audit_event_to_response(event: &AuditEvent) -> AuditEventResponse {
    AuditEventResponse {
        event_id: event.event_id,
        subject: event.subject.to_string(),
        actor_id: event.actor.id.clone(),
        actor_type: event.actor.actor_type.clone(),
        cause_id: event.cause.id.clone(),
        cause_description: event.cause.description.clone(),
        action: event.action.name.clone(),
        details: event.action.details.clone(),
        before: event.before.data.clone(),
        after: event.after.data.clone(),
        occurred_at: event
            .occurred_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| String::from("unknown")),
    }
}

/// Handler for GET `/tanks` endpoint.
async fn handle_list_tanks(AxumState(app_state): AxumState<AppState>) -> Json<Vec<Tank>> {
    info!("Handling list_tanks request");
    Json(app_state.engine.tanks())
}

/// Handler for GET `/tanks/estimates` endpoint.
///
/// Computes the estimate of every active tank at the current time.
async fn handle_list_tank_estimates(
    AxumState(app_state): AxumState<AppState>,
) -> Json<Vec<TankEstimate>> {
    info!("Handling list_tank_estimates request");
    Json(app_state.engine.tank_estimates())
}

/// Handler for GET `/tanks/{tank_id}/estimate` endpoint.
async fn handle_get_tank_estimate(
    AxumState(app_state): AxumState<AppState>,
    Path(tank_id): Path<i64>,
) -> Result<Json<TankEstimate>, HttpError> {
    info!(tank_id = tank_id, "Handling get_tank_estimate request");
    Ok(Json(app_state.engine.tank_estimate(TankId(tank_id))?))
}

/// Handler for GET `/towers` endpoint.
async fn handle_list_towers(AxumState(app_state): AxumState<AppState>) -> Json<Vec<Tower>> {
    info!("Handling list_towers request");
    Json(app_state.engine.towers())
}

/// Handler for GET `/towers/{tower_id}/throughput` endpoint.
async fn handle_get_tower_throughput(
    AxumState(app_state): AxumState<AppState>,
    Path(tower_id): Path<i64>,
) -> Result<Json<Vec<SectionEstimate>>, HttpError> {
    info!(tower_id = tower_id, "Handling get_tower_throughput request");
    Ok(Json(app_state.engine.tower_throughput(TowerId(tower_id))?))
}

/// Handler for GET `/operations` endpoint.
///
/// Soft-deleted operations are left out unless `include_inactive` is set.
async fn handle_list_operations(
    AxumState(app_state): AxumState<AppState>,
    Query(query): Query<ListOperationsQuery>,
) -> Result<Json<Vec<Operation>>, HttpError> {
    info!(
        kind = ?query.kind,
        include_inactive = query.include_inactive,
        "Handling list_operations request"
    );

    let kind: Option<OperationKind> = query
        .kind
        .as_deref()
        .map(str::parse::<OperationKind>)
        .transpose()?;

    let operations: Vec<Operation> = app_state
        .engine
        .operations()
        .into_iter()
        .filter(|operation| query.include_inactive || operation.is_active())
        .filter(|operation| kind.is_none_or(|kind| operation.kind() == kind))
        .collect();

    Ok(Json(operations))
}

/// Handler for POST `/operations` endpoint.
async fn handle_create_operation(
    AxumState(app_state): AxumState<AppState>,
    Json(req): Json<CreateOperationApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        operation_id = %req.operation.id(),
        kind = %req.operation.kind(),
        "Handling create_operation request"
    );

    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome = app_state.engine.execute(
        Command::CreateOperation {
            operation: req.operation,
        },
        actor,
        cause,
    )?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for GET `/operations/{operation_id}` endpoint.
async fn handle_get_operation(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<i64>,
) -> Result<Json<Operation>, HttpError> {
    info!(operation_id = operation_id, "Handling get_operation request");

    let id: OperationId = OperationId(operation_id);
    let operation: Operation = app_state
        .engine
        .operation(id)
        .ok_or(CoreError::OperationNotFound(id))?;
    Ok(Json(operation))
}

/// Handler for POST `/operations/{operation_id}/transitions` endpoint.
///
/// A rejected transition answers 422 with every violation listed.
async fn handle_transition_operation(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<i64>,
    Json(req): Json<TransitionApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        operation_id = operation_id,
        target = %req.target,
        "Handling transition request"
    );

    let target: WorkflowState = req.target.parse()?;
    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome = app_state.engine.execute(
        Command::Transition {
            operation_id: OperationId(operation_id),
            target,
            edits: req.edits,
        },
        actor,
        cause,
    )?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for POST `/operations/{operation_id}/active` endpoint.
async fn handle_set_operation_active(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<i64>,
    Json(req): Json<SetActiveApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        operation_id = operation_id,
        active = req.active,
        "Handling set_operation_active request"
    );

    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome = app_state.engine.execute(
        Command::SetOperationActive {
            operation_id: OperationId(operation_id),
            active: req.active,
        },
        actor,
        cause,
    )?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for GET `/operations/{operation_id}/workflow` endpoint.
///
/// Returns the stepper, next states with their missing fields, and the
/// fields a form may edit right now.
async fn handle_get_workflow(
    AxumState(app_state): AxumState<AppState>,
    Path(operation_id): Path<i64>,
) -> Result<Json<WorkflowView>, HttpError> {
    info!(operation_id = operation_id, "Handling get_workflow request");
    Ok(Json(app_state.engine.workflow(OperationId(operation_id))?))
}

/// Handler for GET `/refining_runs` endpoint.
async fn handle_list_refining_runs(
    AxumState(app_state): AxumState<AppState>,
) -> Json<Vec<RefiningRun>> {
    info!("Handling list_refining_runs request");
    Json(app_state.engine.refining_runs())
}

/// Handler for POST `/refining_runs` endpoint.
async fn handle_record_refining_run(
    AxumState(app_state): AxumState<AppState>,
    Json(req): Json<RecordRefiningRunApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        run_id = %req.run.id,
        tower_id = %req.run.tower_reference,
        "Handling record_refining_run request"
    );

    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome =
        app_state
            .engine
            .execute(Command::RecordRefiningRun { run: req.run }, actor, cause)?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for POST `/refining_runs/{run_id}` endpoint.
async fn handle_update_refining_run(
    AxumState(app_state): AxumState<AppState>,
    Path(run_id): Path<i64>,
    Json(req): Json<UpdateRefiningRunApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        run_id = run_id,
        "Handling update_refining_run request"
    );

    if req.run.id != RefiningRunId(run_id) {
        return Err(HttpError::bad_request(format!(
            "Run id {} does not match path id {run_id}",
            req.run.id
        )));
    }
    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome =
        app_state
            .engine
            .execute(Command::UpdateRefiningRun { run: req.run }, actor, cause)?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for POST `/refining_runs/{run_id}/active` endpoint.
async fn handle_set_refining_run_active(
    AxumState(app_state): AxumState<AppState>,
    Path(run_id): Path<i64>,
    Json(req): Json<SetActiveApiRequest>,
) -> Result<Json<CommandApiResponse>, HttpError> {
    info!(
        actor_id = %req.actor_id,
        run_id = run_id,
        active = req.active,
        "Handling set_refining_run_active request"
    );

    let (actor, cause) = attribution(
        req.actor_id,
        req.actor_type,
        req.cause_id,
        req.cause_description,
    )?;
    let outcome: CommandOutcome = app_state.engine.execute(
        Command::SetRefiningRunActive {
            run_id: RefiningRunId(run_id),
            active: req.active,
        },
        actor,
        cause,
    )?;

    Ok(Json(outcome_to_response(outcome)))
}

/// Handler for GET `/audit` endpoint.
///
/// Returns the whole audit trail, or the trail of one operation or run.
async fn handle_get_audit_log(
    AxumState(app_state): AxumState<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditEventResponse>>, HttpError> {
    info!(
        operation_id = ?query.operation_id,
        refining_run_id = ?query.refining_run_id,
        "Handling get_audit_log request"
    );

    let events: Vec<AuditEvent> = match (query.operation_id, query.refining_run_id) {
        (None, None) => app_state.engine.audit_log(),
        (Some(id), None) => app_state
            .engine
            .audit_for(AuditSubject::Operation(OperationId(id))),
        (None, Some(id)) => app_state
            .engine
            .audit_for(AuditSubject::RefiningRun(RefiningRunId(id))),
        (Some(_), Some(_)) => {
            return Err(HttpError::bad_request(String::from(
                "Filter by operation_id or refining_run_id, not both",
            )));
        }
    };

    Ok(Json(events.iter().map(audit_event_to_response).collect()))
}

/// Handler for GET `/snapshot` endpoint.
async fn handle_get_snapshot(AxumState(app_state): AxumState<AppState>) -> Json<LedgerSnapshot> {
    info!("Handling get_snapshot request");
    Json(app_state.engine.snapshot())
}

/// Handler for GET `/dashboard` endpoint.
///
/// Serves the level board's cached figures without recomputing anything.
async fn handle_get_dashboard(AxumState(app_state): AxumState<AppState>) -> Json<BoardSnapshot> {
    info!("Handling get_dashboard request");
    Json(app_state.board.snapshot())
}

/// Builds the application router with all endpoints.
fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/tanks", get(handle_list_tanks))
        .route("/tanks/estimates", get(handle_list_tank_estimates))
        .route("/tanks/{tank_id}/estimate", get(handle_get_tank_estimate))
        .route("/towers", get(handle_list_towers))
        .route(
            "/towers/{tower_id}/throughput",
            get(handle_get_tower_throughput),
        )
        .route("/operations", get(handle_list_operations))
        .route("/operations", post(handle_create_operation))
        .route("/operations/{operation_id}", get(handle_get_operation))
        .route(
            "/operations/{operation_id}/transitions",
            post(handle_transition_operation),
        )
        .route(
            "/operations/{operation_id}/active",
            post(handle_set_operation_active),
        )
        .route(
            "/operations/{operation_id}/workflow",
            get(handle_get_workflow),
        )
        .route("/refining_runs", get(handle_list_refining_runs))
        .route("/refining_runs", post(handle_record_refining_run))
        .route("/refining_runs/{run_id}", post(handle_update_refining_run))
        .route(
            "/refining_runs/{run_id}/active",
            post(handle_set_refining_run_active),
        )
        .route("/audit", get(handle_get_audit_log))
        .route("/snapshot", get(handle_get_snapshot))
        .route("/dashboard", get(handle_get_dashboard))
        .route("/live", get(live::live_events_handler))
        .with_state(app_state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command-line arguments
    let args: Args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Initializing Crudeline Server");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let engine: Arc<Engine> = Arc::new(Engine::new(
        clock,
        RecomputationTrigger::new(args.event_buffer),
    ));

    if let Some(path) = &args.fixtures {
        info!("Loading fixtures from: {}", path.display());
        Fixtures::from_file(path)?.apply(&engine)?;
    } else {
        info!("No fixtures given, starting with an empty plant");
    }

    let app_state: AppState = AppState::new(engine)?;

    // Build router
    let app: Router = build_router(app_state);

    // Bind to address
    let addr: SocketAddr = SocketAddr::new(args.bind, args.port);
    info!("Server listening on {}", addr);

    // Run server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode as HttpStatusCode},
    };
    use crudeline::FixedClock;
    use crudeline_domain::TransportState;
    use serde_json::{Value, json};
    use std::time::Duration as StdDuration;
    use time::{Duration, OffsetDateTime, macros::datetime};
    use tower::ServiceExt;

    const T0: OffsetDateTime = datetime!(2026-03-02 08:00 UTC);

    const PLANT: &str = r#"{
        "tanks": [
            {"id": 1, "name": "TK-1", "capacity": 5000.0, "product_reference": 1, "is_raw_material_storage": true},
            {"id": 2, "name": "TK-2", "capacity": 2000.0, "product_reference": 2, "is_raw_material_storage": false},
            {"id": 3, "name": "TK-3", "capacity": 2000.0, "product_reference": 3, "is_raw_material_storage": false}
        ],
        "towers": [
            {"id": 1, "name": "T-101", "sections": [
                {"id": 1, "order": 1, "product_reference": 2, "operational": true},
                {"id": 2, "order": 2, "product_reference": 3, "operational": true}
            ]}
        ]
    }"#;

    /// Helper to create test app state over a seeded plant and a fixed clock.
    fn create_test_app_state() -> (AppState, Arc<FixedClock>) {
        let clock: Arc<FixedClock> = Arc::new(FixedClock::new(T0));
        let engine: Arc<Engine> = Arc::new(Engine::new(
            Arc::clone(&clock) as Arc<dyn Clock>,
            RecomputationTrigger::new(64),
        ));
        Fixtures::from_json(PLANT).unwrap().apply(&engine).unwrap();
        (AppState::new(engine).unwrap(), clock)
    }

    /// Sends one request and returns the status and JSON body.
    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (HttpStatusCode, Value) {
        let request_body: Body =
            body.map_or_else(Body::empty, |json| Body::from(json.to_string()));
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(request_body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status: HttpStatusCode = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap()
        };
        (status, json)
    }

    fn create_operation_request(id: i64, kind: &str) -> Value {
        json!({
            "actor_id": "op-12",
            "actor_type": "operator",
            "cause_id": "req-1",
            "cause_description": "Truck scheduled",
            "operation": {
                "id": id,
                "kind": kind,
                "contract_reference": {"contract_id": 10, "line_item_id": 100}
            }
        })
    }

    fn transition_request(target: &str, edits: Value) -> Value {
        json!({
            "actor_id": "op-12",
            "actor_type": "operator",
            "cause_id": "req-2",
            "cause_description": "Form submitted",
            "target": target,
            "edits": edits
        })
    }

    async fn transition(app: &Router, id: i64, target: &str, edits: Value) -> CommandApiResponse {
        let (status, body) = send(
            app,
            "POST",
            &format!("/operations/{id}/transitions"),
            Some(transition_request(target, edits)),
        )
        .await;
        assert_eq!(status, HttpStatusCode::OK, "{target} rejected: {body}");
        serde_json::from_value(body).unwrap()
    }

    /// Creates reception `id` into `tank` and walks it to pumping over `start..end`.
    async fn start_pumping_reception(
        app: &Router,
        id: i64,
        tank: i64,
        quantity: f64,
        start: &str,
        end: &str,
    ) {
        let (status, _) = send(
            app,
            "POST",
            "/operations",
            Some(create_operation_request(id, "reception")),
        )
        .await;
        assert_eq!(status, HttpStatusCode::OK);

        transition(
            app,
            id,
            "transport:in_transit",
            json!({"plate_number": "ABC-123", "guide_id": "G-1", "sent_quantity": quantity}),
        )
        .await;
        transition(
            app,
            id,
            "transport:at_facility",
            json!({"tank_reference": tank, "line_reference": 1}),
        )
        .await;
        transition(app, id, "load:sampling_approved", json!({})).await;
        transition(
            app,
            id,
            "load:in_progress",
            json!({"start_timestamp": start, "end_timestamp": end}),
        )
        .await;
    }

    fn refining_run_request() -> Value {
        json!({
            "actor_id": "planner-1",
            "actor_type": "operator",
            "cause_id": "plan-7",
            "cause_description": "Tower charge",
            "run": {
                "id": 3,
                "tower_reference": 1,
                "tank_reference": 1,
                "start_timestamp": "2026-03-02T08:00:00Z",
                "end_timestamp": "2026-03-02T12:00:00Z",
                "total_quantity": 1000.0,
                "outputs": [
                    {"product_reference": 2, "tank_reference": 2, "percentage": 60.0},
                    {"product_reference": 3, "tank_reference": 3, "percentage": 40.0}
                ]
            }
        })
    }

    fn assert_close(actual: &Value, expected: f64) {
        let actual: f64 = actual.as_f64().unwrap();
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[tokio::test]
    async fn test_create_operation_succeeds() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        let (status, body) = send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        assert_eq!(status, HttpStatusCode::OK);
        let response: CommandApiResponse = serde_json::from_value(body).unwrap();
        assert!(response.success);
        assert_eq!(response.event_id, Some(1));
        assert_eq!(response.operation.unwrap().id(), OperationId(7));

        let (status, body) = send(&app, "GET", "/operations/7", None).await;
        assert_eq!(status, HttpStatusCode::OK);
        assert_eq!(body["status"]["transport"], "programmed");
        assert_eq!(body["status"]["load"], "pending_sampling");
    }

    #[tokio::test]
    async fn test_create_duplicate_operation_conflicts() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;
        let (status, body) = send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "dispatch")),
        )
        .await;

        assert_eq!(status, HttpStatusCode::CONFLICT);
        let error_response: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(error_response.error);
        assert!(error_response.message.contains("already exists"));
    }

    #[tokio::test]
    async fn test_create_operation_without_actor_is_rejected() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        let mut request: Value = create_operation_request(7, "reception");
        request["actor_id"] = json!("  ");

        let (status, _) = send(&app, "POST", "/operations", Some(request)).await;

        assert_eq!(status, HttpStatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/operations/7", None).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_operation_with_unassigned_contract_is_unprocessable() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        let mut request: Value = create_operation_request(7, "reception");
        request["operation"]["contract_reference"]["contract_id"] = json!(0);

        let (status, _) = send(&app, "POST", "/operations", Some(request)).await;

        assert_eq!(status, HttpStatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_transition_lists_every_missing_field() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/operations/7/transitions",
            Some(transition_request("transport:in_transit", json!({}))),
        )
        .await;

        assert_eq!(status, HttpStatusCode::UNPROCESSABLE_ENTITY);
        let error_response: ErrorResponse = serde_json::from_value(body).unwrap();
        assert_eq!(error_response.violations.len(), 3);
        assert!(
            error_response
                .violations
                .iter()
                .all(|violation| matches!(violation, TransitionError::MissingRequiredField { .. }))
        );
    }

    #[tokio::test]
    async fn test_jump_transition_is_rejected() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/operations/7/transitions",
            Some(transition_request(
                "transport:completed",
                json!({"received_quantity": 240.0}),
            )),
        )
        .await;

        assert_eq!(status, HttpStatusCode::UNPROCESSABLE_ENTITY);
        let error_response: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(
            error_response
                .violations
                .iter()
                .any(|violation| matches!(violation, TransitionError::InvalidTransition { .. }))
        );

        let (_, body) = send(&app, "GET", "/operations/7", None).await;
        assert_eq!(body["status"]["transport"], "programmed");
        assert_eq!(body["received_quantity"], Value::Null);
    }

    #[tokio::test]
    async fn test_transition_with_edits_moves_operation() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let response: CommandApiResponse = transition(
            &app,
            7,
            "transport:in_transit",
            json!({"plate_number": "ABC-123", "guide_id": "G-1", "sent_quantity": 250.0}),
        )
        .await;

        assert_eq!(response.event_id, Some(2));
        let operation: Operation = response.operation.unwrap();
        assert_eq!(operation.plate_number(), Some("ABC-123"));
        assert!((operation.sent_quantity() - 250.0).abs() < 1e-9);
        assert_eq!(operation.status().transport, TransportState::InTransit);
    }

    #[tokio::test]
    async fn test_repeated_transition_changes_nothing() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;
        let edits: Value =
            json!({"plate_number": "ABC-123", "guide_id": "G-1", "sent_quantity": 250.0});
        transition(&app, 7, "transport:in_transit", edits.clone()).await;

        let response: CommandApiResponse =
            transition(&app, 7, "transport:in_transit", edits).await;

        assert_eq!(response.event_id, None);
        assert_eq!(response.sequence, None);
        assert_eq!(response.message, "No change");
    }

    #[tokio::test]
    async fn test_unparseable_target_is_bad_request() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let (status, _) = send(
            &app,
            "POST",
            "/operations/7/transitions",
            Some(transition_request("transport:teleported", json!({}))),
        )
        .await;

        assert_eq!(status, HttpStatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_operation_is_not_found() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        let (status, _) = send(&app, "GET", "/operations/99", None).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/operations/99/workflow", None).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);

        let (status, _) = send(
            &app,
            "POST",
            "/operations/99/transitions",
            Some(transition_request("transport:cancelled", json!({}))),
        )
        .await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_workflow_lists_next_states() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let (status, body) = send(&app, "GET", "/operations/7/workflow", None).await;

        assert_eq!(status, HttpStatusCode::OK);
        let next_states = body["next_states"].as_array().unwrap();
        assert_eq!(next_states.len(), 3);
        assert_eq!(next_states[0]["state"]["dimension"], "transport");
        assert_eq!(next_states[0]["state"]["state"], "in_transit");
        assert_eq!(next_states[0]["missing_fields"].as_array().unwrap().len(), 3);
        assert_eq!(body["steps"][0]["progress"], "current");
    }

    #[tokio::test]
    async fn test_tank_estimate_follows_pumping() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        start_pumping_reception(
            &app,
            7,
            2,
            250.0,
            "2026-03-02T08:00:00Z",
            "2026-03-02T10:00:00Z",
        )
        .await;

        clock.set(T0 + Duration::hours(1));
        let (status, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_eq!(status, HttpStatusCode::OK);
        assert_close(&body["level"], 125.0);

        clock.set(T0 + Duration::hours(3));
        let (_, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_close(&body["level"], 250.0);
        assert_close(&body["free_space"], 1750.0);

        let (_, body) = send(&app, "GET", "/tanks/estimates", None).await;
        assert_eq!(body.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tank_and_tower_are_not_found() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        let (status, _) = send(&app, "GET", "/tanks/42/estimate", None).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", "/towers/42/throughput", None).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refining_run_splits_feed_into_outputs() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        let (status, body) = send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;
        assert_eq!(status, HttpStatusCode::OK);
        let response: CommandApiResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.affected.len(), 4);
        assert!(response.affected.contains(&EntityRef::Tower(TowerId(1))));

        clock.set(T0 + Duration::hours(2));

        let (_, body) = send(&app, "GET", "/tanks/1/estimate", None).await;
        assert_close(&body["level"], -500.0);
        let (_, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_close(&body["level"], 300.0);
        let (_, body) = send(&app, "GET", "/tanks/3/estimate", None).await;
        assert_close(&body["level"], 200.0);

        let (status, body) = send(&app, "GET", "/towers/1/throughput", None).await;
        assert_eq!(status, HttpStatusCode::OK);
        assert_close(&body[0]["expected_total"], 600.0);
        assert_close(&body[0]["time_weighted_actual"], 300.0);
        assert_close(&body[1]["time_weighted_actual"], 200.0);
    }

    #[tokio::test]
    async fn test_duplicate_refining_run_conflicts() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;
        let (status, _) = send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;

        assert_eq!(status, HttpStatusCode::CONFLICT);
        let (_, body) = send(&app, "GET", "/refining_runs", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deactivated_operation_is_hidden_and_stops_counting() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        start_pumping_reception(
            &app,
            7,
            2,
            250.0,
            "2026-03-02T08:00:00Z",
            "2026-03-02T10:00:00Z",
        )
        .await;
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(8, "dispatch")),
        )
        .await;
        clock.set(T0 + Duration::hours(3));

        let (status, body) = send(
            &app,
            "POST",
            "/operations/7/active",
            Some(json!({
                "actor_id": "sup-1",
                "actor_type": "supervisor",
                "cause_id": "fix-1",
                "cause_description": "Duplicate entry",
                "active": false
            })),
        )
        .await;

        assert_eq!(status, HttpStatusCode::OK);
        let response: CommandApiResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.message, "Deactivated");
        assert!(response.affected.contains(&EntityRef::Tank(TankId(2))));

        let (_, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_close(&body["level"], 0.0);

        let (_, body) = send(&app, "GET", "/operations", None).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        let (_, body) = send(&app, "GET", "/operations?include_inactive=true", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_operations_filters_by_kind() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(8, "dispatch")),
        )
        .await;

        let (status, body) = send(&app, "GET", "/operations?kind=dispatch", None).await;
        assert_eq!(status, HttpStatusCode::OK);
        let operations = body.as_array().unwrap();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0]["id"], 8);

        let (status, _) = send(&app, "GET", "/operations?kind=barge", None).await;
        assert_eq!(status, HttpStatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_audit_log_filters_by_record() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(8, "reception")),
        )
        .await;
        transition(&app, 7, "transport:cancelled", json!({})).await;
        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;

        let (_, body) = send(&app, "GET", "/audit", None).await;
        let events: Vec<AuditEventResponse> = serde_json::from_value(body).unwrap();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].event_id, Some(1));
        assert_eq!(events[0].actor_id, "op-12");
        assert_eq!(events[0].before, "absent");

        let (_, body) = send(&app, "GET", "/audit?operation_id=7", None).await;
        let events: Vec<AuditEventResponse> = serde_json::from_value(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.subject == "operation 7"));

        let (_, body) = send(&app, "GET", "/audit?refining_run_id=3", None).await;
        let events: Vec<AuditEventResponse> = serde_json::from_value(body).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor_id, "planner-1");

        let (status, _) = send(&app, "GET", "/audit?operation_id=7&refining_run_id=3", None).await;
        assert_eq!(status, HttpStatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_snapshot_and_listings() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(
            &app,
            "POST",
            "/operations",
            Some(create_operation_request(7, "reception")),
        )
        .await;

        let (_, body) = send(&app, "GET", "/snapshot", None).await;
        assert_eq!(body["tanks"].as_array().unwrap().len(), 3);
        assert_eq!(body["towers"].as_array().unwrap().len(), 1);
        assert_eq!(body["operations"].as_array().unwrap().len(), 1);
        assert!(body["refining_runs"].as_array().unwrap().is_empty());

        let (_, body) = send(&app, "GET", "/tanks", None).await;
        assert_eq!(body.as_array().unwrap().len(), 3);
        let (_, body) = send(&app, "GET", "/towers", None).await;
        assert_eq!(body[0]["name"], "T-101");
    }

    #[tokio::test]
    async fn test_dashboard_follows_recorded_runs() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        clock.set(T0 + Duration::hours(2));

        let (_, body) = send(&app, "GET", "/dashboard", None).await;
        assert_eq!(body["tanks"].as_array().unwrap().len(), 3);
        assert_close(&body["tanks"][1]["level"], 0.0);

        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;

        for _ in 0..200 {
            let (_, body) = send(&app, "GET", "/dashboard", None).await;
            let level: f64 = body["tanks"][1]["level"].as_f64().unwrap();
            if (level - 300.0).abs() < 1e-9 {
                assert_close(&body["towers"][0]["sections"][0]["time_weighted_actual"], 300.0);
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        panic!("dashboard never caught up with the refining run");
    }

    #[tokio::test]
    async fn test_dashboard_levels_move_between_commands() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        start_pumping_reception(
            &app,
            7,
            2,
            250.0,
            "2026-03-02T08:00:00Z",
            "2026-03-02T10:00:00Z",
        )
        .await;

        clock.set(T0 + Duration::hours(1));
        let mut level: f64 = 0.0;
        for _ in 0..200 {
            let (_, body) = send(&app, "GET", "/dashboard", None).await;
            level = body["tanks"][1]["level"].as_f64().unwrap();
            if (level - 125.0).abs() < 1e-9 {
                break;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        assert!((level - 125.0).abs() < 1e-9, "dashboard stuck at {level}");

        clock.set(T0 + Duration::hours(3));
        let (_, body) = send(&app, "GET", "/dashboard", None).await;
        assert_close(&body["tanks"][1]["level"], 250.0);
    }

    #[tokio::test]
    async fn test_refining_run_can_be_corrected() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;

        let mut request: Value = refining_run_request();
        request["run"]["total_quantity"] = json!(500.0);
        let (status, body) = send(&app, "POST", "/refining_runs/3", Some(request)).await;

        assert_eq!(status, HttpStatusCode::OK, "{body}");
        let response: CommandApiResponse = serde_json::from_value(body).unwrap();
        assert!(response.sequence.is_some());
        assert_eq!(response.refining_run.unwrap().total_quantity, 500.0);

        clock.set(T0 + Duration::hours(2));
        let (_, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_close(&body["level"], 150.0);
    }

    #[tokio::test]
    async fn test_refining_run_correction_checks_ids() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);

        let (status, _) = send(&app, "POST", "/refining_runs/3", Some(refining_run_request())).await;
        assert_eq!(status, HttpStatusCode::NOT_FOUND);

        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;
        let (status, body) =
            send(&app, "POST", "/refining_runs/4", Some(refining_run_request())).await;
        assert_eq!(status, HttpStatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("does not match"));
    }

    #[tokio::test]
    async fn test_deactivated_refining_run_stops_counting() {
        let (app_state, clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        send(&app, "POST", "/refining_runs", Some(refining_run_request())).await;
        clock.set(T0 + Duration::hours(2));

        let (status, body) = send(
            &app,
            "POST",
            "/refining_runs/3/active",
            Some(json!({
                "actor_id": "planner-1",
                "actor_type": "operator",
                "cause_id": "plan-8",
                "cause_description": "Charge entered twice",
                "active": false
            })),
        )
        .await;

        assert_eq!(status, HttpStatusCode::OK, "{body}");
        let (_, body) = send(&app, "GET", "/tanks/2/estimate", None).await;
        assert_close(&body["level"], 0.0);
        let (_, body) = send(&app, "GET", "/audit?refining_run_id=3", None).await;
        assert_eq!(body.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_cancelling_while_pumping_is_unprocessable() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        start_pumping_reception(
            &app,
            7,
            2,
            250.0,
            "2026-03-02T08:00:00Z",
            "2026-03-02T10:00:00Z",
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/operations/7/transitions",
            Some(transition_request("transport:cancelled", json!({}))),
        )
        .await;

        assert_eq!(status, HttpStatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["violations"][0]["kind"], "state_conflict");
    }

    #[tokio::test]
    async fn test_staged_negative_quantity_is_unprocessable() {
        let (app_state, _clock) = create_test_app_state();
        let app: Router = build_router(app_state);
        start_pumping_reception(
            &app,
            7,
            2,
            250.0,
            "2026-03-02T08:00:00Z",
            "2026-03-02T10:00:00Z",
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/operations/7/transitions",
            Some(transition_request(
                "load:in_progress",
                json!({"sent_quantity": -1000.0}),
            )),
        )
        .await;

        assert_eq!(status, HttpStatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["message"].as_str().unwrap().contains("sent_quantity"));
        let (_, body) = send(&app, "GET", "/operations/7", None).await;
        assert_close(&body["sent_quantity"], 250.0);
    }
}
