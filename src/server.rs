use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::error::SchedulerError;
use crate::params::{
    MAX_DAYS_PER_WEEK, MAX_GRADES, MAX_HOURS_PER_DAY, MAX_TEACHERS, ScheduleRequest,
};
use crate::schedule::{self, HomeroomRecord};
use crate::solver;
use crate::view::{self, Metadata, ScheduleRow};

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

/// Response envelope. A response carries either the schedule payload or an
/// error object, never both.
#[derive(Debug, Serialize)]
struct ScheduleResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<Vec<ScheduleRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    homeroom: Option<Vec<HomeroomRecord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<ScheduleRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SchedulerError::InvalidParameters(_) => (StatusCode::BAD_REQUEST, "Validation failed"),
            SchedulerError::NoFeasibleSolution(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "No solution found")
            }
            SchedulerError::SolverUnavailable(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Service unavailable")
            }
            SchedulerError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        warn!("request failed ({}): {}", self.kind(), self);

        let body = ScheduleResponse {
            success: false,
            message: message.to_string(),
            schedule: None,
            homeroom: None,
            parameters: None,
            metadata: None,
            error: Some(ErrorBody {
                kind: self.kind(),
                message: self.to_string(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

struct PipelineOutput {
    request: ScheduleRequest,
    schedule: Vec<ScheduleRow>,
    homeroom: Vec<HomeroomRecord>,
    total_assignments: usize,
}

/// validate -> build/solve -> extract -> augment -> shape, strictly in order.
fn run_pipeline(request: ScheduleRequest) -> Result<PipelineOutput, SchedulerError> {
    let params = request.validate()?;
    let raw = solver::solve(&params)?;
    let augmented = schedule::augment(&raw.teaching, &raw.homeroom, &params);
    debug!(
        "augmented schedule: {} rows, {} flagged as homeroom",
        augmented.len(),
        augmented.iter().filter(|r| r.is_homeroom).count()
    );
    let schedule = view::shape(&augmented);
    Ok(PipelineOutput {
        request,
        schedule,
        homeroom: raw.homeroom,
        total_assignments: raw.teaching.len(),
    })
}

async fn generate_schedule(
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, SchedulerError> {
    let started = Instant::now();
    info!(
        "schedule request: {} teachers, {} grades",
        request.n_teachers,
        request.grades.len()
    );

    // The solve can hold the thread for up to its full wall-clock budget.
    let out = tokio::task::spawn_blocking(move || run_pipeline(request))
        .await
        .map_err(|err| SchedulerError::internal(format!("schedule worker failed: {err}")))??;

    let processing_time_seconds = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;
    info!(
        "schedule generated: {} assignments in {processing_time_seconds}s",
        out.total_assignments
    );

    let homeroom_assignments = out.homeroom.len();
    Ok(Json(ScheduleResponse {
        success: true,
        message: "Schedule generated successfully".to_string(),
        schedule: Some(out.schedule),
        homeroom: Some(out.homeroom),
        parameters: Some(out.request),
        metadata: Some(Metadata {
            total_assignments: out.total_assignments,
            homeroom_assignments,
            processing_time_seconds,
        }),
        error: None,
    }))
}

async fn get_schedule_info() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": "API information retrieved successfully",
        "description": "School Schedule Optimization API",
        "endpoints": {
            "POST /generate_schedule": "Generate a new school schedule",
            "GET /get_schedule_info": "Get API information",
            "GET /health_check": "Check service health",
        },
        "required_parameters": {
            "n_teachers": format!("Number of teachers (integer, 1-{MAX_TEACHERS})"),
            "grades": format!("List of grade levels (e.g., [\"P1\", \"P2\", \"P3\"], max {MAX_GRADES} items)"),
        },
        "optional_parameters": {
            "pe_teacher": "Physical education teacher ID (default: \"T13\")",
            "pe_grades": "Grades that have PE (default: [\"P4\", \"P5\", \"P6\", \"M1\", \"M2\", \"M3\"])",
            "pe_day": "Day for PE classes (default: 3)",
            "n_pe_periods": "Number of PE periods (default: 6)",
            "start_hour": "Starting hour (default: 8)",
            "n_hours": format!("Number of hours per day (default: 8, max: {MAX_HOURS_PER_DAY})"),
            "lunch_hour": "Lunch hour (default: 5)",
            "days_per_week": format!("Days per week (default: 5, max: {MAX_DAYS_PER_WEEK})"),
            "enable_pe_constraints": "Enable PE constraints (default: false)",
            "homeroom_mode": "Homeroom mode: 0=none, 1=last period, 2=first and last (default: 1)",
        },
        "constraints": {
            "max_teachers": MAX_TEACHERS,
            "max_grades": MAX_GRADES,
            "max_hours_per_day": MAX_HOURS_PER_DAY,
            "max_days_per_week": MAX_DAYS_PER_WEEK,
        },
    }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "status": "healthy",
        "service": "timetable_solver",
    }))
}

pub fn router() -> Router {
    Router::new()
        .route("/generate_schedule", post(generate_schedule))
        .route("/get_schedule_info", get(get_schedule_info))
        .route("/health_check", get(health_check))
        .layer(CorsLayer::permissive())
}

pub async fn run_server(addr: &str) -> std::io::Result<()> {
    let app = router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}
