use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created, validate_input, ReasonRequest, StatusUpdateRequest};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    queries::ListFilter,
    services::{
        assignments::HarvestAssignment,
        audit::AuditRecordView,
        harvest::{HarvestDetailView, HarvestRequestView, NewHarvestRequest, PhasePlan, PhaseView},
        state_machine::{HarvestResponse, TransitionOptions},
    },
    workflow::{parse_status, HarvestStatus, PhaseStatus},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateHarvestRequest {
    #[validate(length(min = 1, max = 100))]
    pub crop: String,
    pub expected_yield: Decimal,
    #[validate(length(max = 20))]
    pub yield_unit: Option<String>,
    pub harvest_date: NaiveDate,
    #[validate(length(max = 300))]
    pub location: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignExpertRequest {
    pub expert_id: Uuid,
    #[validate(length(max = 200))]
    pub expert_name: Option<String>,
    #[validate(length(max = 2000))]
    pub admin_advice: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    /// Current request version; required to replace an existing agronomist.
    #[validate(range(min = 1))]
    pub version: Option<i32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RespondRequest {
    pub action: HarvestResponse,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Timeline to create on acceptance; a default plan is used when absent.
    pub phases: Option<Vec<PhasePlan>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub scheduled_date: Option<NaiveDate>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    #[validate(range(min = 0, max = 100))]
    pub progress: i32,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseUpdateRequest {
    pub status: PhaseStatus,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/request",
    summary = "Request harvest assistance",
    request_body = CreateHarvestRequest,
    responses(
        (status = 201, description = "Request created", body = ApiResponse<HarvestDetailView>),
        (status = 403, description = "Not a farmer", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateHarvestRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let request = state
        .services
        .harvest
        .create_request(
            auth_user.actor(),
            NewHarvestRequest {
                crop: payload.crop,
                expected_yield: payload.expected_yield,
                yield_unit: payload.yield_unit,
                harvest_date: payload.harvest_date,
                location: payload.location,
                notes: payload.notes,
            },
        )
        .await?;
    Ok(created(request))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvest/requests",
    summary = "Harvest requests visible to me",
    params(ListFilter),
    responses((status = 200, description = "Requests", body = ApiResponse<PaginatedResponse<HarvestRequestView>>)),
    security(("Bearer" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<HarvestRequestView>> {
    let page = state
        .services
        .queries
        .list_harvest_requests(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvest/admin/requests",
    summary = "All harvest requests (admin)",
    params(ListFilter),
    responses(
        (status = 200, description = "Requests", body = ApiResponse<PaginatedResponse<HarvestRequestView>>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn admin_requests(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<HarvestRequestView>> {
    if !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only an admin may list all harvest requests".to_string(),
        ));
    }
    let page = state
        .services
        .queries
        .list_harvest_requests(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvest/agronomist/assigned",
    summary = "Requests assigned to me",
    params(ListFilter),
    responses((status = 200, description = "Requests", body = ApiResponse<PaginatedResponse<HarvestRequestView>>)),
    security(("Bearer" = []))
)]
pub async fn assigned_to_me(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<HarvestRequestView>> {
    filter.expert_id = Some(auth_user.user_id);
    let page = state
        .services
        .queries
        .list_harvest_requests(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvest/{id}",
    summary = "Get harvest request",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    responses(
        (status = 200, description = "Request with tracking and schedule", body = ApiResponse<HarvestDetailView>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<HarvestDetailView> {
    let request = state
        .services
        .harvest
        .get_harvest(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/admin/schedule",
    summary = "Assign an agronomist",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body = AssignExpertRequest,
    responses(
        (status = 200, description = "Agronomist assigned", body = ApiResponse<HarvestDetailView>),
        (status = 409, description = "Already assigned or stale version", body = crate::errors::ErrorResponse),
        (status = 422, description = "Agronomist ineligible", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_expert(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignExpertRequest>,
) -> ApiResult<HarvestDetailView> {
    validate_input(&payload)?;
    let request = state
        .services
        .assignments
        .assign_harvest(
            auth_user.actor(),
            id,
            HarvestAssignment {
                expert_id: payload.expert_id,
                expert_name: payload.expert_name,
                admin_advice: payload.admin_advice,
                scheduled_date: payload.scheduled_date,
                expected_version: payload.version,
            },
        )
        .await?;
    let view = state.services.harvest.detail(request).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/unassign",
    summary = "Remove the agronomist",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body(content = ReasonRequest, description = "Optional reason"),
    responses(
        (status = 200, description = "Request back in the pool", body = ApiResponse<HarvestDetailView>),
        (status = 422, description = "Nothing to unassign", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn unassign_expert(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<HarvestDetailView> {
    let Json(payload) = payload.unwrap_or_default();
    validate_input(&payload)?;
    let request = state
        .services
        .assignments
        .unassign_harvest(auth_user.actor(), id, payload.reason)
        .await?;
    let view = state.services.harvest.detail(request).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/accept",
    summary = "Accept or reject an assignment",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body = RespondRequest,
    responses(
        (status = 200, description = "Accepted with timeline, or returned to the pool", body = ApiResponse<HarvestDetailView>),
        (status = 403, description = "Not the assigned agronomist", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn respond(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RespondRequest>,
) -> ApiResult<HarvestDetailView> {
    validate_input(&payload)?;
    let request = state
        .services
        .state_machine
        .respond_to_harvest(
            auth_user.actor(),
            id,
            payload.action,
            payload.notes,
            payload.phases,
        )
        .await?;
    let view = state.services.harvest.detail(request).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/schedule",
    summary = "Schedule the harvest",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body = ScheduleRequest,
    responses(
        (status = 200, description = "Scheduled", body = ApiResponse<HarvestDetailView>),
        (status = 400, description = "No date supplied or proposed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn schedule(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ScheduleRequest>,
) -> ApiResult<HarvestDetailView> {
    validate_input(&payload)?;
    let request = state
        .services
        .state_machine
        .schedule_harvest(auth_user.actor(), id, payload.scheduled_date, payload.notes)
        .await?;
    let view = state.services.harvest.detail(request).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/update",
    summary = "Record harvest progress",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Tracking entry appended", body = ApiResponse<HarvestDetailView>),
        (status = 400, description = "Progress out of range or decreasing", body = crate::errors::ErrorResponse),
        (status = 422, description = "Harvest not scheduled or running", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn record_progress(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<HarvestDetailView> {
    validate_input(&payload)?;
    let request = state
        .services
        .harvest
        .record_progress(auth_user.actor(), id, payload.progress, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(request)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/status",
    summary = "Transition harvest status",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Request transitioned", body = ApiResponse<HarvestDetailView>),
        (status = 403, description = "Not allowed for this actor", body = crate::errors::ErrorResponse),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> ApiResult<HarvestDetailView> {
    validate_input(&payload)?;
    let target = parse_status::<HarvestStatus>(&payload.status)?;
    let request = state
        .services
        .state_machine
        .transition_harvest(
            auth_user.actor(),
            id,
            target,
            TransitionOptions::with_note(payload.note),
        )
        .await?;
    let view = state.services.harvest.detail(request).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/harvest/{id}/phases/{position}",
    summary = "Update a schedule phase",
    params(
        ("id" = Uuid, Path, description = "Harvest request ID"),
        ("position" = i32, Path, description = "1-based phase position"),
    ),
    request_body = PhaseUpdateRequest,
    responses(
        (status = 200, description = "Phase updated", body = ApiResponse<PhaseView>),
        (status = 404, description = "No such phase", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_phase(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path((id, position)): Path<(Uuid, i32)>,
    Json(payload): Json<PhaseUpdateRequest>,
) -> ApiResult<PhaseView> {
    validate_input(&payload)?;
    let phase = state
        .services
        .harvest
        .update_phase(auth_user.actor(), id, position, payload.status, payload.notes)
        .await?;
    Ok(Json(ApiResponse::success(phase)))
}

#[utoipa::path(
    get,
    path = "/api/v1/harvest/{id}/history",
    summary = "Harvest request status history",
    params(("id" = Uuid, Path, description = "Harvest request ID")),
    responses((status = 200, description = "Audit records, oldest first", body = ApiResponse<Vec<AuditRecordView>>)),
    security(("Bearer" = []))
)]
pub async fn harvest_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<AuditRecordView>> {
    let history = state
        .services
        .harvest
        .history(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}
