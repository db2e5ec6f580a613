use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created, validate_input};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    queries::ListFilter,
    services::users::{NewUser, UserView},
    workflow::{AccountStatus, Availability, UserRole},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Wanjiru Kamau",
    "email": "wanjiru@example.com",
    "phone": "+254700000001",
    "role": "DRIVER",
    "serviceArea": "Nakuru"
}))]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub role: UserRole,
    #[validate(length(max = 100))]
    pub service_area: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AvailabilityRequest {
    pub availability: Availability,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AccountStatusRequest {
    pub status: AccountStatus,
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    summary = "Create a user (admin)",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserView>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_user(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let user = state
        .services
        .users
        .create_user(
            &auth_user.actor(),
            NewUser {
                name: payload.name,
                email: payload.email,
                phone: payload.phone,
                role: payload.role,
                service_area: payload.service_area,
            },
        )
        .await?;
    Ok(created(user))
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    summary = "List users (admin)",
    description = "Filter by role and availability to find assignable drivers and agronomists.",
    params(ListFilter),
    responses(
        (status = 200, description = "Users", body = ApiResponse<PaginatedResponse<UserView>>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<UserView>> {
    let page = state
        .services
        .queries
        .list_users(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    summary = "Current user",
    responses((status = 200, description = "My account", body = ApiResponse<UserView>)),
    security(("Bearer" = []))
)]
pub async fn me(State(state): State<AppState>, auth_user: AuthUser) -> ApiResult<UserView> {
    let user = state.services.users.get_user(auth_user.user_id).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me/availability",
    summary = "Set my availability",
    request_body = AvailabilityRequest,
    responses(
        (status = 200, description = "Availability updated", body = ApiResponse<UserView>),
        (status = 400, description = "Role has no availability", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn set_my_availability(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<AvailabilityRequest>,
) -> ApiResult<UserView> {
    let user = state
        .services
        .users
        .set_availability(&auth_user.actor(), payload.availability)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/users/{id}/status",
    summary = "Activate or suspend an account (admin)",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AccountStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<UserView>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn set_user_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AccountStatusRequest>,
) -> ApiResult<UserView> {
    let user = state
        .services
        .users
        .set_status(&auth_user.actor(), id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}
