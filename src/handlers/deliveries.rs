use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{validate_input, ReasonRequest, StatusUpdateRequest};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    queries::ListFilter,
    services::{audit::AuditRecordView, deliveries::DeliveryView},
    workflow::{parse_status, DeliveryStatus},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
    /// Current delivery version; required to replace an existing driver.
    #[validate(range(min = 1))]
    pub version: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    summary = "List all deliveries (admin)",
    params(ListFilter),
    responses(
        (status = 200, description = "Deliveries", body = ApiResponse<PaginatedResponse<DeliveryView>>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<DeliveryView>> {
    if !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only an admin may list all deliveries".to_string(),
        ));
    }
    let page = state
        .services
        .queries
        .list_deliveries(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/me",
    summary = "Deliveries for my orders",
    params(ListFilter),
    responses((status = 200, description = "Deliveries", body = ApiResponse<PaginatedResponse<DeliveryView>>)),
    security(("Bearer" = []))
)]
pub async fn my_deliveries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<DeliveryView>> {
    filter.customer_id = Some(auth_user.user_id);
    let page = state
        .services
        .queries
        .list_deliveries(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/driver/me",
    summary = "Deliveries assigned to me",
    params(ListFilter),
    responses((status = 200, description = "Deliveries", body = ApiResponse<PaginatedResponse<DeliveryView>>)),
    security(("Bearer" = []))
)]
pub async fn driver_deliveries(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<DeliveryView>> {
    filter.driver_id = Some(auth_user.user_id);
    let page = state
        .services
        .queries
        .list_deliveries(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/order/{order_id}",
    summary = "Delivery of an order",
    params(("order_id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Delivery with status history", body = ApiResponse<DeliveryView>),
        (status = 404, description = "Unknown order or pickup order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delivery_for_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(order_id): Path<Uuid>,
) -> ApiResult<DeliveryView> {
    let delivery = state
        .services
        .deliveries
        .get_delivery_for_order(&auth_user.actor(), order_id)
        .await?;
    Ok(Json(ApiResponse::success(delivery)))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    summary = "Get delivery",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery with status history", body = ApiResponse<DeliveryView>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<DeliveryView> {
    let delivery = state
        .services
        .deliveries
        .get_delivery(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(delivery)))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/assign",
    summary = "Assign a driver",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = AssignDriverRequest,
    responses(
        (status = 200, description = "Driver assigned", body = ApiResponse<DeliveryView>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already assigned or stale version", body = crate::errors::ErrorResponse),
        (status = 422, description = "Driver ineligible or delivery past assignment", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn assign_driver(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignDriverRequest>,
) -> ApiResult<DeliveryView> {
    validate_input(&payload)?;
    let delivery = state
        .services
        .assignments
        .assign_delivery(auth_user.actor(), id, payload.driver_id, payload.version)
        .await?;
    let view = state.services.deliveries.detail(delivery).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/unassign",
    summary = "Remove the driver",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body(content = ReasonRequest, description = "Optional reason"),
    responses(
        (status = 200, description = "Delivery back to PENDING", body = ApiResponse<DeliveryView>),
        (status = 422, description = "Nothing to unassign", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn unassign_driver(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<DeliveryView> {
    let Json(payload) = payload.unwrap_or_default();
    validate_input(&payload)?;
    let delivery = state
        .services
        .assignments
        .unassign_delivery(auth_user.actor(), id, payload.reason)
        .await?;
    let view = state.services.deliveries.detail(delivery).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/{id}/status",
    summary = "Transition delivery status",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Delivery transitioned", body = ApiResponse<DeliveryView>),
        (status = 403, description = "Not the assigned driver", body = crate::errors::ErrorResponse),
        (status = 422, description = "Transition not allowed", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> ApiResult<DeliveryView> {
    validate_input(&payload)?;
    let target = parse_status::<DeliveryStatus>(&payload.status)?;
    let delivery = state
        .services
        .state_machine
        .transition_delivery(auth_user.actor(), id, target, payload.note)
        .await?;
    let view = state.services.deliveries.detail(delivery).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}/history",
    summary = "Delivery status history",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses((status = 200, description = "Audit records, oldest first", body = ApiResponse<Vec<AuditRecordView>>)),
    security(("Bearer" = []))
)]
pub async fn delivery_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<AuditRecordView>> {
    let history = state
        .services
        .deliveries
        .history(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}
