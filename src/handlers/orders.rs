use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::common::{created, validate_input, ReasonRequest, StatusUpdateRequest};
use crate::{
    auth::AuthUser,
    errors::ServiceError,
    queries::ListFilter,
    repositories::NewOrderItem,
    services::{
        audit::AuditRecordView,
        orders::{DeliveryDetails, OrderView, PlaceOrder},
    },
    workflow::{parse_status, DeliveryType, OrderStatus},
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    pub listing_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "an order needs at least one item"))]
    pub items: Vec<OrderItemRequest>,
    pub delivery_type: DeliveryType,
    /// Required for DELIVERY orders.
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 200))]
    pub contact_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

impl CreateOrderRequest {
    fn into_command(self) -> PlaceOrder {
        let delivery = match (self.address, self.contact_name, self.phone) {
            (Some(address), Some(contact_name), Some(phone)) => Some(DeliveryDetails {
                address,
                contact_name,
                phone,
            }),
            _ => None,
        };
        PlaceOrder {
            items: self
                .items
                .into_iter()
                .map(|i| NewOrderItem {
                    listing_id: i.listing_id,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
            delivery_type: self.delivery_type,
            delivery,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<OrderView>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role cannot place orders", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let order = state
        .services
        .orders
        .place_order(auth_user.actor(), payload.into_command())
        .await?;
    Ok(created(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List all orders (admin)",
    params(ListFilter),
    responses(
        (status = 200, description = "Orders", body = ApiResponse<PaginatedResponse<OrderView>>),
        (status = 403, description = "Not an admin", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<OrderView>> {
    if !auth_user.is_admin() {
        return Err(ServiceError::Forbidden(
            "only an admin may list all orders".to_string(),
        ));
    }
    let page = state
        .services
        .queries
        .list_orders(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/me",
    summary = "List my orders",
    params(ListFilter),
    responses((status = 200, description = "Orders", body = ApiResponse<PaginatedResponse<OrderView>>)),
    security(("Bearer" = []))
)]
pub async fn my_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(mut filter): Query<ListFilter>,
) -> ApiResult<PaginatedResponse<OrderView>> {
    filter.customer_id = Some(auth_user.user_id);
    let page = state
        .services
        .queries
        .list_orders(&auth_user.actor(), filter)
        .await?;
    Ok(Json(ApiResponse::success(page.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<OrderView>),
        (status = 403, description = "Not your order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .get_order(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    summary = "Transition order status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Order transitioned", body = ApiResponse<OrderView>),
        (status = 403, description = "Not allowed for this actor", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
        (status = 422, description = "Transition not allowed from the current status", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdateRequest>,
) -> ApiResult<OrderView> {
    validate_input(&payload)?;
    let target = parse_status::<OrderStatus>(&payload.status)?;
    let order = state
        .services
        .state_machine
        .transition_order(auth_user.actor(), id, target, payload.note)
        .await?;
    let view = state.services.orders.detail(order).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    description = "Buyers may cancel within the cancellation window; admins at any time. A live delivery is cancelled with the order.",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body(content = ReasonRequest, description = "Optional reason"),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderView>),
        (status = 403, description = "Outside the cancellation window or not your order", body = crate::errors::ErrorResponse),
        (status = 422, description = "Order is already final", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    payload: Option<Json<ReasonRequest>>,
) -> ApiResult<OrderView> {
    let Json(payload) = payload.unwrap_or_default();
    validate_input(&payload)?;
    let order = state
        .services
        .state_machine
        .cancel_order(auth_user.actor(), id, payload.reason)
        .await?;
    let view = state.services.orders.detail(order).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/history",
    summary = "Order status history",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses((status = 200, description = "Audit records, oldest first", body = ApiResponse<Vec<AuditRecordView>>)),
    security(("Bearer" = []))
)]
pub async fn order_history(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<AuditRecordView>> {
    let history = state
        .services
        .orders
        .history(&auth_user.actor(), id)
        .await?;
    Ok(Json(ApiResponse::success(history)))
}
