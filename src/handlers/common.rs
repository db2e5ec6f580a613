use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{errors::ServiceError, ApiResponse};

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// 201 with the standard envelope.
pub fn created<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::CREATED, Json(ApiResponse::success(data)))
}

/// Body of every `.../status` endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
}

/// Optional free-text reason for cancel and unassign.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
}
