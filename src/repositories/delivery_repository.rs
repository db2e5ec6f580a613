use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use tracing::error;
use uuid::Uuid;

use crate::entities::delivery::{self, Entity as DeliveryEntity};
use crate::errors::ServiceError;
use crate::workflow::DeliveryStatus;

use super::update_versioned;

pub struct DeliveryRepository;

impl DeliveryRepository {
    pub async fn find_optional<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<delivery::Model>, ServiceError> {
        DeliveryEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<delivery::Model, ServiceError> {
        Self::find_optional(conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Delivery", id))
    }

    pub async fn find_by_order<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Option<delivery::Model>, ServiceError> {
        DeliveryEntity::find()
            .filter(delivery::Column::OrderId.eq(order_id))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: delivery::ActiveModel,
    ) -> Result<delivery::Model, ServiceError> {
        model.insert(conn).await.map_err(|e| {
            error!(error = %e, "Failed to insert delivery");
            ServiceError::DatabaseError(e)
        })
    }

    /// Writes status and driver together so the pair never diverges.
    pub async fn update_state<C: ConnectionTrait>(
        conn: &C,
        current: &delivery::Model,
        status: DeliveryStatus,
        driver_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<delivery::Model, ServiceError> {
        let changes = delivery::ActiveModel {
            status: Set(status),
            driver_id: Set(driver_id),
            updated_at: Set(now),
            version: Set(current.version + 1),
            ..Default::default()
        };
        update_versioned(
            conn,
            "delivery",
            current.id,
            current.version,
            delivery::Column::Id,
            delivery::Column::Version,
            changes,
        )
        .await?;
        Self::find(conn, current.id).await
    }
}
