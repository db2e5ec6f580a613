use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::error;
use uuid::Uuid;

use crate::entities::{
    harvest_phase::{self, Entity as HarvestPhaseEntity},
    harvest_request::{self, Entity as HarvestRequestEntity},
    harvest_tracking::{self, Entity as HarvestTrackingEntity},
};
use crate::errors::ServiceError;

use super::update_versioned;

pub struct HarvestRepository;

impl HarvestRepository {
    pub async fn find_optional<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<harvest_request::Model>, ServiceError> {
        HarvestRequestEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<harvest_request::Model, ServiceError> {
        Self::find_optional(conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Harvest request", id))
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: harvest_request::ActiveModel,
    ) -> Result<harvest_request::Model, ServiceError> {
        model.insert(conn).await.map_err(|e| {
            error!(error = %e, "Failed to insert harvest request");
            ServiceError::DatabaseError(e)
        })
    }

    /// Versioned write of any subset of request columns. `version` and
    /// `updated_at` are set here.
    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        current: &harvest_request::Model,
        mut changes: harvest_request::ActiveModel,
        now: DateTime<Utc>,
    ) -> Result<harvest_request::Model, ServiceError> {
        changes.updated_at = Set(now);
        changes.version = Set(current.version + 1);
        update_versioned(
            conn,
            "harvest request",
            current.id,
            current.version,
            harvest_request::Column::Id,
            harvest_request::Column::Version,
            changes,
        )
        .await?;
        Self::find(conn, current.id).await
    }

    pub async fn tracking<C: ConnectionTrait>(
        conn: &C,
        request_id: Uuid,
    ) -> Result<Vec<harvest_tracking::Model>, ServiceError> {
        HarvestTrackingEntity::find()
            .filter(harvest_tracking::Column::RequestId.eq(request_id))
            .order_by_asc(harvest_tracking::Column::UpdatedAt)
            .order_by_asc(harvest_tracking::Column::Progress)
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn latest_tracking<C: ConnectionTrait>(
        conn: &C,
        request_id: Uuid,
    ) -> Result<Option<harvest_tracking::Model>, ServiceError> {
        HarvestTrackingEntity::find()
            .filter(harvest_tracking::Column::RequestId.eq(request_id))
            .order_by_desc(harvest_tracking::Column::UpdatedAt)
            .order_by_desc(harvest_tracking::Column::Progress)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn insert_tracking<C: ConnectionTrait>(
        conn: &C,
        model: harvest_tracking::ActiveModel,
    ) -> Result<harvest_tracking::Model, ServiceError> {
        model.insert(conn).await.map_err(|e| {
            error!(error = %e, "Failed to insert harvest tracking entry");
            ServiceError::DatabaseError(e)
        })
    }

    pub async fn phases<C: ConnectionTrait>(
        conn: &C,
        request_id: Uuid,
    ) -> Result<Vec<harvest_phase::Model>, ServiceError> {
        HarvestPhaseEntity::find()
            .filter(harvest_phase::Column::RequestId.eq(request_id))
            .order_by_asc(harvest_phase::Column::Position)
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_phase<C: ConnectionTrait>(
        conn: &C,
        request_id: Uuid,
        position: i32,
    ) -> Result<harvest_phase::Model, ServiceError> {
        HarvestPhaseEntity::find()
            .filter(harvest_phase::Column::RequestId.eq(request_id))
            .filter(harvest_phase::Column::Position.eq(position))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Phase {} of harvest request {} not found",
                    position, request_id
                ))
            })
    }

    pub async fn delete_phases<C: ConnectionTrait>(
        conn: &C,
        request_id: Uuid,
    ) -> Result<(), ServiceError> {
        HarvestPhaseEntity::delete_many()
            .filter(harvest_phase::Column::RequestId.eq(request_id))
            .exec(conn)
            .await
            .map(|_| ())
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn insert_phase<C: ConnectionTrait>(
        conn: &C,
        model: harvest_phase::ActiveModel,
    ) -> Result<harvest_phase::Model, ServiceError> {
        model.insert(conn).await.map_err(|e| {
            error!(error = %e, "Failed to insert harvest phase");
            ServiceError::DatabaseError(e)
        })
    }

    pub async fn update_phase<C: ConnectionTrait>(
        conn: &C,
        model: harvest_phase::ActiveModel,
    ) -> Result<harvest_phase::Model, ServiceError> {
        model.update(conn).await.map_err(ServiceError::DatabaseError)
    }
}
