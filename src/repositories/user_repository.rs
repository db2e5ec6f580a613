use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use tracing::error;
use uuid::Uuid;

use crate::entities::user::{self, Entity as UserEntity};
use crate::errors::ServiceError;
use crate::workflow::{AccountStatus, Availability};

pub struct UserRepository;

impl UserRepository {
    pub async fn find_optional<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<user::Model>, ServiceError> {
        UserEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find<C: ConnectionTrait>(conn: &C, id: Uuid) -> Result<user::Model, ServiceError> {
        Self::find_optional(conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("User", id))
    }

    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        model: user::ActiveModel,
    ) -> Result<user::Model, ServiceError> {
        model.insert(conn).await.map_err(|e| {
            error!(error = %e, "Failed to insert user");
            ServiceError::DatabaseError(e)
        })
    }

    pub async fn set_availability<C: ConnectionTrait>(
        conn: &C,
        user: user::Model,
        availability: Availability,
        now: DateTime<Utc>,
    ) -> Result<user::Model, ServiceError> {
        let mut active: user::ActiveModel = user.into();
        active.availability = Set(availability);
        active.updated_at = Set(now);
        active.update(conn).await.map_err(ServiceError::DatabaseError)
    }

    pub async fn set_status<C: ConnectionTrait>(
        conn: &C,
        user: user::Model,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<user::Model, ServiceError> {
        let mut active: user::ActiveModel = user.into();
        active.status = Set(status);
        active.updated_at = Set(now);
        active.update(conn).await.map_err(ServiceError::DatabaseError)
    }
}
