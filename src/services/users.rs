use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::user::{self, Entity as UserEntity},
    errors::ServiceError,
    repositories::UserRepository,
    services::clock::SharedClock,
    workflow::{AccountStatus, Actor, Availability, UserRole},
};

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub service_area: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: AccountStatus,
    pub availability: Availability,
    pub service_area: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserView {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            phone: m.phone,
            role: m.role,
            status: m.status,
            availability: m.availability,
            service_area: m.service_area,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Accounts for the five marketplace roles.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    clock: SharedClock,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, clock: SharedClock) -> Self {
        Self { db, clock }
    }

    fn require_admin(actor: &Actor) -> Result<(), ServiceError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "only an admin may manage users".to_string(),
            ))
        }
    }

    pub async fn create_user(&self, actor: &Actor, new_user: NewUser) -> Result<UserView, ServiceError> {
        Self::require_admin(actor)?;
        self.register(new_user).await.map(Into::into)
    }

    /// Inserts an ACTIVE, AVAILABLE account. Used by the admin endpoint and the CLI.
    #[instrument(skip(self, new_user), fields(email = %new_user.email, role = %new_user.role))]
    pub async fn register(&self, new_user: NewUser) -> Result<user::Model, ServiceError> {
        let email = new_user.email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::ValidationError(format!(
                "'{}' is not a valid email",
                new_user.email
            )));
        }
        if new_user.name.trim().is_empty() {
            return Err(ServiceError::ValidationError("name is required".to_string()));
        }

        let db = &*self.db;
        let taken = UserEntity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if taken.is_some() {
            warn!("email already registered");
            return Err(ServiceError::Conflict(format!(
                "a user with email {} already exists",
                email
            )));
        }

        let now = self.clock.now();
        let created = UserRepository::insert(
            db,
            user::ActiveModel {
                id: Set(Uuid::new_v4()),
                name: Set(new_user.name.trim().to_string()),
                email: Set(email),
                phone: Set(new_user.phone),
                role: Set(new_user.role),
                status: Set(AccountStatus::Active),
                availability: Set(Availability::Available),
                service_area: Set(new_user.service_area),
                created_at: Set(now),
                updated_at: Set(now),
            },
        )
        .await?;

        info!(user_id = %created.id, "User created");
        Ok(created)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<UserView, ServiceError> {
        UserRepository::find(&*self.db, id).await.map(Into::into)
    }

    /// Self-service toggle for drivers and agronomists.
    #[instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn set_availability(
        &self,
        actor: &Actor,
        availability: Availability,
    ) -> Result<UserView, ServiceError> {
        if !actor.role.is_assignee_role() {
            return Err(ServiceError::ValidationError(format!(
                "availability only applies to drivers and agronomists, not {}",
                actor.role
            )));
        }
        let db = &*self.db;
        let current = UserRepository::find(db, actor.id).await?;
        let updated =
            UserRepository::set_availability(db, current, availability, self.clock.now()).await?;
        info!(%availability, "Availability changed");
        Ok(updated.into())
    }

    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn set_status(
        &self,
        actor: &Actor,
        user_id: Uuid,
        status: AccountStatus,
    ) -> Result<UserView, ServiceError> {
        Self::require_admin(actor)?;
        if actor.is(user_id) && status == AccountStatus::Suspended {
            return Err(ServiceError::ValidationError(
                "admins cannot suspend their own account".to_string(),
            ));
        }
        let db = &*self.db;
        let current = UserRepository::find(db, user_id).await?;
        let updated = UserRepository::set_status(db, current, status, self.clock.now()).await?;
        info!(%user_id, %status, "Account status changed");
        Ok(updated.into())
    }
}
