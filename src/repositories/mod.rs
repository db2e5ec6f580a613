//! Entity store: lookups and versioned writes that run on any connection,
//! including an open transaction.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::ServiceError;

pub mod delivery_repository;
pub mod harvest_repository;
pub mod order_repository;
pub mod user_repository;

pub use delivery_repository::DeliveryRepository;
pub use harvest_repository::HarvestRepository;
pub use order_repository::{NewOrder, NewOrderItem, OrderRepository};
pub use user_repository::UserRepository;

/// Applies `changes` only if the row still carries `expected_version`.
///
/// Zero affected rows means someone else wrote first: `Conflict`.
pub(crate) async fn update_versioned<E, A, C>(
    conn: &C,
    label: &str,
    id: Uuid,
    expected_version: i32,
    id_column: E::Column,
    version_column: E::Column,
    changes: A,
) -> Result<(), ServiceError>
where
    E: EntityTrait,
    A: ActiveModelTrait<Entity = E> + Send,
    C: ConnectionTrait,
{
    let result = E::update_many()
        .set(changes)
        .filter(id_column.eq(id))
        .filter(version_column.eq(expected_version))
        .exec(conn)
        .await
        .map_err(|e| {
            error!(error = %e, %id, "Failed to update {}", label);
            ServiceError::DatabaseError(e)
        })?;

    if result.rows_affected == 0 {
        warn!(%id, expected_version, "stale {} version", label);
        return Err(ServiceError::Conflict(format!(
            "{} {} was modified concurrently (expected version {})",
            label, id, expected_version
        )));
    }
    Ok(())
}
