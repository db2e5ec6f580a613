use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::workflow::{EntityKind, UserRole};

/// Append-only status history. Rows are inserted and never updated or deleted;
/// `id` is the ordering key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    /// None only for the record written when the entity is created.
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
