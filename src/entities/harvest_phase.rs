use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::workflow::PhaseStatus;

/// One step of the schedule created when an agronomist accepts a request.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_phases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub request_id: Uuid,
    pub position: i32,
    pub phase: String,
    pub status: PhaseStatus,
    /// JSON array of activity strings
    pub activities: Json,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::harvest_request::Entity",
        from = "Column::RequestId",
        to = "super::harvest_request::Column::Id",
        on_delete = "Cascade"
    )]
    Request,
}

impl Related<super::harvest_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Request.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn activity_list(&self) -> Vec<String> {
        serde_json::from_value(self.activities.clone()).unwrap_or_default()
    }
}
