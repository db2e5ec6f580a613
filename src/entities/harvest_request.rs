use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::workflow::HarvestStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "harvest_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub farmer_id: Uuid,
    pub crop: String,
    pub expected_yield: Decimal,
    pub yield_unit: String,
    pub harvest_date: NaiveDate,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub expert_id: Option<Uuid>,
    pub expert_name: Option<String>,
    pub admin_advice: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub status: HarvestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::harvest_tracking::Entity")]
    Tracking,
    #[sea_orm(has_many = "super::harvest_phase::Entity")]
    Phases,
}

impl Related<super::harvest_tracking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tracking.def()
    }
}

impl Related<super::harvest_phase::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Phases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
