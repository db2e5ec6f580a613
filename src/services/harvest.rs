use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{harvest_phase, harvest_request, harvest_tracking},
    errors::ServiceError,
    events::Event,
    repositories::HarvestRepository,
    services::{
        audit::{AuditEntry, AuditRecordView, AuditTrail},
        clock::SharedClock,
        locks::EntityLocks,
        state_machine::{count_transition, StateMachineEngine, TransitionOptions},
    },
    workflow::{
        labels::StatusBadge, policy, Actor, EntityKind, HarvestStatus, PhaseStatus, UserRole,
        Workflow,
    },
};

/// One phase of a harvest schedule as requested by the agronomist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhasePlan {
    pub phase: String,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl PhasePlan {
    fn new(phase: &str, activities: &[&str]) -> Self {
        Self {
            phase: phase.to_string(),
            activities: activities.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Four-phase plan used when an agronomist accepts without supplying one.
pub fn default_timeline() -> Vec<PhasePlan> {
    vec![
        PhasePlan::new(
            "Pre-harvest assessment",
            &["Field inspection", "Crop maturity check", "Weather review"],
        ),
        PhasePlan::new(
            "Harvest preparation",
            &["Arrange labour", "Prepare equipment", "Arrange storage"],
        ),
        PhasePlan::new("Harvesting", &["Harvest crop", "Record yield"]),
        PhasePlan::new(
            "Post-harvest handling",
            &["Drying and cleaning", "Grading", "Storage or dispatch"],
        ),
    ]
}

/// Replaces the request's timeline with `phases` (or the default plan).
pub(crate) async fn create_timeline<C: ConnectionTrait>(
    conn: &C,
    request_id: Uuid,
    phases: Option<Vec<PhasePlan>>,
) -> Result<Vec<harvest_phase::Model>, ServiceError> {
    let plan = match phases {
        Some(p) if !p.is_empty() => p,
        _ => default_timeline(),
    };
    if let Some(blank) = plan.iter().position(|p| p.phase.trim().is_empty()) {
        return Err(ServiceError::ValidationError(format!(
            "phase {} has no name",
            blank + 1
        )));
    }

    HarvestRepository::delete_phases(conn, request_id).await?;
    let mut created = Vec::with_capacity(plan.len());
    for (index, step) in plan.into_iter().enumerate() {
        let model = harvest_phase::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_id: Set(request_id),
            position: Set(index as i32 + 1),
            phase: Set(step.phase.trim().to_string()),
            status: Set(PhaseStatus::Pending),
            activities: Set(serde_json::json!(step.activities)),
            notes: Set(None),
            completed_at: Set(None),
        };
        created.push(HarvestRepository::insert_phase(conn, model).await?);
    }
    Ok(created)
}

#[derive(Debug, Clone)]
pub struct NewHarvestRequest {
    pub crop: String,
    pub expected_yield: Decimal,
    pub yield_unit: Option<String>,
    pub harvest_date: NaiveDate,
    pub location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestRequestView {
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
    pub status_badge: StatusBadge,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl From<harvest_request::Model> for HarvestRequestView {
    fn from(m: harvest_request::Model) -> Self {
        Self {
            id: m.id,
            farmer_id: m.farmer_id,
            crop: m.crop,
            expected_yield: m.expected_yield,
            yield_unit: m.yield_unit,
            harvest_date: m.harvest_date,
            location: m.location,
            notes: m.notes,
            expert_id: m.expert_id,
            expert_name: m.expert_name,
            admin_advice: m.admin_advice,
            scheduled_date: m.scheduled_date,
            status_badge: StatusBadge::of(m.status),
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            version: m.version,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntryView {
    pub progress: i32,
    pub notes: Option<String>,
    pub updated_by: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl From<harvest_tracking::Model> for TrackingEntryView {
    fn from(m: harvest_tracking::Model) -> Self {
        Self {
            progress: m.progress,
            notes: m.notes,
            updated_by: m.updated_by,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PhaseView {
    pub position: i32,
    pub phase: String,
    pub status: PhaseStatus,
    pub activities: Vec<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<harvest_phase::Model> for PhaseView {
    fn from(m: harvest_phase::Model) -> Self {
        Self {
            activities: m.activity_list(),
            position: m.position,
            phase: m.phase,
            status: m.status,
            notes: m.notes,
            completed_at: m.completed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestScheduleView {
    pub timeline: Vec<PhaseView>,
}

/// A request with its tracking entries and schedule.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HarvestDetailView {
    #[serde(flatten)]
    pub request: HarvestRequestView,
    /// Newest first.
    pub tracking: Vec<TrackingEntryView>,
    pub harvest_schedule: Option<HarvestScheduleView>,
}

/// Harvest request lifecycle outside plain status transitions: creation,
/// progress tracking and phase updates.
#[derive(Clone)]
pub struct HarvestService {
    db: Arc<DatabaseConnection>,
    locks: EntityLocks,
    audit: AuditTrail,
    clock: SharedClock,
}

impl HarvestService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: EntityLocks,
        audit: AuditTrail,
        clock: SharedClock,
    ) -> Self {
        Self {
            db,
            locks,
            audit,
            clock,
        }
    }

    #[instrument(skip(self, request), fields(farmer_id = %actor.id))]
    pub async fn create_request(
        &self,
        actor: Actor,
        request: NewHarvestRequest,
    ) -> Result<HarvestDetailView, ServiceError> {
        if actor.role != UserRole::Farmer {
            return Err(ServiceError::Forbidden(
                "only farmers can request harvest assistance".to_string(),
            ));
        }
        if request.crop.trim().is_empty() {
            return Err(ServiceError::ValidationError("crop is required".to_string()));
        }
        if request.expected_yield <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "expected yield must be greater than zero".to_string(),
            ));
        }

        let now = self.clock.now();
        let id = Uuid::new_v4();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let model = harvest_request::ActiveModel {
            id: Set(id),
            farmer_id: Set(actor.id),
            crop: Set(request.crop.trim().to_string()),
            expected_yield: Set(request.expected_yield),
            yield_unit: Set(request
                .yield_unit
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| "kg".to_string())),
            harvest_date: Set(request.harvest_date),
            location: Set(request.location),
            notes: Set(request.notes),
            expert_id: Set(None),
            expert_name: Set(None),
            admin_advice: Set(None),
            scheduled_date: Set(None),
            status: Set(HarvestStatus::initial()),
            created_at: Set(now),
            updated_at: Set(now),
            version: Set(1),
        };
        let created = HarvestRepository::insert(&txn, model).await?;
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::created(id, HarvestStatus::initial(), actor, now),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit harvest request");
            ServiceError::DatabaseError(e)
        })?;

        info!(request_id = %id, crop = %created.crop, "Harvest request created");
        self.audit.publish(&[record]).await;

        Ok(HarvestDetailView {
            request: created.into(),
            tracking: Vec::new(),
            harvest_schedule: None,
        })
    }

    async fn visible(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<harvest_request::Model, ServiceError> {
        let request = HarvestRepository::find(&*self.db, id).await?;
        if policy::can_view_harvest(actor, &request) {
            Ok(request)
        } else {
            Err(ServiceError::Forbidden(
                "you may not view this harvest request".to_string(),
            ))
        }
    }

    pub async fn get_harvest(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<HarvestDetailView, ServiceError> {
        let request = self.visible(actor, id).await?;
        self.detail(request).await
    }

    /// Builds the detail view for an already-authorized request.
    pub async fn detail(
        &self,
        request: harvest_request::Model,
    ) -> Result<HarvestDetailView, ServiceError> {
        let db = &*self.db;
        let mut tracking: Vec<TrackingEntryView> = HarvestRepository::tracking(db, request.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        tracking.reverse();

        let phases = HarvestRepository::phases(db, request.id).await?;
        let harvest_schedule = if phases.is_empty() {
            None
        } else {
            Some(HarvestScheduleView {
                timeline: phases.into_iter().map(Into::into).collect(),
            })
        };

        Ok(HarvestDetailView {
            request: request.into(),
            tracking,
            harvest_schedule,
        })
    }

    pub async fn history(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<AuditRecordView>, ServiceError> {
        self.visible(actor, id).await?;
        Ok(self
            .audit
            .history(EntityKind::HarvestRequest, id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Appends a tracking entry. From SCHEDULED this also starts the harvest.
    #[instrument(skip(self, notes), fields(request_id = %id, actor_id = %actor.id))]
    pub async fn record_progress(
        &self,
        actor: Actor,
        id: Uuid,
        progress: i32,
        notes: Option<String>,
    ) -> Result<HarvestDetailView, ServiceError> {
        if !(0..=100).contains(&progress) {
            return Err(ServiceError::ValidationError(format!(
                "progress must be between 0 and 100, got {}",
                progress
            )));
        }

        let _guard = self.locks.acquire(EntityKind::HarvestRequest, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let mut current = HarvestRepository::find(&txn, id).await?;
        let involved = actor.is_admin()
            || actor.is(current.farmer_id)
            || (actor.role == UserRole::Agronomist && actor.is_opt(current.expert_id));
        if !involved {
            return Err(ServiceError::Forbidden(
                "only the farmer, the assigned agronomist or an admin may record progress"
                    .to_string(),
            ));
        }
        if !matches!(
            current.status,
            HarvestStatus::Scheduled | HarvestStatus::InProgress
        ) {
            warn!(status = %current.status, "progress rejected outside an active harvest");
            return Err(ServiceError::InvalidTransition(format!(
                "progress can only be recorded while SCHEDULED or IN_PROGRESS, request is {}",
                current.status
            )));
        }
        if let Some(last) = HarvestRepository::latest_tracking(&txn, id).await? {
            if progress < last.progress {
                return Err(ServiceError::ValidationError(format!(
                    "progress cannot go back from {} to {}",
                    last.progress, progress
                )));
            }
        }

        let mut records = Vec::new();
        let started = current.status == HarvestStatus::Scheduled;
        if started {
            let (updated, mut written) = StateMachineEngine::apply_harvest_transition(
                &txn,
                actor,
                &current,
                HarvestStatus::InProgress,
                TransitionOptions::with_note(Some(format!("progress {}%", progress))),
                now,
            )
            .await?;
            records.append(&mut written);
            current = updated;
        }

        HarvestRepository::insert_tracking(
            &txn,
            harvest_tracking::ActiveModel {
                id: Set(Uuid::new_v4()),
                request_id: Set(id),
                progress: Set(progress),
                notes: Set(notes),
                updated_by: Set(actor.id),
                updated_at: Set(now),
            },
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit harvest progress");
            ServiceError::DatabaseError(e)
        })?;

        if started {
            count_transition(HarvestStatus::InProgress);
        }
        info!(progress, "Harvest progress recorded");
        self.audit.publish(&records).await;
        self.audit
            .publish_event(Event::HarvestProgressRecorded {
                request_id: id,
                progress,
                updated_by: actor.id,
            })
            .await;

        self.detail(current).await
    }

    /// Moves one timeline phase. COMPLETED stamps `completed_at`.
    #[instrument(skip(self, notes), fields(request_id = %id, position, actor_id = %actor.id))]
    pub async fn update_phase(
        &self,
        actor: Actor,
        id: Uuid,
        position: i32,
        status: PhaseStatus,
        notes: Option<String>,
    ) -> Result<PhaseView, ServiceError> {
        let _guard = self.locks.acquire(EntityKind::HarvestRequest, id).await;
        let now = self.clock.now();
        let db = &*self.db;

        let request = HarvestRepository::find(db, id).await?;
        let is_expert = actor.role == UserRole::Agronomist && actor.is_opt(request.expert_id);
        if !(actor.is_admin() || is_expert) {
            return Err(ServiceError::Forbidden(
                "only the assigned agronomist or an admin may update the schedule".to_string(),
            ));
        }
        if !matches!(
            request.status,
            HarvestStatus::Accepted | HarvestStatus::Scheduled | HarvestStatus::InProgress
        ) {
            return Err(ServiceError::InvalidTransition(format!(
                "the schedule cannot change while the request is {}",
                request.status
            )));
        }

        let phase = HarvestRepository::find_phase(db, id, position).await?;
        let mut active: harvest_phase::ActiveModel = phase.into();
        active.status = Set(status);
        active.completed_at = Set((status == PhaseStatus::Completed).then_some(now));
        if notes.is_some() {
            active.notes = Set(notes);
        }
        let updated = HarvestRepository::update_phase(db, active).await?;

        info!(phase = %updated.phase, status = %status, "Harvest phase updated");
        Ok(updated.into())
    }
}
