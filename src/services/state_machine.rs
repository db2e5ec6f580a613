use chrono::{DateTime, Duration, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{audit_record, delivery, harvest_request, order},
    errors::ServiceError,
    repositories::{DeliveryRepository, HarvestRepository, OrderRepository},
    services::{
        audit::{AuditEntry, AuditTrail},
        clock::SharedClock,
        harvest::{create_timeline, PhasePlan},
        locks::EntityLocks,
    },
    workflow::{
        ensure_transition, parse_status, policy, Actor, Assignable, DeliveryStatus, EntityKind,
        HarvestStatus, OrderStatus, Workflow,
    },
};

/// Tunables the engine needs from configuration.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub delivery_fee: Decimal,
    pub cancellation_window: Duration,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            delivery_fee: Decimal::new(5000, 2),
            cancellation_window: Duration::hours(24),
        }
    }
}

/// Extra inputs some transitions consume.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    pub note: Option<String>,
    /// Required for →SCHEDULED unless the admin already proposed a date.
    pub scheduled_date: Option<NaiveDate>,
    /// Timeline created on →ACCEPTED; the default plan is used when absent.
    pub phases: Option<Vec<PhasePlan>>,
}

impl TransitionOptions {
    pub fn with_note(note: Option<String>) -> Self {
        Self {
            note,
            ..Default::default()
        }
    }
}

/// Result of the kind-agnostic [`StateMachineEngine::transition`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entityType", content = "entity", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdatedEntity {
    Order(order::Model),
    Delivery(delivery::Model),
    HarvestRequest(harvest_request::Model),
}

impl UpdatedEntity {
    pub fn status(&self) -> String {
        match self {
            UpdatedEntity::Order(m) => m.status.to_string(),
            UpdatedEntity::Delivery(m) => m.status.to_string(),
            UpdatedEntity::HarvestRequest(m) => m.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HarvestResponse {
    Accept,
    Reject,
}

pub(crate) fn count_transition<S: Workflow>(target: S) {
    counter!(
        "agrolink_transitions_total",
        1,
        "entity" => S::KIND.to_string(),
        "to" => target.to_string()
    );
}

/// Validates and applies status transitions for every workflow entity.
#[derive(Clone)]
pub struct StateMachineEngine {
    db: Arc<DatabaseConnection>,
    locks: EntityLocks,
    audit: AuditTrail,
    clock: SharedClock,
    settings: WorkflowSettings,
}

impl StateMachineEngine {
    pub fn new(
        db: Arc<DatabaseConnection>,
        locks: EntityLocks,
        audit: AuditTrail,
        clock: SharedClock,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            db,
            locks,
            audit,
            clock,
            settings,
        }
    }

    /// Kind-agnostic entry point; `target` is parsed against the kind's enum.
    pub async fn transition(
        &self,
        kind: EntityKind,
        id: Uuid,
        target: &str,
        actor: Actor,
        options: TransitionOptions,
    ) -> Result<UpdatedEntity, ServiceError> {
        match kind {
            EntityKind::Order => {
                let target = parse_status::<OrderStatus>(target)?;
                self.transition_order(actor, id, target, options.note)
                    .await
                    .map(UpdatedEntity::Order)
            }
            EntityKind::Delivery => {
                let target = parse_status::<DeliveryStatus>(target)?;
                self.transition_delivery(actor, id, target, options.note)
                    .await
                    .map(UpdatedEntity::Delivery)
            }
            EntityKind::HarvestRequest => {
                let target = parse_status::<HarvestStatus>(target)?;
                self.transition_harvest(actor, id, target, options)
                    .await
                    .map(UpdatedEntity::HarvestRequest)
            }
        }
    }

    #[instrument(skip(self, note), fields(order_id = %id, target = %target, actor_id = %actor.id))]
    pub async fn transition_order(
        &self,
        actor: Actor,
        id: Uuid,
        target: OrderStatus,
        note: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let db = &*self.db;

        // Order before delivery, always, so the cascade cannot deadlock.
        let _order_guard = self.locks.acquire(EntityKind::Order, id).await;
        let _delivery_guard = if target == OrderStatus::Cancelled {
            match DeliveryRepository::find_by_order(db, id).await? {
                Some(d) => Some(self.locks.acquire(EntityKind::Delivery, d.id).await),
                None => None,
            }
        } else {
            None
        };

        let now = self.clock.now();
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order transition");
            ServiceError::DatabaseError(e)
        })?;

        let current = OrderRepository::find(&txn, id).await?;
        ensure_transition(current.status, target).map_err(|e| {
            warn!(from = %current.status, "rejected order transition");
            e
        })?;
        policy::authorize_order(
            &actor,
            &current,
            target,
            now,
            self.settings.cancellation_window,
        )?;

        let updated = OrderRepository::update_status(&txn, &current, target, now).await?;
        let mut records = vec![
            AuditTrail::record(
                &txn,
                &AuditEntry::transition(id, current.status, target, actor, now).with_note(note),
            )
            .await?,
        ];

        if target == OrderStatus::Cancelled {
            records.extend(Self::cascade_order_cancellation(&txn, actor, &updated, now).await?);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order transition");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(target);
        info!(from = %current.status, to = %target, "Order status updated");
        self.audit.publish(&records).await;
        Ok(updated)
    }

    /// Cancels an order (and its live delivery) on behalf of `actor`.
    pub async fn cancel_order(
        &self,
        actor: Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        self.transition_order(actor, id, OrderStatus::Cancelled, reason)
            .await
    }

    /// Moves the order's delivery to CANCELLED inside the caller's transaction.
    /// A missing or already-terminal delivery is left untouched.
    async fn cascade_order_cancellation<C: ConnectionTrait>(
        conn: &C,
        actor: Actor,
        order: &order::Model,
        now: DateTime<Utc>,
    ) -> Result<Vec<audit_record::Model>, ServiceError> {
        let Some(delivery) = DeliveryRepository::find_by_order(conn, order.id).await? else {
            return Ok(Vec::new());
        };
        if delivery.status.is_terminal() {
            debug!(delivery_id = %delivery.id, status = %delivery.status, "cascade skipped; delivery already final");
            return Ok(Vec::new());
        }

        let cancelled = DeliveryRepository::update_state(
            conn,
            &delivery,
            DeliveryStatus::Cancelled,
            delivery.driver_id,
            now,
        )
        .await?;
        let record = AuditTrail::record(
            conn,
            &AuditEntry::transition(
                cancelled.id,
                delivery.status,
                DeliveryStatus::Cancelled,
                actor,
                now,
            )
            .with_note(Some("cascade: order cancelled".to_string())),
        )
        .await?;

        count_transition(DeliveryStatus::Cancelled);
        info!(delivery_id = %cancelled.id, order_id = %order.id, "Delivery cancelled with its order");
        Ok(vec![record])
    }

    #[instrument(skip(self, note), fields(delivery_id = %id, target = %target, actor_id = %actor.id))]
    pub async fn transition_delivery(
        &self,
        actor: Actor,
        id: Uuid,
        target: DeliveryStatus,
        note: Option<String>,
    ) -> Result<delivery::Model, ServiceError> {
        let _guard = self.locks.acquire(EntityKind::Delivery, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = DeliveryRepository::find(&txn, id).await?;
        ensure_transition(current.status, target)?;
        if target == DeliveryStatus::assigned() {
            return Err(ServiceError::InvalidTransition(
                "a delivery becomes ASSIGNED only by assigning a driver".to_string(),
            ));
        }
        policy::authorize_delivery(&actor, &current, target)?;

        let updated =
            DeliveryRepository::update_state(&txn, &current, target, current.driver_id, now)
                .await?;
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::transition(id, current.status, target, actor, now).with_note(note),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit delivery transition");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(target);
        info!(from = %current.status, to = %target, "Delivery status updated");
        self.audit.publish(&[record]).await;
        Ok(updated)
    }

    #[instrument(skip(self, options), fields(request_id = %id, target = %target, actor_id = %actor.id))]
    pub async fn transition_harvest(
        &self,
        actor: Actor,
        id: Uuid,
        target: HarvestStatus,
        options: TransitionOptions,
    ) -> Result<harvest_request::Model, ServiceError> {
        let _guard = self.locks.acquire(EntityKind::HarvestRequest, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = HarvestRepository::find(&txn, id).await?;
        let (updated, records) =
            Self::apply_harvest_transition(&txn, actor, &current, target, options, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit harvest transition");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(target);
        info!(from = %current.status, to = %target, "Harvest request status updated");
        self.audit.publish(&records).await;
        Ok(updated)
    }

    /// Validates and writes one harvest transition on an open transaction.
    /// The caller holds the entity lock and commits.
    pub(crate) async fn apply_harvest_transition<C: ConnectionTrait>(
        conn: &C,
        actor: Actor,
        current: &harvest_request::Model,
        target: HarvestStatus,
        options: TransitionOptions,
        now: DateTime<Utc>,
    ) -> Result<(harvest_request::Model, Vec<audit_record::Model>), ServiceError> {
        ensure_transition(current.status, target)?;
        if target == HarvestStatus::assigned() {
            return Err(ServiceError::InvalidTransition(
                "a harvest request becomes ASSIGNED only by assigning an agronomist".to_string(),
            ));
        }
        policy::authorize_harvest(&actor, current, target)?;

        let mut changes = harvest_request::ActiveModel {
            status: Set(target),
            ..Default::default()
        };

        match target {
            HarvestStatus::RequestPending => {
                changes.expert_id = Set(None);
                changes.expert_name = Set(None);
            }
            HarvestStatus::Accepted => {
                create_timeline(conn, current.id, options.phases.clone()).await?;
            }
            HarvestStatus::Scheduled => {
                let date = options
                    .scheduled_date
                    .or(current.scheduled_date)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(
                            "a scheduled date is required to schedule a harvest".to_string(),
                        )
                    })?;
                if date < current.created_at.date_naive() {
                    return Err(ServiceError::ValidationError(format!(
                        "scheduled date {} is before the request was made",
                        date
                    )));
                }
                changes.scheduled_date = Set(Some(date));
            }
            _ => {}
        }

        let updated = HarvestRepository::update(conn, current, changes, now).await?;
        let record = AuditTrail::record(
            conn,
            &AuditEntry::transition(current.id, current.status, target, actor, now)
                .with_note(options.note),
        )
        .await?;

        Ok((updated, vec![record]))
    }

    /// The assigned agronomist's answer to an assignment.
    pub async fn respond_to_harvest(
        &self,
        actor: Actor,
        id: Uuid,
        response: HarvestResponse,
        notes: Option<String>,
        phases: Option<Vec<PhasePlan>>,
    ) -> Result<harvest_request::Model, ServiceError> {
        let target = match response {
            HarvestResponse::Accept => HarvestStatus::Accepted,
            HarvestResponse::Reject => HarvestStatus::RequestPending,
        };
        self.transition_harvest(
            actor,
            id,
            target,
            TransitionOptions {
                note: notes,
                phases,
                ..Default::default()
            },
        )
        .await
    }

    pub async fn schedule_harvest(
        &self,
        actor: Actor,
        id: Uuid,
        scheduled_date: Option<NaiveDate>,
        notes: Option<String>,
    ) -> Result<harvest_request::Model, ServiceError> {
        self.transition_harvest(
            actor,
            id,
            HarvestStatus::Scheduled,
            TransitionOptions {
                note: notes,
                scheduled_date,
                ..Default::default()
            },
        )
        .await
    }
}
