use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::{delivery, harvest_request, user},
    errors::ServiceError,
    events::Event,
    repositories::{DeliveryRepository, HarvestRepository, UserRepository},
    services::{
        audit::{AuditEntry, AuditTrail},
        clock::SharedClock,
        locks::EntityLocks,
        state_machine::count_transition,
    },
    workflow::{
        policy, AccountStatus, Actor, Assignable, Availability, DeliveryStatus, EntityKind,
        HarvestStatus, Workflow,
    },
};

/// Admin input when binding an agronomist to a harvest request.
#[derive(Debug, Clone)]
pub struct HarvestAssignment {
    pub expert_id: Uuid,
    pub expert_name: Option<String>,
    pub admin_advice: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub expected_version: Option<i32>,
}

/// Decides whether an assignment may replace the current state.
///
/// First assignment needs no version. Replacing an existing assignee is only
/// allowed while still ASSIGNED and only with the caller's view of the
/// version, so two racing assigns cannot both win.
pub(crate) fn check_assignable<S: Assignable>(
    status: S,
    current_assignee: Option<Uuid>,
    version: i32,
    expected_version: Option<i32>,
    new_assignee: Uuid,
) -> Result<(), ServiceError> {
    if status.is_terminal() {
        return Err(ServiceError::InvalidTransition(format!(
            "{} is {} which is terminal",
            S::KIND,
            status
        )));
    }

    if status != S::unassigned() && status != S::assigned() {
        return Err(ServiceError::InvalidTransition(format!(
            "{} is already {}; unassign before assigning someone else",
            S::KIND,
            status
        )));
    }

    if let Some(expected) = expected_version {
        if expected != version {
            return Err(ServiceError::Conflict(format!(
                "{} version is {}, not {}",
                S::KIND,
                version,
                expected
            )));
        }
    }

    if status == S::unassigned() {
        return Ok(());
    }

    match current_assignee {
        Some(existing) if expected_version.is_none() => Err(ServiceError::Conflict(format!(
            "{} is already assigned to {}; pass the current version to reassign",
            S::KIND,
            existing
        ))),
        Some(existing) if existing == new_assignee => Err(ServiceError::IneligibleAssignee(
            "already assigned to this user".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Loads `assignee_id` and checks it can take work for workflow `S`.
pub(crate) async fn eligible_assignee<S: Assignable, C: ConnectionTrait>(
    conn: &C,
    assignee_id: Uuid,
) -> Result<user::Model, ServiceError> {
    let candidate = UserRepository::find_optional(conn, assignee_id)
        .await?
        .ok_or_else(|| {
            ServiceError::IneligibleAssignee(format!("user {} does not exist", assignee_id))
        })?;

    if candidate.role != S::ASSIGNEE_ROLE {
        return Err(ServiceError::IneligibleAssignee(format!(
            "{} is a {}, a {} is required",
            candidate.name,
            candidate.role,
            S::ASSIGNEE_ROLE
        )));
    }
    if candidate.status != AccountStatus::Active {
        return Err(ServiceError::IneligibleAssignee(format!(
            "{}'s account is {}",
            candidate.name, candidate.status
        )));
    }
    if candidate.availability != Availability::Available {
        return Err(ServiceError::IneligibleAssignee(format!(
            "{} is currently unavailable",
            candidate.name
        )));
    }
    Ok(candidate)
}

/// Binds drivers to deliveries and agronomists to harvest requests.
#[derive(Clone)]
pub struct AssignmentCoordinator {
    db: Arc<DatabaseConnection>,
    locks: EntityLocks,
    audit: AuditTrail,
    clock: SharedClock,
}

impl AssignmentCoordinator {
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

    #[instrument(skip(self), fields(actor_id = %actor.id))]
    pub async fn assign_delivery(
        &self,
        actor: Actor,
        id: Uuid,
        driver_id: Uuid,
        expected_version: Option<i32>,
    ) -> Result<delivery::Model, ServiceError> {
        policy::authorize_assignment(&actor)?;

        let _guard = self.locks.acquire(EntityKind::Delivery, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = DeliveryRepository::find(&txn, id).await?;
        check_assignable(
            current.status,
            current.driver_id,
            current.version,
            expected_version,
            driver_id,
        )
        .map_err(|e| {
            warn!(status = %current.status, "delivery assignment rejected: {}", e);
            e
        })?;
        let driver = eligible_assignee::<DeliveryStatus, _>(&txn, driver_id).await?;

        let updated = DeliveryRepository::update_state(
            &txn,
            &current,
            DeliveryStatus::Assigned,
            Some(driver.id),
            now,
        )
        .await?;
        let note = match current.driver_id {
            Some(previous) => format!("driver {} replaced by {}", previous, driver.name),
            None => format!("driver {} assigned", driver.name),
        };
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::transition(id, current.status, DeliveryStatus::Assigned, actor, now)
                .with_note(Some(note)),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit delivery assignment");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(DeliveryStatus::Assigned);
        info!(delivery_id = %id, driver_id = %driver.id, "Driver assigned");
        self.audit.publish(&[record]).await;
        self.audit
            .publish_event(Event::AssigneeChanged {
                entity: EntityKind::Delivery,
                entity_id: id,
                assignee_id: Some(driver.id),
                previous_assignee_id: current.driver_id,
            })
            .await;

        Ok(updated)
    }

    #[instrument(skip(self, assignment), fields(request_id = %id, expert_id = %assignment.expert_id, actor_id = %actor.id))]
    pub async fn assign_harvest(
        &self,
        actor: Actor,
        id: Uuid,
        assignment: HarvestAssignment,
    ) -> Result<harvest_request::Model, ServiceError> {
        policy::authorize_assignment(&actor)?;

        let _guard = self.locks.acquire(EntityKind::HarvestRequest, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = HarvestRepository::find(&txn, id).await?;
        check_assignable(
            current.status,
            current.expert_id,
            current.version,
            assignment.expected_version,
            assignment.expert_id,
        )
        .map_err(|e| {
            warn!(status = %current.status, "harvest assignment rejected: {}", e);
            e
        })?;
        let expert = eligible_assignee::<HarvestStatus, _>(&txn, assignment.expert_id).await?;

        if let Some(date) = assignment.scheduled_date {
            if date < current.created_at.date_naive() {
                return Err(ServiceError::ValidationError(format!(
                    "proposed date {} is before the request was made",
                    date
                )));
            }
        }

        let expert_name = assignment
            .expert_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| expert.name.clone());
        let changes = harvest_request::ActiveModel {
            status: Set(HarvestStatus::Assigned),
            expert_id: Set(Some(expert.id)),
            expert_name: Set(Some(expert_name)),
            admin_advice: Set(assignment.admin_advice),
            scheduled_date: Set(assignment.scheduled_date),
            ..Default::default()
        };
        let updated = HarvestRepository::update(&txn, &current, changes, now).await?;

        let note = match current.expert_id {
            Some(previous) => format!("agronomist {} replaced by {}", previous, expert.name),
            None => format!("agronomist {} assigned", expert.name),
        };
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::transition(id, current.status, HarvestStatus::Assigned, actor, now)
                .with_note(Some(note)),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit harvest assignment");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(HarvestStatus::Assigned);
        info!(expert = %expert.name, "Agronomist assigned");
        self.audit.publish(&[record]).await;
        self.audit
            .publish_event(Event::AssigneeChanged {
                entity: EntityKind::HarvestRequest,
                entity_id: id,
                assignee_id: Some(expert.id),
                previous_assignee_id: current.expert_id,
            })
            .await;

        Ok(updated)
    }

    #[instrument(skip(self, reason), fields(delivery_id = %id, actor_id = %actor.id))]
    pub async fn unassign_delivery(
        &self,
        actor: Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<delivery::Model, ServiceError> {
        policy::authorize_assignment(&actor)?;

        let _guard = self.locks.acquire(EntityKind::Delivery, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = DeliveryRepository::find(&txn, id).await?;
        let Some(previous) = current.driver_id.filter(|_| current.status.can_unassign()) else {
            return Err(ServiceError::InvalidTransition(format!(
                "delivery is {} and has no driver to remove",
                current.status
            )));
        };

        let target = DeliveryStatus::unassigned();
        let updated = DeliveryRepository::update_state(&txn, &current, target, None, now).await?;
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::transition(id, current.status, target, actor, now)
                .with_note(reason.or_else(|| Some("driver unassigned".to_string()))),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit delivery unassignment");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(target);
        info!(driver_id = %previous, "Driver unassigned");
        self.audit.publish(&[record]).await;
        self.audit
            .publish_event(Event::AssigneeChanged {
                entity: EntityKind::Delivery,
                entity_id: id,
                assignee_id: None,
                previous_assignee_id: Some(previous),
            })
            .await;

        Ok(updated)
    }

    #[instrument(skip(self, reason), fields(request_id = %id, actor_id = %actor.id))]
    pub async fn unassign_harvest(
        &self,
        actor: Actor,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<harvest_request::Model, ServiceError> {
        policy::authorize_assignment(&actor)?;

        let _guard = self.locks.acquire(EntityKind::HarvestRequest, id).await;
        let now = self.clock.now();
        let txn = self.db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = HarvestRepository::find(&txn, id).await?;
        let Some(previous) = current.expert_id.filter(|_| current.status.can_unassign()) else {
            return Err(ServiceError::InvalidTransition(format!(
                "harvest request is {} and has no agronomist to remove",
                current.status
            )));
        };

        let target = HarvestStatus::unassigned();
        HarvestRepository::delete_phases(&txn, id).await?;
        let changes = harvest_request::ActiveModel {
            status: Set(target),
            expert_id: Set(None),
            expert_name: Set(None),
            scheduled_date: Set(None),
            ..Default::default()
        };
        let updated = HarvestRepository::update(&txn, &current, changes, now).await?;
        let record = AuditTrail::record(
            &txn,
            &AuditEntry::transition(id, current.status, target, actor, now)
                .with_note(reason.or_else(|| Some("agronomist unassigned".to_string()))),
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit harvest unassignment");
            ServiceError::DatabaseError(e)
        })?;

        count_transition(target);
        info!(expert_id = %previous, "Agronomist unassigned");
        self.audit.publish(&[record]).await;
        self.audit
            .publish_event(Event::AssigneeChanged {
                entity: EntityKind::HarvestRequest,
                entity_id: id,
                assignee_id: None,
                previous_assignee_id: Some(previous),
            })
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn first_assignment_needs_no_version() {
        assert!(check_assignable(DeliveryStatus::Pending, None, 1, None, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn reassignment_without_version_conflicts() {
        let current = Uuid::new_v4();
        assert_matches!(
            check_assignable(DeliveryStatus::Assigned, Some(current), 2, None, Uuid::new_v4()),
            Err(ServiceError::Conflict(_))
        );
    }

    #[test]
    fn stale_version_conflicts() {
        assert_matches!(
            check_assignable(DeliveryStatus::Pending, None, 3, Some(2), Uuid::new_v4()),
            Err(ServiceError::Conflict(_))
        );
    }

    #[test]
    fn reassignment_with_current_version_is_allowed() {
        let current = Uuid::new_v4();
        assert!(check_assignable(
            HarvestStatus::Assigned,
            Some(current),
            2,
            Some(2),
            Uuid::new_v4()
        )
        .is_ok());
        assert_matches!(
            check_assignable(HarvestStatus::Assigned, Some(current), 2, Some(2), current),
            Err(ServiceError::IneligibleAssignee(_))
        );
    }

    #[test]
    fn accepted_work_must_be_unassigned_first() {
        assert_matches!(
            check_assignable(
                HarvestStatus::Accepted,
                Some(Uuid::new_v4()),
                4,
                Some(4),
                Uuid::new_v4()
            ),
            Err(ServiceError::InvalidTransition(_))
        );
        assert_matches!(
            check_assignable(
                DeliveryStatus::Completed,
                Some(Uuid::new_v4()),
                6,
                None,
                Uuid::new_v4()
            ),
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[test]
    fn status_past_assigned_wins_over_a_stale_version() {
        assert_matches!(
            check_assignable(
                DeliveryStatus::InTransit,
                Some(Uuid::new_v4()),
                5,
                Some(2),
                Uuid::new_v4()
            ),
            Err(ServiceError::InvalidTransition(_))
        );
        assert_matches!(
            check_assignable(
                HarvestStatus::Accepted,
                Some(Uuid::new_v4()),
                4,
                Some(1),
                Uuid::new_v4()
            ),
            Err(ServiceError::InvalidTransition(_))
        );
    }
}
