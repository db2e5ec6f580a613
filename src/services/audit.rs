use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::audit_record::{self, Entity as AuditRecordEntity},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{DeliveryRepository, HarvestRepository, OrderRepository},
    workflow::{Actor, EntityKind, UserRole, Workflow},
};

/// An audit record as returned by the history endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecordView {
    pub id: i64,
    pub entity_type: EntityKind,
    pub entity_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<audit_record::Model> for AuditRecordView {
    fn from(record: audit_record::Model) -> Self {
        Self {
            id: record.id,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            from_status: record.from_status,
            to_status: record.to_status,
            actor_id: record.actor_id,
            actor_role: record.actor_role,
            note: record.note,
            recorded_at: record.recorded_at,
        }
    }
}

/// `{status, updatedAt}` pair embedded in entity views.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub status: String,
    pub updated_at: DateTime<Utc>,
}

impl From<&audit_record::Model> for StatusHistoryEntry {
    fn from(record: &audit_record::Model) -> Self {
        Self {
            status: record.to_status.clone(),
            updated_at: record.recorded_at,
        }
    }
}

/// One status change about to be appended.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub kind: EntityKind,
    pub entity_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor: Actor,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn created<S: Workflow>(entity_id: Uuid, initial: S, actor: Actor, at: DateTime<Utc>) -> Self {
        Self {
            kind: S::KIND,
            entity_id,
            from_status: None,
            to_status: initial.to_string(),
            actor,
            note: None,
            recorded_at: at,
        }
    }

    pub fn transition<S: Workflow>(
        entity_id: Uuid,
        from: S,
        to: S,
        actor: Actor,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: S::KIND,
            entity_id,
            from_status: Some(from.to_string()),
            to_status: to.to_string(),
            actor,
            note: None,
            recorded_at: at,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }
}

/// Append-only status history for orders, deliveries and harvest requests.
#[derive(Clone)]
pub struct AuditTrail {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl AuditTrail {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Appends `entry` on `conn`, normally the caller's open transaction.
    pub async fn record<C: ConnectionTrait>(
        conn: &C,
        entry: &AuditEntry,
    ) -> Result<audit_record::Model, ServiceError> {
        audit_record::ActiveModel {
            id: NotSet,
            entity_type: Set(entry.kind),
            entity_id: Set(entry.entity_id),
            from_status: Set(entry.from_status.clone()),
            to_status: Set(entry.to_status.clone()),
            actor_id: Set(entry.actor.id),
            actor_role: Set(entry.actor.role),
            note: Set(entry.note.clone()),
            recorded_at: Set(entry.recorded_at),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            error!(error = %e, entity_id = %entry.entity_id, "Failed to append audit record");
            ServiceError::DatabaseError(e)
        })
    }

    /// Publishes committed records to the notification channel.
    pub async fn publish(&self, records: &[audit_record::Model]) {
        for record in records {
            self.event_sender
                .send_or_log(Event::StatusChanged {
                    audit_id: record.id,
                    entity: record.entity_type,
                    entity_id: record.entity_id,
                    from_status: record.from_status.clone(),
                    to_status: record.to_status.clone(),
                    actor_id: record.actor_id,
                    actor_role: record.actor_role,
                    at: record.recorded_at,
                })
                .await;
        }
    }

    pub async fn publish_event(&self, event: Event) {
        self.event_sender.send_or_log(event).await;
    }

    pub async fn history_on<C: ConnectionTrait>(
        conn: &C,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Vec<audit_record::Model>, ServiceError> {
        AuditRecordEntity::find()
            .filter(audit_record::Column::EntityType.eq(kind))
            .filter(audit_record::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_record::Column::Id)
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Chronological history, oldest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Vec<audit_record::Model>, ServiceError> {
        Self::history_on(&*self.db, kind, entity_id).await
    }

    pub async fn latest(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<Option<audit_record::Model>, ServiceError> {
        AuditRecordEntity::find()
            .filter(audit_record::Column::EntityType.eq(kind))
            .filter(audit_record::Column::EntityId.eq(entity_id))
            .order_by_desc(audit_record::Column::Id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// True when the entity's stored status equals the last record's `to_status`.
    #[instrument(skip(self))]
    pub async fn verify_consistency(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<bool, ServiceError> {
        let db = &*self.db;
        let current = match kind {
            EntityKind::Order => OrderRepository::find(db, entity_id).await?.status.to_string(),
            EntityKind::Delivery => DeliveryRepository::find(db, entity_id)
                .await?
                .status
                .to_string(),
            EntityKind::HarvestRequest => HarvestRepository::find(db, entity_id)
                .await?
                .status
                .to_string(),
        };

        let consistent = self
            .latest(kind, entity_id)
            .await?
            .map(|record| record.to_status == current)
            .unwrap_or(false);

        if !consistent {
            warn!(%kind, %entity_id, %current, "audit trail disagrees with stored status");
        }
        Ok(consistent)
    }
}
