use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::delivery,
    errors::ServiceError,
    repositories::{DeliveryRepository, OrderRepository},
    services::audit::{AuditRecordView, AuditTrail, StatusHistoryEntry},
    workflow::{labels::StatusBadge, policy, Actor, DeliveryStatus, EntityKind},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub address: String,
    pub contact_name: String,
    pub phone: String,
    pub status: DeliveryStatus,
    pub status_badge: StatusBadge,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    /// Oldest first, taken from the audit trail. Present on single reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_history: Option<Vec<StatusHistoryEntry>>,
}

impl From<delivery::Model> for DeliveryView {
    fn from(m: delivery::Model) -> Self {
        Self {
            id: m.id,
            order_id: m.order_id,
            customer_id: m.customer_id,
            driver_id: m.driver_id,
            address: m.address,
            contact_name: m.contact_name,
            phone: m.phone,
            status_badge: StatusBadge::of(m.status),
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            version: m.version,
            status_history: None,
        }
    }
}

/// Delivery reads; writes go through the engine and the coordinator.
#[derive(Clone)]
pub struct DeliveryService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
}

impl DeliveryService {
    pub fn new(db: Arc<DatabaseConnection>, audit: AuditTrail) -> Self {
        Self { db, audit }
    }

    fn check_visible(actor: &Actor, delivery: &delivery::Model) -> Result<(), ServiceError> {
        if policy::can_view_delivery(actor, delivery) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "you may not view this delivery".to_string(),
            ))
        }
    }

    pub async fn get_delivery(&self, actor: &Actor, id: Uuid) -> Result<DeliveryView, ServiceError> {
        let delivery = DeliveryRepository::find(&*self.db, id).await?;
        Self::check_visible(actor, &delivery)?;
        self.detail(delivery).await
    }

    pub async fn get_delivery_for_order(
        &self,
        actor: &Actor,
        order_id: Uuid,
    ) -> Result<DeliveryView, ServiceError> {
        let db = &*self.db;
        let Some(delivery) = DeliveryRepository::find_by_order(db, order_id).await? else {
            // Distinguish an unknown order from a pickup order.
            OrderRepository::find(db, order_id).await?;
            return Err(ServiceError::NotFound(format!(
                "Order {} has no delivery",
                order_id
            )));
        };
        Self::check_visible(actor, &delivery)?;
        self.detail(delivery).await
    }

    /// View with `statusHistory` filled from the audit trail.
    pub async fn detail(&self, delivery: delivery::Model) -> Result<DeliveryView, ServiceError> {
        let history = self.audit.history(EntityKind::Delivery, delivery.id).await?;
        let mut view = DeliveryView::from(delivery);
        view.status_history = Some(history.iter().map(StatusHistoryEntry::from).collect());
        Ok(view)
    }

    pub async fn history(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<AuditRecordView>, ServiceError> {
        let delivery = DeliveryRepository::find(&*self.db, id).await?;
        Self::check_visible(actor, &delivery)?;
        Ok(self
            .audit
            .history(EntityKind::Delivery, id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}
