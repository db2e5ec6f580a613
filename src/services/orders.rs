use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, Set, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    entities::{delivery, order, order_item},
    errors::ServiceError,
    events::Event,
    repositories::{DeliveryRepository, NewOrder, NewOrderItem, OrderRepository},
    services::{
        audit::{AuditEntry, AuditRecordView, AuditTrail},
        clock::SharedClock,
        state_machine::WorkflowSettings,
    },
    workflow::{
        labels::StatusBadge, policy, Actor, DeliveryStatus, DeliveryType, EntityKind, OrderStatus,
        UserRole, Workflow,
    },
};

/// Where a DELIVERY order should be taken.
#[derive(Debug, Clone)]
pub struct DeliveryDetails {
    pub address: String,
    pub contact_name: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<NewOrderItem>,
    pub delivery_type: DeliveryType,
    pub delivery: Option<DeliveryDetails>,
}

/// `ORD-YYYYMMDD-XXXXXXXX`: creation date plus the first eight hex digits of the id.
pub fn order_number(id: Uuid, created_at: DateTime<Utc>) -> String {
    let hex = id.simple().to_string();
    format!(
        "ORD-{}-{}",
        created_at.format("%Y%m%d"),
        hex[..8].to_uppercase()
    )
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub listing_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl From<order_item::Model> for OrderItemView {
    fn from(m: order_item::Model) -> Self {
        Self {
            listing_id: m.listing_id,
            quantity: m.quantity,
            unit_price: m.unit_price,
            line_total: m.line_total,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub delivery_type: DeliveryType,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub status_badge: StatusBadge,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
    /// Present on single-order reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<Uuid>,
}

impl From<order::Model> for OrderView {
    fn from(m: order::Model) -> Self {
        Self {
            id: m.id,
            order_number: m.order_number,
            customer_id: m.customer_id,
            delivery_type: m.delivery_type,
            subtotal: m.subtotal,
            delivery_fee: m.delivery_fee,
            total: m.total,
            status_badge: StatusBadge::of(m.status),
            status: m.status,
            created_at: m.created_at,
            updated_at: m.updated_at,
            version: m.version,
            items: None,
            delivery_id: None,
        }
    }
}

/// Checkout and order reads.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    audit: AuditTrail,
    clock: SharedClock,
    settings: WorkflowSettings,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        audit: AuditTrail,
        clock: SharedClock,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            db,
            audit,
            clock,
            settings,
        }
    }

    /// Creates the order, its items and, for DELIVERY orders, the delivery,
    /// each with its creation audit record, in one transaction.
    #[instrument(skip(self, request), fields(customer_id = %actor.id, items = request.items.len()))]
    pub async fn place_order(
        &self,
        actor: Actor,
        request: PlaceOrder,
    ) -> Result<OrderView, ServiceError> {
        if !matches!(actor.role, UserRole::Buyer | UserRole::Farmer) {
            return Err(ServiceError::Forbidden(
                "only buyers and farmers can place orders".to_string(),
            ));
        }
        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "an order needs at least one item".to_string(),
            ));
        }
        if let Some(bad) = request
            .items
            .iter()
            .find(|i| i.quantity <= 0 || i.unit_price < Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(format!(
                "listing {} has an invalid quantity or price",
                bad.listing_id
            )));
        }
        let details = match (request.delivery_type, request.delivery) {
            (DeliveryType::Delivery, Some(d))
                if !d.address.trim().is_empty()
                    && !d.contact_name.trim().is_empty()
                    && !d.phone.trim().is_empty() =>
            {
                Some(d)
            }
            (DeliveryType::Delivery, _) => {
                return Err(ServiceError::ValidationError(
                    "delivery orders need an address, contact name and phone".to_string(),
                ))
            }
            (DeliveryType::Pickup, _) => None,
        };

        let now = self.clock.now();
        let id = Uuid::new_v4();
        let new_order = NewOrder {
            id,
            order_number: order_number(id, now),
            customer_id: actor.id,
            delivery_type: request.delivery_type,
            delivery_fee: match request.delivery_type {
                DeliveryType::Delivery => self.settings.delivery_fee,
                DeliveryType::Pickup => Decimal::ZERO,
            },
            items: request.items,
            created_at: now,
        };
        new_order.total()?;

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start checkout transaction");
            ServiceError::DatabaseError(e)
        })?;

        let (order, items) = OrderRepository::insert(&txn, &new_order).await?;
        let mut records = vec![
            AuditTrail::record(
                &txn,
                &AuditEntry::created(id, OrderStatus::initial(), actor, now),
            )
            .await?,
        ];

        let delivery = match details {
            Some(d) => {
                let created = DeliveryRepository::insert(
                    &txn,
                    delivery::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        order_id: Set(id),
                        customer_id: Set(actor.id),
                        driver_id: Set(None),
                        address: Set(d.address.trim().to_string()),
                        contact_name: Set(d.contact_name.trim().to_string()),
                        phone: Set(d.phone.trim().to_string()),
                        status: Set(DeliveryStatus::initial()),
                        created_at: Set(now),
                        updated_at: Set(now),
                        version: Set(1),
                    },
                )
                .await?;
                records.push(
                    AuditTrail::record(
                        &txn,
                        &AuditEntry::created(created.id, DeliveryStatus::initial(), actor, now),
                    )
                    .await?,
                );
                Some(created)
            }
            None => None,
        };

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit checkout");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_number = %order.order_number,
            total = %order.total,
            "Order placed"
        );
        self.audit.publish(&records).await;
        self.audit
            .publish_event(Event::OrderPlaced {
                order_id: id,
                customer_id: actor.id,
                delivery_id: delivery.as_ref().map(|d| d.id),
            })
            .await;

        let mut view = OrderView::from(order);
        view.items = Some(items.into_iter().map(Into::into).collect());
        view.delivery_id = delivery.map(|d| d.id);
        Ok(view)
    }

    async fn visible(&self, actor: &Actor, id: Uuid) -> Result<order::Model, ServiceError> {
        let order = OrderRepository::find(&*self.db, id).await?;
        if policy::can_view_order(actor, &order) {
            Ok(order)
        } else {
            Err(ServiceError::Forbidden(
                "you may not view this order".to_string(),
            ))
        }
    }

    pub async fn get_order(&self, actor: &Actor, id: Uuid) -> Result<OrderView, ServiceError> {
        let order = self.visible(actor, id).await?;
        self.detail(order).await
    }

    /// Full view with items and the linked delivery id.
    pub async fn detail(&self, order: order::Model) -> Result<OrderView, ServiceError> {
        let db = &*self.db;
        let items = OrderRepository::items(db, order.id).await?;
        let delivery = DeliveryRepository::find_by_order(db, order.id).await?;

        let mut view = OrderView::from(order);
        view.items = Some(items.into_iter().map(Into::into).collect());
        view.delivery_id = delivery.map(|d| d.id);
        Ok(view)
    }

    pub async fn history(
        &self,
        actor: &Actor,
        id: Uuid,
    ) -> Result<Vec<AuditRecordView>, ServiceError> {
        self.visible(actor, id).await?;
        Ok(self
            .audit
            .history(EntityKind::Order, id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn order_number_uses_date_and_id_prefix() {
        let id = Uuid::parse_str("3f2a9c1e-0000-4000-8000-000000000000").unwrap();
        let at = Utc.with_ymd_and_hms(2025, 4, 7, 12, 0, 0).unwrap();
        assert_eq!(order_number(id, at), "ORD-20250407-3F2A9C1E");
    }
}
