use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::error;
use uuid::Uuid;

use crate::entities::{
    order::{self, Entity as OrderEntity},
    order_item::{self, Entity as OrderItemEntity},
};
use crate::errors::ServiceError;
use crate::workflow::{DeliveryType, OrderStatus};

use super::update_versioned;

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub listing_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

fn out_of_range() -> ServiceError {
    ServiceError::ValidationError("order total is out of range".to_string())
}

impl NewOrderItem {
    pub fn line_total(&self) -> Result<Decimal, ServiceError> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(out_of_range)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub delivery_type: DeliveryType,
    pub delivery_fee: Decimal,
    pub items: Vec<NewOrderItem>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn subtotal(&self) -> Result<Decimal, ServiceError> {
        self.items.iter().try_fold(Decimal::ZERO, |acc, item| {
            acc.checked_add(item.line_total()?).ok_or_else(out_of_range)
        })
    }

    /// Σ unit_price × quantity + delivery fee. The only place a total is computed.
    pub fn total(&self) -> Result<Decimal, ServiceError> {
        self.subtotal()?
            .checked_add(self.delivery_fee)
            .ok_or_else(out_of_range)
    }
}

pub struct OrderRepository;

impl OrderRepository {
    pub async fn find_optional<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<Option<order::Model>, ServiceError> {
        OrderEntity::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find<C: ConnectionTrait>(
        conn: &C,
        id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Self::find_optional(conn, id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", id))
    }

    pub async fn items<C: ConnectionTrait>(
        conn: &C,
        order_id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::ListingId)
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Inserts the order row and its items.
    pub async fn insert<C: ConnectionTrait>(
        conn: &C,
        new_order: &NewOrder,
    ) -> Result<(order::Model, Vec<order_item::Model>), ServiceError> {
        let subtotal = new_order.subtotal()?;
        let total = new_order.total()?;
        let order = order::ActiveModel {
            id: Set(new_order.id),
            order_number: Set(new_order.order_number.clone()),
            customer_id: Set(new_order.customer_id),
            delivery_type: Set(new_order.delivery_type),
            subtotal: Set(subtotal),
            delivery_fee: Set(new_order.delivery_fee),
            total: Set(total),
            status: Set(OrderStatus::Pending),
            created_at: Set(new_order.created_at),
            updated_at: Set(new_order.created_at),
            version: Set(1),
        }
        .insert(conn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %new_order.id, "Failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(new_order.items.len());
        for item in &new_order.items {
            let saved = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(new_order.id),
                listing_id: Set(item.listing_id),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_total: Set(item.line_total()?),
            }
            .insert(conn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %new_order.id, "Failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
            items.push(saved);
        }

        Ok((order, items))
    }

    pub async fn update_status<C: ConnectionTrait>(
        conn: &C,
        current: &order::Model,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<order::Model, ServiceError> {
        let changes = order::ActiveModel {
            status: Set(status),
            updated_at: Set(now),
            version: Set(current.version + 1),
            ..Default::default()
        };
        update_versioned(
            conn,
            "order",
            current.id,
            current.version,
            order::Column::Id,
            order::Column::Version,
            changes,
        )
        .await?;
        Self::find(conn, current.id).await
    }
}
