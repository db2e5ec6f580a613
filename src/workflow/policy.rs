//! Who may move which entity where. Pure functions over the actor and the
//! entity as loaded; callers check the transition table first.

use chrono::{DateTime, Duration, Utc};

use crate::entities::{delivery, harvest_request, order};
use crate::errors::ServiceError;

use super::{Actor, DeliveryStatus, HarvestStatus, OrderStatus, UserRole};

fn forbidden(message: impl Into<String>) -> ServiceError {
    ServiceError::Forbidden(message.into())
}

/// Inclusive: a cancellation exactly `window` after creation is still allowed.
pub fn within_cancellation_window(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    now.signed_duration_since(created_at) <= window
}

pub fn authorize_order(
    actor: &Actor,
    order: &order::Model,
    target: OrderStatus,
    now: DateTime<Utc>,
    cancellation_window: Duration,
) -> Result<(), ServiceError> {
    if actor.is_admin() {
        return Ok(());
    }
    if !actor.is(order.customer_id) {
        return Err(forbidden("only the ordering customer or an admin may change this order"));
    }

    match target {
        OrderStatus::Paid => Ok(()),
        OrderStatus::Cancelled => {
            if within_cancellation_window(order.created_at, now, cancellation_window) {
                Ok(())
            } else {
                Err(forbidden(format!(
                    "orders can only be cancelled by the buyer within {} hours of being placed",
                    cancellation_window.num_hours()
                )))
            }
        }
        other => Err(forbidden(format!(
            "only an admin may move an order to {}",
            other
        ))),
    }
}

pub fn authorize_delivery(
    actor: &Actor,
    delivery: &delivery::Model,
    target: DeliveryStatus,
) -> Result<(), ServiceError> {
    if actor.is_admin() {
        return Ok(());
    }

    if target == DeliveryStatus::Cancelled {
        let early = matches!(
            delivery.status,
            DeliveryStatus::Pending | DeliveryStatus::Assigned
        );
        return if actor.is(delivery.customer_id) && early {
            Ok(())
        } else {
            Err(forbidden(
                "a delivery can be cancelled by its customer only before preparation starts",
            ))
        };
    }

    if actor.role == UserRole::Driver && actor.is_opt(delivery.driver_id) {
        Ok(())
    } else {
        Err(forbidden(
            "only the assigned driver or an admin may advance this delivery",
        ))
    }
}

pub fn authorize_harvest(
    actor: &Actor,
    request: &harvest_request::Model,
    target: HarvestStatus,
) -> Result<(), ServiceError> {
    use HarvestStatus::*;

    if actor.is_admin() {
        return Ok(());
    }

    let is_expert = actor.role == UserRole::Agronomist && actor.is_opt(request.expert_id);
    let is_farmer = actor.is(request.farmer_id);

    let allowed = match (request.status, target) {
        (_, Cancelled) => is_farmer,
        (Assigned, Accepted) | (Assigned, RequestPending) | (Accepted, Scheduled) => is_expert,
        (Scheduled, InProgress) | (InProgress, Completed) => is_expert || is_farmer,
        _ => false,
    };

    if allowed {
        Ok(())
    } else if is_farmer || is_expert {
        Err(forbidden(format!(
            "you may not move this harvest request from {} to {}",
            request.status, target
        )))
    } else {
        Err(forbidden(
            "only the requesting farmer, the assigned agronomist or an admin may change this harvest request",
        ))
    }
}

/// Assignment and unassignment are admin decisions.
pub fn authorize_assignment(actor: &Actor) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(forbidden("only an admin may assign or unassign"))
    }
}

pub fn can_view_order(actor: &Actor, order: &order::Model) -> bool {
    actor.is_admin() || actor.is(order.customer_id)
}

pub fn can_view_delivery(actor: &Actor, delivery: &delivery::Model) -> bool {
    actor.is_admin() || actor.is(delivery.customer_id) || actor.is_opt(delivery.driver_id)
}

pub fn can_view_harvest(actor: &Actor, request: &harvest_request::Model) -> bool {
    actor.is_admin()
        || actor.is(request.farmer_id)
        || actor.is_opt(request.expert_id)
        || (actor.role == UserRole::Agronomist && request.status == HarvestStatus::RequestPending)
}
