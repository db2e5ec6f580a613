//! Status enums, allowed-transition tables and the authorization policy for
//! every workflow entity. The tables here are the only place that decides
//! which status may follow which.

pub mod actor;
pub mod labels;
pub mod policy;
pub mod status;

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::errors::ServiceError;

pub use actor::{AccountStatus, Actor, Availability, UserRole};
pub use status::{DeliveryStatus, DeliveryType, HarvestStatus, OrderStatus, PhaseStatus};

/// Entity types tracked by the audit trail.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EntityKind {
    #[sea_orm(string_value = "ORDER")]
    Order,
    #[sea_orm(string_value = "DELIVERY")]
    Delivery,
    #[sea_orm(string_value = "HARVEST_REQUEST")]
    HarvestRequest,
}

/// A closed status enum with an allowed-transition table.
pub trait Workflow: Copy + Eq + fmt::Display + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Statuses directly reachable from `self`.
    fn allowed_next(self) -> &'static [Self];

    /// Status an entity is born in.
    fn initial() -> Self;

    fn cancelled() -> Self;

    fn can_transition_to(self, target: Self) -> bool {
        self.allowed_next().contains(&target)
    }

    fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }
}

/// Workflows that bind a single assignee (driver or agronomist).
pub trait Assignable: Workflow {
    /// Role an assignee must hold.
    const ASSIGNEE_ROLE: UserRole;

    /// Status entered on assignment.
    fn assigned() -> Self;

    /// Status the entity returns to when its assignee is removed.
    fn unassigned() -> Self {
        Self::initial()
    }

    /// Whether an explicit unassign is legal from `self`.
    fn can_unassign(self) -> bool {
        !self.is_terminal() && self != Self::unassigned()
    }
}

/// Returns `InvalidTransition` unless `target` is listed for `from`.
pub fn ensure_transition<S: Workflow>(from: S, target: S) -> Result<(), ServiceError> {
    if from.can_transition_to(target) {
        Ok(())
    } else if from.is_terminal() {
        Err(ServiceError::InvalidTransition(format!(
            "{} is {} which is terminal; cannot move to {}",
            S::KIND,
            from,
            target
        )))
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "{} cannot move from {} to {}",
            S::KIND,
            from,
            target
        )))
    }
}

/// Parses a client-supplied status name for workflow `S`.
pub fn parse_status<S>(raw: &str) -> Result<S, ServiceError>
where
    S: Workflow + std::str::FromStr,
{
    raw.trim()
        .parse::<S>()
        .map_err(|_| ServiceError::ValidationError(format!("unknown {} status '{}'", S::KIND, raw)))
}

impl Workflow for OrderStatus {
    const KIND: EntityKind = EntityKind::Order;

    fn allowed_next(self) -> &'static [Self] {
        use OrderStatus::*;
        match self {
            Pending => &[Paid, Cancelled],
            Paid => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered | Cancelled => &[],
        }
    }

    fn initial() -> Self {
        OrderStatus::Pending
    }

    fn cancelled() -> Self {
        OrderStatus::Cancelled
    }
}

impl Workflow for DeliveryStatus {
    const KIND: EntityKind = EntityKind::Delivery;

    fn allowed_next(self) -> &'static [Self] {
        use DeliveryStatus::*;
        match self {
            Pending => &[Assigned, Cancelled],
            Assigned => &[Preparing, Cancelled],
            Preparing => &[Collected, Cancelled],
            Collected => &[InTransit, Cancelled],
            InTransit => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    fn initial() -> Self {
        DeliveryStatus::Pending
    }

    fn cancelled() -> Self {
        DeliveryStatus::Cancelled
    }
}

impl Assignable for DeliveryStatus {
    const ASSIGNEE_ROLE: UserRole = UserRole::Driver;

    fn assigned() -> Self {
        DeliveryStatus::Assigned
    }
}

impl Workflow for HarvestStatus {
    const KIND: EntityKind = EntityKind::HarvestRequest;

    fn allowed_next(self) -> &'static [Self] {
        use HarvestStatus::*;
        match self {
            RequestPending => &[Assigned, Cancelled],
            // REQUEST_PENDING here is the agronomist's rejection.
            Assigned => &[Accepted, RequestPending, Cancelled],
            Accepted => &[Scheduled, Cancelled],
            Scheduled => &[InProgress, Cancelled],
            InProgress => &[Completed, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    fn initial() -> Self {
        HarvestStatus::RequestPending
    }

    fn cancelled() -> Self {
        HarvestStatus::Cancelled
    }
}

impl Assignable for HarvestStatus {
    const ASSIGNEE_ROLE: UserRole = UserRole::Agronomist;

    fn assigned() -> Self {
        HarvestStatus::Assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rstest::rstest;
    use sea_orm::Iterable;

    fn reachable<S: Workflow + PartialEq>(from: S, all: &[S]) -> Vec<S> {
        let mut seen = vec![from];
        let mut frontier = vec![from];
        while let Some(status) = frontier.pop() {
            for next in status.allowed_next() {
                if !seen.contains(next) && all.contains(next) {
                    seen.push(*next);
                    frontier.push(*next);
                }
            }
        }
        seen
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Paid)]
    #[case(OrderStatus::Paid, OrderStatus::Processing)]
    #[case(OrderStatus::Processing, OrderStatus::Shipped)]
    #[case(OrderStatus::Shipped, OrderStatus::Delivered)]
    #[case(OrderStatus::Shipped, OrderStatus::Cancelled)]
    fn order_forward_edges_are_allowed(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(ensure_transition(from, to).is_ok());
    }

    #[rstest]
    #[case(OrderStatus::Paid, OrderStatus::Delivered)]
    #[case(OrderStatus::Pending, OrderStatus::Shipped)]
    #[case(OrderStatus::Shipped, OrderStatus::Paid)]
    #[case(OrderStatus::Delivered, OrderStatus::Cancelled)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending)]
    fn order_skips_and_reversals_are_rejected(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert_matches!(
            ensure_transition(from, to),
            Err(ServiceError::InvalidTransition(_))
        );
    }

    #[test]
    fn every_non_terminal_status_can_be_cancelled() {
        for status in OrderStatus::iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(OrderStatus::Cancelled), "{status}");
        }
        for status in DeliveryStatus::iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(DeliveryStatus::Cancelled), "{status}");
        }
        for status in HarvestStatus::iter().filter(|s| !s.is_terminal()) {
            assert!(status.can_transition_to(HarvestStatus::Cancelled), "{status}");
        }
    }

    #[test]
    fn terminal_statuses_match_lifecycle() {
        let terminal: Vec<_> = DeliveryStatus::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![DeliveryStatus::Completed, DeliveryStatus::Cancelled]
        );
        let terminal: Vec<_> = HarvestStatus::iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(
            terminal,
            vec![HarvestStatus::Completed, HarvestStatus::Cancelled]
        );
    }

    #[test]
    fn harvest_rejection_is_the_only_backward_edge() {
        let backward: Vec<_> = HarvestStatus::iter()
            .flat_map(|from| from.allowed_next().iter().map(move |to| (from, *to)))
            .filter(|(from, to)| (*to as u8) < (*from as u8))
            .collect();
        assert_eq!(
            backward,
            vec![(HarvestStatus::Assigned, HarvestStatus::RequestPending)]
        );
    }

    #[test]
    fn every_status_is_reachable_from_initial() {
        let all: Vec<_> = DeliveryStatus::iter().collect();
        assert_eq!(reachable(DeliveryStatus::initial(), &all).len(), all.len());
        let all: Vec<_> = HarvestStatus::iter().collect();
        assert_eq!(reachable(HarvestStatus::initial(), &all).len(), all.len());
        let all: Vec<_> = OrderStatus::iter().collect();
        assert_eq!(reachable(OrderStatus::initial(), &all).len(), all.len());
    }

    #[test]
    fn unassign_is_legal_only_while_assigned_and_live() {
        assert!(!DeliveryStatus::Pending.can_unassign());
        assert!(DeliveryStatus::InTransit.can_unassign());
        assert!(!DeliveryStatus::Completed.can_unassign());
        assert!(HarvestStatus::Accepted.can_unassign());
        assert!(!HarvestStatus::RequestPending.can_unassign());
    }

    #[test]
    fn parse_status_reports_validation_error() {
        assert_eq!(
            parse_status::<DeliveryStatus>(" in_transit ").unwrap(),
            DeliveryStatus::InTransit
        );
        assert_matches!(
            parse_status::<OrderStatus>("teleported"),
            Err(ServiceError::ValidationError(_))
        );
    }

    fn any_order_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::iter().collect::<Vec<_>>())
    }

    fn any_harvest_status() -> impl Strategy<Value = HarvestStatus> {
        prop::sample::select(HarvestStatus::iter().collect::<Vec<_>>())
    }

    proptest! {
        #[test]
        fn ensure_transition_agrees_with_table(from in any_order_status(), to in any_order_status()) {
            prop_assert_eq!(ensure_transition(from, to).is_ok(), from.allowed_next().contains(&to));
        }

        #[test]
        fn no_harvest_self_loops(status in any_harvest_status()) {
            prop_assert!(!status.can_transition_to(status));
        }
    }
}
