//! Display labels for statuses, kept outside the state machine so clients
//! render them consistently.

use serde::Serialize;
use utoipa::ToSchema;

use super::{DeliveryStatus, HarvestStatus, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Neutral,
    Info,
    Progress,
    Success,
    Danger,
}

pub trait StatusLabel {
    fn label(&self) -> &'static str;
    fn tone(&self) -> Tone;
}

impl StatusLabel for OrderStatus {
    fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Awaiting payment",
            OrderStatus::Paid => "Paid",
            OrderStatus::Processing => "Being prepared",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    fn tone(&self) -> Tone {
        match self {
            OrderStatus::Pending => Tone::Neutral,
            OrderStatus::Paid => Tone::Info,
            OrderStatus::Processing | OrderStatus::Shipped => Tone::Progress,
            OrderStatus::Delivered => Tone::Success,
            OrderStatus::Cancelled => Tone::Danger,
        }
    }
}

impl StatusLabel for DeliveryStatus {
    fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Waiting for a driver",
            DeliveryStatus::Assigned => "Driver assigned",
            DeliveryStatus::Preparing => "Preparing for pickup",
            DeliveryStatus::Collected => "Collected from farm",
            DeliveryStatus::InTransit => "On the way",
            DeliveryStatus::Completed => "Delivered",
            DeliveryStatus::Cancelled => "Cancelled",
        }
    }

    fn tone(&self) -> Tone {
        match self {
            DeliveryStatus::Pending => Tone::Neutral,
            DeliveryStatus::Assigned => Tone::Info,
            DeliveryStatus::Preparing | DeliveryStatus::Collected | DeliveryStatus::InTransit => {
                Tone::Progress
            }
            DeliveryStatus::Completed => Tone::Success,
            DeliveryStatus::Cancelled => Tone::Danger,
        }
    }
}

impl StatusLabel for HarvestStatus {
    fn label(&self) -> &'static str {
        match self {
            HarvestStatus::RequestPending => "Awaiting expert",
            HarvestStatus::Assigned => "Expert assigned",
            HarvestStatus::Accepted => "Accepted by expert",
            HarvestStatus::Scheduled => "Scheduled",
            HarvestStatus::InProgress => "Harvest in progress",
            HarvestStatus::Completed => "Completed",
            HarvestStatus::Cancelled => "Cancelled",
        }
    }

    fn tone(&self) -> Tone {
        match self {
            HarvestStatus::RequestPending => Tone::Neutral,
            HarvestStatus::Assigned | HarvestStatus::Accepted => Tone::Info,
            HarvestStatus::Scheduled | HarvestStatus::InProgress => Tone::Progress,
            HarvestStatus::Completed => Tone::Success,
            HarvestStatus::Cancelled => Tone::Danger,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusBadge {
    pub status: String,
    pub label: &'static str,
    pub tone: Tone,
}

impl StatusBadge {
    pub fn of<S: StatusLabel + std::fmt::Display>(status: S) -> Self {
        Self {
            status: status.to_string(),
            label: status.label(),
            tone: status.tone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Iterable;

    #[test]
    fn terminal_statuses_use_final_tones() {
        assert_eq!(OrderStatus::Delivered.tone(), Tone::Success);
        assert_eq!(DeliveryStatus::Cancelled.tone(), Tone::Danger);
        assert_eq!(HarvestStatus::Completed.tone(), Tone::Success);
    }

    #[test]
    fn every_status_has_a_label() {
        assert!(OrderStatus::iter().all(|s| !s.label().is_empty()));
        assert!(DeliveryStatus::iter().all(|s| !s.label().is_empty()));
        assert!(HarvestStatus::iter().all(|s| !s.label().is_empty()));
    }

    #[test]
    fn badge_serializes_camel_case() {
        let badge = serde_json::to_value(StatusBadge::of(DeliveryStatus::InTransit)).unwrap();
        assert_eq!(badge["status"], "IN_TRANSIT");
        assert_eq!(badge["tone"], "progress");
    }
}
