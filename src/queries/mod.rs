//! Role-scoped, filtered, paginated reads. Scoping is derived from the actor
//! and applied before any client filter; client filters can only narrow.

use sea_orm::{
    sea_query::{Expr, Func, SimpleExpr},
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Select,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    entities::{delivery, harvest_request, order, user},
    errors::ServiceError,
    services::{
        deliveries::DeliveryView, harvest::HarvestRequestView, orders::OrderView,
        users::UserView,
    },
    workflow::{
        parse_status, Actor, Availability, DeliveryStatus, HarvestStatus, OrderStatus, UserRole,
        Workflow,
    },
};

/// Query-string filters accepted by every list endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListFilter {
    /// One status or a comma-separated set.
    pub status: Option<String>,
    pub role: Option<String>,
    pub availability: Option<String>,
    #[serde(alias = "service_area")]
    pub service_area: Option<String>,
    /// Case-insensitive substring.
    pub search: Option<String>,
    /// 1-based.
    pub page: Option<u64>,
    pub limit: Option<u64>,
    #[serde(skip)]
    pub customer_id: Option<Uuid>,
    #[serde(skip)]
    pub driver_id: Option<Uuid>,
    #[serde(skip)]
    pub farmer_id: Option<Uuid>,
    #[serde(skip)]
    pub expert_id: Option<Uuid>,
}

impl ListFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.to_lowercase()))
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Page size limits taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_size: u64,
    pub max_size: u64,
}

impl PageLimits {
    /// Requested size clamped to `[1, max_size]`.
    pub fn size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_size)
            .clamp(1, self.max_size.max(1))
    }

    /// Zero-based page index for a 1-based `page`. Refused when the row
    /// offset it implies does not fit a signed 64-bit SQL offset.
    pub fn index(&self, page: Option<u64>, size: u64) -> Result<u64, ServiceError> {
        let page = page.unwrap_or(1).max(1);
        let index = page - 1;
        match index.checked_mul(size) {
            Some(offset) if i64::try_from(offset).is_ok() => Ok(index),
            _ => Err(ServiceError::ValidationError(format!(
                "page {page} is out of range"
            ))),
        }
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

fn contains_ci<C: ColumnTrait + 'static>(column: C, pattern: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column))).like(pattern)
}

fn parse_statuses<S>(raw: &Option<String>) -> Result<Option<Vec<S>>, ServiceError>
where
    S: Workflow + FromStr,
{
    let Some(raw) = raw.as_deref().filter(|r| !r.trim().is_empty()) else {
        return Ok(None);
    };
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(parse_status::<S>)
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

fn parse_enum<E: FromStr>(label: &str, raw: &Option<String>) -> Result<Option<E>, ServiceError> {
    match raw.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse::<E>()
            .map(Some)
            .map_err(|_| ServiceError::ValidationError(format!("unknown {} '{}'", label, value))),
    }
}

#[derive(Clone)]
pub struct QueryFacade {
    db: Arc<DatabaseConnection>,
    limits: PageLimits,
}

impl QueryFacade {
    pub fn new(db: Arc<DatabaseConnection>, limits: PageLimits) -> Self {
        Self { db, limits }
    }

    async fn fetch<E>(
        &self,
        select: Select<E>,
        filter: &ListFilter,
    ) -> Result<Page<E::Model>, ServiceError>
    where
        E: EntityTrait,
        E::Model: Send + Sync,
    {
        let limit = self.limits.size(filter.limit);
        let index = self.limits.index(filter.page, limit)?;
        let page = index + 1;

        let paginator = select.paginate(&*self.db, limit);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let items = paginator
            .fetch_page(index)
            .await
            .map_err(ServiceError::DatabaseError)?;

        debug!(total, page, limit, returned = items.len(), "list query");
        Ok(Page {
            items,
            total,
            page,
            limit,
            total_pages: total.div_ceil(limit),
        })
    }

    #[instrument(skip(self, filter), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn list_orders(
        &self,
        actor: &Actor,
        filter: ListFilter,
    ) -> Result<Page<OrderView>, ServiceError> {
        let mut select = order::Entity::find();

        if !actor.is_admin() {
            select = select.filter(order::Column::CustomerId.eq(actor.id));
        }
        if let Some(customer) = filter.customer_id {
            select = select.filter(order::Column::CustomerId.eq(customer));
        }
        if let Some(statuses) = parse_statuses::<OrderStatus>(&filter.status)? {
            select = select.filter(order::Column::Status.is_in(statuses));
        }
        if let Some(pattern) = filter.search_pattern() {
            select = select.filter(contains_ci(order::Column::OrderNumber, &pattern));
        }

        let select = select
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id);
        Ok(self.fetch(select, &filter).await?.map(OrderView::from))
    }

    #[instrument(skip(self, filter), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn list_deliveries(
        &self,
        actor: &Actor,
        filter: ListFilter,
    ) -> Result<Page<DeliveryView>, ServiceError> {
        let mut select = delivery::Entity::find();

        select = match actor.role {
            UserRole::Admin => select,
            UserRole::Driver => select.filter(delivery::Column::DriverId.eq(actor.id)),
            _ => select.filter(delivery::Column::CustomerId.eq(actor.id)),
        };
        if let Some(customer) = filter.customer_id {
            select = select.filter(delivery::Column::CustomerId.eq(customer));
        }
        if let Some(driver) = filter.driver_id {
            select = select.filter(delivery::Column::DriverId.eq(driver));
        }
        if let Some(statuses) = parse_statuses::<DeliveryStatus>(&filter.status)? {
            select = select.filter(delivery::Column::Status.is_in(statuses));
        }
        if let Some(pattern) = filter.search_pattern() {
            select = select.filter(
                Condition::any()
                    .add(contains_ci(delivery::Column::ContactName, &pattern))
                    .add(contains_ci(delivery::Column::Address, &pattern)),
            );
        }

        let select = select
            .order_by_desc(delivery::Column::CreatedAt)
            .order_by_desc(delivery::Column::Id);
        Ok(self.fetch(select, &filter).await?.map(DeliveryView::from))
    }

    #[instrument(skip(self, filter), fields(actor_id = %actor.id, role = %actor.role))]
    pub async fn list_harvest_requests(
        &self,
        actor: &Actor,
        filter: ListFilter,
    ) -> Result<Page<HarvestRequestView>, ServiceError> {
        let mut select = harvest_request::Entity::find();

        select = match actor.role {
            UserRole::Admin => select,
            UserRole::Agronomist => select.filter(
                Condition::any()
                    .add(harvest_request::Column::ExpertId.eq(actor.id))
                    .add(harvest_request::Column::Status.eq(HarvestStatus::RequestPending)),
            ),
            _ => select.filter(harvest_request::Column::FarmerId.eq(actor.id)),
        };
        if let Some(farmer) = filter.farmer_id {
            select = select.filter(harvest_request::Column::FarmerId.eq(farmer));
        }
        if let Some(expert) = filter.expert_id {
            select = select.filter(harvest_request::Column::ExpertId.eq(expert));
        }
        if let Some(statuses) = parse_statuses::<HarvestStatus>(&filter.status)? {
            select = select.filter(harvest_request::Column::Status.is_in(statuses));
        }
        if let Some(pattern) = filter.search_pattern() {
            select = select.filter(
                Condition::any()
                    .add(contains_ci(harvest_request::Column::Crop, &pattern))
                    .add(contains_ci(harvest_request::Column::ExpertName, &pattern)),
            );
        }

        let select = select
            .order_by_desc(harvest_request::Column::CreatedAt)
            .order_by_desc(harvest_request::Column::Id);
        Ok(self
            .fetch(select, &filter)
            .await?
            .map(HarvestRequestView::from))
    }

    #[instrument(skip(self, filter), fields(actor_id = %actor.id))]
    pub async fn list_users(
        &self,
        actor: &Actor,
        filter: ListFilter,
    ) -> Result<Page<UserView>, ServiceError> {
        if !actor.is_admin() {
            return Err(ServiceError::Forbidden(
                "only an admin may list users".to_string(),
            ));
        }

        let mut select = user::Entity::find();
        if let Some(role) = parse_enum::<UserRole>("role", &filter.role)? {
            select = select.filter(user::Column::Role.eq(role));
        }
        if let Some(availability) =
            parse_enum::<Availability>("availability", &filter.availability)?
        {
            select = select.filter(user::Column::Availability.eq(availability));
        }
        if let Some(area) = filter
            .service_area
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
        {
            select = select.filter(contains_ci(
                user::Column::ServiceArea,
                &format!("%{}%", area.to_lowercase()),
            ));
        }
        if let Some(pattern) = filter.search_pattern() {
            select = select.filter(
                Condition::any()
                    .add(contains_ci(user::Column::Name, &pattern))
                    .add(contains_ci(user::Column::Email, &pattern)),
            );
        }

        let select = select
            .order_by_desc(user::Column::CreatedAt)
            .order_by_desc(user::Column::Id);
        Ok(self.fetch(select, &filter).await?.map(UserView::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn page_size_is_clamped() {
        let limits = PageLimits::default();
        assert_eq!(limits.size(None), 20);
        assert_eq!(limits.size(Some(0)), 1);
        assert_eq!(limits.size(Some(10_000)), 100);

        let degenerate = PageLimits {
            default_size: 0,
            max_size: 0,
        };
        assert_eq!(degenerate.size(None), 1);
    }

    #[test]
    fn page_index_is_zero_based_and_bounded() {
        let limits = PageLimits::default();
        assert_eq!(limits.index(None, 20).unwrap(), 0);
        assert_eq!(limits.index(Some(0), 20).unwrap(), 0);
        assert_eq!(limits.index(Some(3), 20).unwrap(), 2);
        assert_matches!(
            limits.index(Some(u64::MAX), 20),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn comma_separated_statuses_parse_case_insensitively() {
        let parsed = parse_statuses::<DeliveryStatus>(&Some("assigned, in_transit".into()))
            .unwrap()
            .unwrap();
        assert_eq!(parsed, vec![DeliveryStatus::Assigned, DeliveryStatus::InTransit]);
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_matches!(
            parse_statuses::<OrderStatus>(&Some("PAID,LOST".into())),
            Err(ServiceError::ValidationError(_))
        );
    }

    #[test]
    fn blank_filters_are_ignored() {
        assert_eq!(parse_statuses::<OrderStatus>(&Some("  ".into())).unwrap(), None);
        assert_eq!(parse_enum::<UserRole>("role", &None).unwrap(), None);
        assert_eq!(
            ListFilter {
                search: Some("  ".into()),
                ..Default::default()
            }
            .search_pattern(),
            None
        );
    }
}
