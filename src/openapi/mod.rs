use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "AgroLink API",
        version = "0.1.0",
        description = r#"
# AgroLink Workflow API

Orders, deliveries and harvest assistance requests for an agricultural marketplace.
Every status change is validated against a fixed transition table, authorized by role
and ownership, and recorded in an append-only audit trail.

## Authentication

Every `/api/v1` endpoint requires a bearer token:

```
Authorization: Bearer <jwt>
```

## Errors

Failures use one body shape with a machine-readable `code`:

| status | code |
|--------|------|
| 400 | `validation_error` |
| 401 | `unauthorized` |
| 403 | `forbidden` |
| 404 | `not_found` |
| 409 | `conflict` |
| 422 | `invalid_transition`, `ineligible_assignee` |

## Pagination

List endpoints accept `page` (1-based) and `limit` (clamped to the configured maximum),
plus `status` (comma-separated), `search` and role/availability filters where relevant.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order placement and lifecycle"),
        (name = "Deliveries", description = "Driver assignment and delivery lifecycle"),
        (name = "Harvest", description = "Harvest assistance requests"),
        (name = "Users", description = "Accounts, roles and availability")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::order_history,

        // Deliveries
        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::my_deliveries,
        crate::handlers::deliveries::driver_deliveries,
        crate::handlers::deliveries::delivery_for_order,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::assign_driver,
        crate::handlers::deliveries::unassign_driver,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::deliveries::delivery_history,

        // Harvest
        crate::handlers::harvest::create_request,
        crate::handlers::harvest::list_requests,
        crate::handlers::harvest::admin_requests,
        crate::handlers::harvest::assigned_to_me,
        crate::handlers::harvest::get_request,
        crate::handlers::harvest::assign_expert,
        crate::handlers::harvest::unassign_expert,
        crate::handlers::harvest::respond,
        crate::handlers::harvest::schedule,
        crate::handlers::harvest::record_progress,
        crate::handlers::harvest::update_status,
        crate::handlers::harvest::update_phase,
        crate::handlers::harvest::harvest_history,

        // Users
        crate::handlers::users::create_user,
        crate::handlers::users::list_users,
        crate::handlers::users::me,
        crate::handlers::users::set_my_availability,
        crate::handlers::users::set_user_status,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::workflow::OrderStatus,
            crate::workflow::DeliveryStatus,
            crate::workflow::HarvestStatus,
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
