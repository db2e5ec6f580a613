pub mod common;
pub mod deliveries;
pub mod harvest;
pub mod health;
pub mod orders;
pub mod users;

use std::sync::Arc;

use crate::{
    auth::AuthService,
    queries::QueryFacade,
    services::{
        assignments::AssignmentCoordinator, audit::AuditTrail, deliveries::DeliveryService,
        harvest::HarvestService, orders::OrderService, state_machine::StateMachineEngine,
        users::UserService, ServiceFactory,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub state_machine: Arc<StateMachineEngine>,
    pub assignments: Arc<AssignmentCoordinator>,
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub harvest: Arc<HarvestService>,
    pub users: Arc<UserService>,
    pub queries: Arc<QueryFacade>,
    pub audit: Arc<AuditTrail>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(factory: &ServiceFactory, auth: Arc<AuthService>) -> Self {
        Self {
            state_machine: Arc::new(factory.state_machine()),
            assignments: Arc::new(factory.assignments()),
            orders: Arc::new(factory.orders()),
            deliveries: Arc::new(factory.deliveries()),
            harvest: Arc::new(factory.harvest()),
            users: Arc::new(factory.users()),
            queries: Arc::new(factory.queries()),
            audit: Arc::new(factory.audit_trail()),
            auth,
        }
    }
}
