// Workflow core
pub mod assignments;
pub mod audit;
pub mod state_machine;

// Entity services
pub mod deliveries;
pub mod harvest;
pub mod orders;
pub mod users;

// Infrastructure shared by the services
pub mod clock;
pub mod locks;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;
use crate::queries::{PageLimits, QueryFacade};

use self::{
    assignments::AssignmentCoordinator,
    audit::AuditTrail,
    clock::SharedClock,
    deliveries::DeliveryService,
    harvest::HarvestService,
    locks::EntityLocks,
    orders::OrderService,
    state_machine::{StateMachineEngine, WorkflowSettings},
    users::UserService,
};

/// Builds every service over one pool, one lock table and one clock so
/// that all writers serialize on the same per-entity locks.
pub struct ServiceFactory {
    db_pool: Arc<DatabaseConnection>,
    event_sender: EventSender,
    clock: SharedClock,
    settings: WorkflowSettings,
    page_limits: PageLimits,
    locks: EntityLocks,
}

impl ServiceFactory {
    pub fn new(
        db_pool: Arc<DatabaseConnection>,
        event_sender: EventSender,
        clock: SharedClock,
        settings: WorkflowSettings,
        page_limits: PageLimits,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            clock,
            settings,
            page_limits,
            locks: EntityLocks::new(),
        }
    }

    pub fn audit_trail(&self) -> AuditTrail {
        AuditTrail::new(self.db_pool.clone(), self.event_sender.clone())
    }

    pub fn state_machine(&self) -> StateMachineEngine {
        StateMachineEngine::new(
            self.db_pool.clone(),
            self.locks.clone(),
            self.audit_trail(),
            self.clock.clone(),
            self.settings.clone(),
        )
    }

    pub fn assignments(&self) -> AssignmentCoordinator {
        AssignmentCoordinator::new(
            self.db_pool.clone(),
            self.locks.clone(),
            self.audit_trail(),
            self.clock.clone(),
        )
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(
            self.db_pool.clone(),
            self.audit_trail(),
            self.clock.clone(),
            self.settings.clone(),
        )
    }

    pub fn deliveries(&self) -> DeliveryService {
        DeliveryService::new(self.db_pool.clone(), self.audit_trail())
    }

    pub fn harvest(&self) -> HarvestService {
        HarvestService::new(
            self.db_pool.clone(),
            self.locks.clone(),
            self.audit_trail(),
            self.clock.clone(),
        )
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db_pool.clone(), self.clock.clone())
    }

    pub fn queries(&self) -> QueryFacade {
        QueryFacade::new(self.db_pool.clone(), self.page_limits)
    }
}
