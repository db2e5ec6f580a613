pub mod audit_record;
pub mod delivery;
pub mod harvest_phase;
pub mod harvest_request;
pub mod harvest_tracking;
pub mod order;
pub mod order_item;
pub mod user;
