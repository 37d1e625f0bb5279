pub mod api;
pub mod entitlement;
pub mod events;
pub mod models;
pub mod validation;
