pub mod enforcement;
pub mod organization;
pub mod plans;
pub mod reconciliation;
pub mod subscription;
pub mod subscription_cache;
pub mod usage;
