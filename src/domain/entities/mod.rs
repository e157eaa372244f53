pub mod organization;
pub mod plan;
pub mod resource;
pub mod subscription;
pub mod subscription_history;
