use crate::{adapters::persistence::PostgresPersistence, infra::db::init_db};

pub mod app;
pub mod background;
pub mod config;
pub mod db;
pub mod error;
pub mod jwt_identity;
pub mod memory_cache;
pub mod redis_cache;
pub mod setup;

pub use error::InfraError;

pub async fn postgres_persistence(database_url: &str) -> anyhow::Result<PostgresPersistence> {
    let pool = init_db(database_url).await?;
    let persistence = PostgresPersistence::new(pool);
    Ok(persistence)
}
