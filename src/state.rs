//! Shared application state: written during setup, read-only while serving.

use crate::config::EngineConfig;
use crate::meta::MetaRegistry;
use crate::rest::RestDescriptor;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<MetaRegistry>,
    pub config: Arc<EngineConfig>,
    /// Which operations were mounted per model. Written once by the binder
    /// before serving starts, read by the metadata route afterward.
    pub rest: Arc<RwLock<HashMap<String, RestDescriptor>>>,
}

impl AppState {
    pub fn new(pool: PgPool, registry: MetaRegistry, config: EngineConfig) -> Self {
        AppState {
            pool,
            registry: Arc::new(registry),
            config: Arc::new(config),
            rest: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
