pub mod config;
pub mod logic;
pub mod model;
pub mod store;

pub use config::AppConfig;

// Export engine types
pub use logic::{
    AttributeInstanceRepository, ClassInstanceRepository, CollectionDiff, DeleteRuleEngine,
    DiffEngine, EngineError, EngineResult, ObjectInstanceStore, ParentTypeResolver,
    PortInstanceRepository, RelationclassInstanceRepository, RightsGate, RoleInstanceRepository,
    SceneInstanceRepository,
};

// Export all model types
pub use model::*;

// Export store types
pub use store::{MemoryStore, PgStore, Store, StoreError, StoreTx};

/// Initialize logging with INFO level unless overridden via `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
