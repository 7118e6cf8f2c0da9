pub mod backend;
pub mod config_store;
pub mod defaults;
pub mod runtime_engine;

pub use backend::HttpIntakeBackend;
pub use config_store::ConfigStore;
pub use runtime_engine::{build_orchestrator, build_orchestrator_from_config};
