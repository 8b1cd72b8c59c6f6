pub mod config;
pub mod engine;
pub mod tree;

pub use config::EngineConfig;
pub use engine::{CollectionDraft, TodoDraft, TrellisEngine};
pub use tree::build_forest;
