pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{alias::AliasTable, memory_store::MemoryStore};
pub use config::toml_config::AppConfig;
pub use core::{
    engine::ImportEngine,
    pipeline::{ImportOptions, NotePipeline},
};
pub use utils::error::{NoteError, Result};
