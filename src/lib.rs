pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{Cli, Command};
pub use config::AppConfig;

pub use adapters::http::HttpEncryptor;
pub use adapters::storage::LocalStorage;
pub use core::{
    encrypt::EncryptionPipeline, etl::EtlEngine, matcher::MatchPipeline, shard::ShardPipeline,
};
pub use utils::error::{EtlError, Result};
