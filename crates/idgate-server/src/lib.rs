pub mod config;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, PostgresStorageConfig, ServerConfig, StorageBackend, StorageConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{IdgateServer, ServerBuilder, build_app, build_state};
