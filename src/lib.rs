pub mod config;
pub mod engine;
pub mod error;
pub mod schema;
pub mod server;

pub use engine::{EngineHandle, Executor};
pub use error::SchemaGenError;
