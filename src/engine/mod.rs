mod actor;
mod executor;
mod retry;

pub use actor::{EngineActorMessage, EngineHandle, spawn};
pub use executor::{CreateOutcome, Executor, Record, TableDescription, UpdateOutcome};
