mod schemagen;

pub use schemagen::{ApiErrorBody, ApiErrorObject, SchemaGenError};

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
