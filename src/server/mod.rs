pub mod router;
mod routes;

pub use router::{SchemaGenState, schemagen_router};
