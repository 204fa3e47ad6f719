//! Schema-evolution core: value typing, identifier checks, catalog snapshots and the
//! reconciler that turns a request's shape into DDL.
//!
//! Layout:
//! - `value.rs`: the scalar union carried by requests and rows
//! - `storage_class.rs`: type inference and widening
//! - `ident.rs`: identifier safety
//! - `snapshot.rs`: introspected table shape
//! - `reconcile.rs`: desired-vs-current diff and its DDL

pub mod ident;
pub mod reconcile;
pub mod snapshot;
pub mod storage_class;
pub mod value;

pub use ident::{KEY_COLUMN, check_distinct, check_identifier, is_key_column};
pub use reconcile::{Change, Plan, reconcile};
pub use snapshot::{ColumnDef, TableSchema};
pub use storage_class::StorageClass;
pub use value::{FieldMap, FieldValue};
