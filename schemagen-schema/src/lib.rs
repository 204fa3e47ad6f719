pub mod request;
pub mod response;

pub use request::{OperationKind, OperationRequest};
pub use response::{
    ColumnDump, CreateResponse, DeleteResponse, OperationResponse, ReadResponse, SchemaDump,
    TableDump, UpdateResponse,
};
