//! Generic CRUD dispatcher shared by every resource.

mod handlers;
mod operation;
mod registry;
mod responses;

pub use handlers::{IgnoreHttpNotFound, RequestErrorHandler};
pub use operation::{
    OperationSequence, OperationType, ResourceOperationConfig, SchemaReader, SchemaWriter,
};
pub use registry::{
    composed_id_importer, passthrough_importer, DataSourceDefinition, Importer,
    ProviderRegistry, ResourceDefinition, StateUpgrader,
};
pub use responses::IdBasedResponse;
