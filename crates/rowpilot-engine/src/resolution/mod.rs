pub mod backend_adapter;

pub use backend_adapter::BackendDocumentQuery;
