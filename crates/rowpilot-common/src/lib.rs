pub mod error;
pub mod protocol;
pub mod row;

pub use error::BackendError;
pub use protocol::{ActionKind, ActionStep, BrowserConfig, BrowserKind, Workflow, WorkflowError};
pub use row::{CellValue, RowData};
