pub mod backend;
pub mod config;
pub mod dispatch;
pub mod executor;
pub mod formatter;
pub mod picker;
pub mod recovery;
pub mod resolution;
pub mod rows;
pub mod workflow;

pub use rowpilot_common::protocol;
pub use rowpilot_common::row;
