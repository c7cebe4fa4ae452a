pub mod config;
pub mod context;
pub mod error;
pub mod observability;
pub mod process;
pub mod script;
pub mod store;

pub use context::{RunContext, WorkspacePolicy};
pub use error::{ReplayError, Result};
pub use script::ScriptSpec;
