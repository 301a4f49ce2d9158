//! Tools module - tool registry and built-in tools
//!
//! The registry is the only thing the agent core talks to; the file and shell
//! tools are ordinary registered handlers.

pub mod fs;
pub mod registry;
pub mod shell;

pub use registry::{validate_arguments, RegisteredTool, ToolHandler, ToolRegistry};
