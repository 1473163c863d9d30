pub mod files;
mod registry;

pub use files::WriteFileTool;
pub use registry::{json_schema_object, json_schema_string, Tool, ToolRegistry};
