pub mod catalog;
pub mod definition;
pub mod registry;

pub use catalog::hr_tools;
pub use definition::{
    BodyField, HttpBinding, Param, ParamType, ResponseEnvelope, ToolDefinition, ValueRule,
};
pub use registry::ToolRegistry;
