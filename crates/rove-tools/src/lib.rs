//! # rove-tools
//!
//! The fixed tool set offered to the model.
//!
//! [`ToolKind`] is a closed enum: every declared tool has a handler, checked
//! by the compiler. [`ToolRegistry::dispatch`] parses the model's JSON
//! arguments and runs the handler against an explicit working directory.
//!
//! Handlers never panic and never propagate. Failures come back as a
//! [`ToolError`] whose message is the text the model sees.

pub mod command;
mod error;
pub mod fs;
pub mod image;
mod output;
mod registry;
pub mod web;

pub use error::{ToolError, ToolErrorKind, ToolResult};
pub use output::{truncate_output, MAX_OUTPUT_BYTES};
pub use registry::{
    acknowledge_done, SearchEndpoints, ToolInvocation, ToolKind, ToolRegistry, ToolServices,
};
