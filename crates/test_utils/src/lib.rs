//! Testing utilities for Wisp crates

#![warn(missing_docs)]

mod hook_recorder;
mod interpreter;
mod type_helpers;

pub mod op;

pub use hook_recorder::{HookRecord, HookRecorder};
pub use interpreter::TestInterpreter;
pub use type_helpers::*;
