//! Default limits used by the runtime
//!
//! Each limit can be overridden via [VmSettings](crate::VmSettings).

/// The maximum number of slots in a thread's value stack
pub const MAX_STACK: usize = 1_000_000;

/// The number of free slots guaranteed to a native function when it's called
pub const MIN_STACK: usize = 20;

/// The maximum nesting depth of native calls (including re-entries into the bytecode loop)
pub const MAX_NATIVE_CALLS: usize = 200;

/// Extra slots allocated beyond the usable part of the stack
pub const EXTRA_STACK: usize = 5;

/// The number of slots beyond [MAX_STACK] that are made available for reporting an overflow
pub const ERROR_STACK_MARGIN: usize = 200;

/// The initial size of a thread's value stack
pub const BASIC_STACK_SIZE: usize = 2 * MIN_STACK;

/// The maximum number of upvalues that a closure can capture
pub const MAX_UPVALUES: usize = u8::MAX as usize;
