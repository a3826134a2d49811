use crate::{Vm, prelude::*};
use std::{fmt, hash::Hash};

/// A trait for native functions used by the Wisp runtime
///
/// A native function reads its arguments from the stack (see [Vm::arg]), pushes its results,
/// and then returns the number of results that it pushed.
pub trait NativeFn: Fn(&mut Vm) -> Result<usize> + WispSend + WispSync + 'static {}

impl<T> NativeFn for T where T: Fn(&mut Vm) -> Result<usize> + WispSend + WispSync + 'static {}

/// A function that's defined outside of the Wisp runtime
pub struct NativeFunction {
    /// The function implementation that should be called when calling the native function
    //
    // The type signature can't be simplified without stabilized trait aliases,
    // see https://github.com/rust-lang/rust/issues/55628
    #[allow(clippy::type_complexity)]
    pub function: Ptr<dyn NativeFn>,
}

impl NativeFunction {
    /// Creates a new native function
    pub fn new(function: impl NativeFn) -> Self {
        Self {
            function: make_ptr!(function),
        }
    }

    /// Calls the function, returning the number of results that were pushed to the stack
    pub fn call(&self, vm: &mut Vm) -> Result<usize> {
        (self.function)(vm)
    }
}

impl Clone for NativeFunction {
    fn clone(&self) -> Self {
        Self {
            function: self.function.clone(),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native function: {}", Ptr::address(&self.function))
    }
}

impl Hash for NativeFunction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Ptr::address(&self.function).hash(state)
    }
}
