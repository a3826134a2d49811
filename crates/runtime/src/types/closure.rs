use crate::{NativeFn, NativeFunction, Prototype, Upvalue, prelude::*};
use std::fmt;

/// A callable value, either a script function or a native function with its captured values
#[derive(Clone)]
pub enum Closure {
    /// A closure instantiated from a compiled [Prototype]
    Script(Ptr<ScriptClosure>),
    /// A closure wrapping a [NativeFunction]
    Native(Ptr<NativeClosure>),
}

impl Closure {
    /// Makes a script closure with the given upvalues
    ///
    /// This is used by loaders to make a chunk's main function,
    /// see [Vm::instantiate] for closures that capture the running function's locals.
    pub fn script(prototype: Ptr<Prototype>, upvalues: Vec<Upvalue>) -> Self {
        Self::Script(ScriptClosure::new(prototype, upvalues).into())
    }

    /// Makes a native closure without any captured values
    pub fn native(function: impl NativeFn) -> Self {
        Self::native_with_upvalues(function, Vec::new())
    }

    /// Makes a native closure that captures the given values
    pub fn native_with_upvalues(function: impl NativeFn, upvalues: Vec<Value>) -> Self {
        Self::Native(
            NativeClosure {
                function: NativeFunction::new(function),
                upvalues: upvalues.into(),
            }
            .into(),
        )
    }

    /// Returns the value of the upvalue at the given index
    pub fn upvalue(&self, index: usize) -> Option<Value> {
        match self {
            Self::Script(closure) => closure.upvalues.get(index).map(Upvalue::get),
            Self::Native(closure) => closure.upvalues.borrow().get(index).cloned(),
        }
    }

    /// Assigns a value to the upvalue at the given index
    ///
    /// Returns false if the index is out of range.
    pub fn set_upvalue(&self, index: usize, value: Value) -> bool {
        match self {
            Self::Script(closure) => match closure.upvalues.get(index) {
                Some(upvalue) => {
                    upvalue.set(value);
                    true
                }
                None => false,
            },
            Self::Native(closure) => match closure.upvalues.borrow_mut().get_mut(index) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
        }
    }

    /// The number of upvalues captured by the closure
    pub fn upvalue_count(&self) -> usize {
        match self {
            Self::Script(closure) => closure.upvalues.len(),
            Self::Native(closure) => closure.upvalues.borrow().len(),
        }
    }

    /// Returns true if the two closures are the same allocation
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Script(a), Self::Script(b)) => Ptr::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) => Ptr::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns the address of the closure's allocation
    pub fn address(&self) -> Address {
        match self {
            Self::Script(closure) => Ptr::address(closure),
            Self::Native(closure) => Ptr::address(closure),
        }
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script(closure) => write!(f, "script closure: {}", Ptr::address(closure)),
            Self::Native(closure) => write!(f, "native closure: {}", Ptr::address(closure)),
        }
    }
}

/// A function instantiated from a [Prototype], along with its captured upvalues
pub struct ScriptClosure {
    /// The function's prototype
    pub prototype: Ptr<Prototype>,
    upvalues: Box<[Upvalue]>,
}

impl ScriptClosure {
    pub(crate) fn new(prototype: Ptr<Prototype>, upvalues: Vec<Upvalue>) -> Self {
        Self {
            prototype,
            upvalues: upvalues.into(),
        }
    }

    /// The closure's upvalues, in the order described by the prototype
    pub fn upvalues(&self) -> &[Upvalue] {
        &self.upvalues
    }
}

/// A native function along with its captured values
///
/// Captured values are owned by the closure, they're never shared with the stack.
pub struct NativeClosure {
    /// The closure's function
    pub function: NativeFunction,
    upvalues: WispCell<Vec<Value>>,
}
