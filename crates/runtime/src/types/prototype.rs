use crate::{Instruction, ScriptClosure, prelude::*};
use std::fmt;

/// The compiled description of a script function
///
/// Prototypes are produced by a compiler and are immutable once created, every closure that's
/// instantiated from a prototype shares it.
#[derive(Debug, Default)]
pub struct Prototype {
    /// The function's constant pool
    pub constants: Vec<Value>,
    /// The function's bytecode
    pub code: Vec<Instruction>,
    /// Prototypes of functions that are defined inside this function
    pub prototypes: Vec<Ptr<Prototype>>,
    /// The source line for each instruction in `code`
    pub line_info: Vec<u32>,
    /// Descriptions of the function's local variables
    pub local_variables: Vec<LocalVariable>,
    /// Descriptions of the upvalues that are captured when the function is instantiated
    pub upvalues: Vec<UpvalueDescriptor>,
    /// The name of the function's source
    pub source: String,
    /// The line where the function's definition starts
    pub line_defined: u32,
    /// The line where the function's definition ends
    pub last_line_defined: u32,
    /// The number of fixed parameters
    pub parameter_count: usize,
    /// True if the function accepts a variable number of arguments after its fixed parameters
    pub is_vararg: bool,
    /// The number of stack slots needed by an activation of the function
    pub max_stack_size: usize,
    /// The most recently instantiated closure
    pub cache: ClosureCache,
}

impl Prototype {
    /// Returns the source line of the instruction at the given position
    pub fn line_at(&self, pc: usize) -> Option<u32> {
        self.line_info.get(pc).copied()
    }

    /// Returns the name of the local variable in the given register at the given position
    pub fn local_name(&self, register: usize, pc: usize) -> Option<&str> {
        self.local_variables
            .iter()
            .take_while(|local| local.start_pc <= pc)
            .filter(|local| pc < local.end_pc)
            .nth(register)
            .map(|local| local.name.as_str())
    }
}

/// A local variable's name and the range of instructions where it's active
#[derive(Clone, Debug, Default)]
#[allow(missing_docs)]
pub struct LocalVariable {
    pub name: String,
    pub start_pc: usize,
    pub end_pc: usize,
}

/// Describes how an upvalue is captured when a closure is instantiated
#[derive(Clone, Debug, Default)]
pub struct UpvalueDescriptor {
    /// The upvalue's name
    pub name: String,
    /// If true then the upvalue captures a local of the enclosing function,
    /// otherwise it shares one of the enclosing closure's upvalues.
    pub in_stack: bool,
    /// The enclosing function's register or upvalue index
    pub index: usize,
}

impl UpvalueDescriptor {
    /// Describes an upvalue that captures a local from the enclosing function's register
    pub fn local(name: &str, register: usize) -> Self {
        Self {
            name: name.into(),
            in_stack: true,
            index: register,
        }
    }

    /// Describes an upvalue that shares one of the enclosing closure's upvalues
    pub fn inherited(name: &str, upvalue: usize) -> Self {
        Self {
            name: name.into(),
            in_stack: false,
            index: upvalue,
        }
    }
}

/// A weak reference to the last closure that was created from a [Prototype]
///
/// The cache doesn't keep the closure alive.
#[derive(Default)]
pub struct ClosureCache(WispCell<Option<Weak<ScriptClosure>>>);

impl ClosureCache {
    /// Returns the cached closure if it's still alive
    pub fn get(&self) -> Option<Ptr<ScriptClosure>> {
        self.0.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set(&self, closure: &Ptr<ScriptClosure>) {
        *self.0.borrow_mut() = Some(Ptr::downgrade(closure));
    }
}

impl fmt::Debug for ClosureCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClosureCache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str, start_pc: usize, end_pc: usize) -> LocalVariable {
        LocalVariable {
            name: name.into(),
            start_pc,
            end_pc,
        }
    }

    #[test]
    fn local_names_depend_on_the_active_range() {
        let prototype = Prototype {
            local_variables: vec![local("a", 0, 10), local("b", 2, 5), local("c", 6, 10)],
            ..Default::default()
        };

        assert_eq!(prototype.local_name(0, 3), Some("a"));
        assert_eq!(prototype.local_name(1, 3), Some("b"));
        assert_eq!(prototype.local_name(2, 3), None);
        // b has gone out of scope, so c takes its register
        assert_eq!(prototype.local_name(1, 7), Some("c"));
        assert_eq!(prototype.local_name(1, 1), None);
    }
}
