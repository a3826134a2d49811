//! The core types used in the Wisp runtime

mod closure;
mod native_function;
pub mod number;
mod prototype;
mod table;
mod upvalue;
mod user_data;
pub mod value;

pub use self::{
    closure::{Closure, NativeClosure, ScriptClosure},
    native_function::{NativeFn, NativeFunction},
    number::ArithOp,
    prototype::{ClosureCache, LocalVariable, Prototype, UpvalueDescriptor},
    table::{Table, TableRef, TagMethod, WispHasher},
    upvalue::Upvalue,
    user_data::{UserData, UserDataValue},
    value::{Value, ValueType},
};
