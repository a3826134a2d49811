//! Contains the call stack and closure engine of the Wisp virtual machine
//!
//! The runtime provides the parts of the VM that sit beneath the bytecode loop: the value stack,
//! call frames, upvalues and closures, the call and return protocol, debug hooks, protected
//! calls, and coroutines. The bytecode loop itself is provided via the [Execute] trait.

#![warn(missing_docs)]

mod error;
mod instruction;
mod send_sync;
mod types;
mod vm;

pub mod limits;
pub mod prelude;

pub use crate::{
    error::{Error, ErrorKind, Result, type_error},
    instruction::Instruction,
    send_sync::{WispSend, WispSync},
    types::{
        ArithOp, Closure, ClosureCache, LocalVariable, NativeClosure, NativeFn, NativeFunction,
        Prototype, ScriptClosure, Table, TableRef, TagMethod, Upvalue, UpvalueDescriptor, UserData,
        UserDataValue, Value, ValueType, WispHasher,
        number::{arith, coerce_to_string, number_to_string, to_number},
    },
    vm::{
        CallFrame, CallKind, CallStatus, DebugInfo, Execute, FrameKind, Hook, HookEvent, HookMask,
        NativeFrame, ResultCount, Resumed, ScriptFrame, ThreadStatus, Vm, VmSettings,
    },
};
pub use wisp_memory::{
    Address, Borrow, BorrowMut, Ptr, PtrMut, Weak, WeakMut, WispCell, make_ptr, make_ptr_mut,
};
