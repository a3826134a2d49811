//! A collection of useful items to make it easier to work with `wisp_runtime`

#[doc(inline)]
pub use crate::{
    Address, CallKind, Closure, Error, ErrorKind, NativeFn, Prototype, Ptr, PtrMut, Result,
    ResultCount, TagMethod, Table, TableRef, Value, ValueType, Vm, VmSettings, Weak, WeakMut,
    WispCell, WispSend, WispSync, make_ptr, make_ptr_mut, runtime_error,
};
