//! The Wisp virtual machine's call stack and closure engine

mod call;
mod coroutine;
mod frame;
mod hook;
mod protected;
mod stack;
mod upvalues;

pub use self::{
    call::{CallKind, Execute},
    coroutine::Resumed,
    frame::{CallFrame, CallStatus, FrameKind, NativeFrame, ResultCount, ScriptFrame},
    hook::{DebugInfo, Hook, HookEvent, HookMask},
};

use self::{frame::FrameChain, stack::ValueStack, upvalues::OpenUpvalues};
use crate::{Closure, ScriptClosure, TableRef, TagMethod, ValueType, limits, prelude::*};
use rustc_hash::FxHashMap;
use std::fmt;

/// The configurable settings that should be used by the Wisp runtime
#[derive(Clone)]
pub struct VmSettings {
    /// The maximum number of slots in a thread's value stack
    ///
    /// Growing the stack beyond this size results in a stack overflow error.
    pub max_stack: usize,

    /// The number of free stack slots that are guaranteed to native functions and debug hooks
    pub min_stack: usize,

    /// The maximum nesting depth of calls made via [Vm::call]
    pub max_native_calls: usize,

    /// The maximum number of upvalues that can be captured by a closure
    pub max_upvalues: usize,

    /// Spare slots allocated beyond the usable part of the stack
    pub extra_stack: usize,

    /// The number of slots beyond `max_stack` that are made available while reporting an overflow
    pub error_stack_margin: usize,

    /// The bytecode loop that runs script functions
    ///
    /// Calls to script functions fail if no executor is provided.
    pub executor: Option<Ptr<dyn Execute>>,
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            max_stack: limits::MAX_STACK,
            min_stack: limits::MIN_STACK,
            max_native_calls: limits::MAX_NATIVE_CALLS,
            max_upvalues: limits::MAX_UPVALUES,
            extra_stack: limits::EXTRA_STACK,
            error_stack_margin: limits::ERROR_STACK_MARGIN,
            executor: None,
        }
    }
}

impl VmSettings {
    /// Sets the bytecode loop that runs script functions
    #[must_use]
    pub fn with_executor(mut self, executor: impl Execute) -> Self {
        let executor: Ptr<dyn Execute> = make_ptr!(executor);
        self.executor = Some(executor);
        self
    }

    fn basic_stack_size(&self) -> usize {
        2 * self.min_stack
    }
}

impl fmt::Debug for VmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmSettings")
            .field("max_stack", &self.max_stack)
            .field("min_stack", &self.min_stack)
            .field("max_native_calls", &self.max_native_calls)
            .field("max_upvalues", &self.max_upvalues)
            .field("extra_stack", &self.extra_stack)
            .field("error_stack_margin", &self.error_stack_margin)
            .field("has_executor", &self.executor.is_some())
            .finish()
    }
}

// State that's shared between a VM and the threads that it spawns
struct VmContext {
    settings: VmSettings,
    type_metatables: WispCell<FxHashMap<ValueType, TableRef>>,
}

/// The status of a thread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadStatus {
    /// The thread is ready to run, running, or has finished
    Ok,
    /// The thread has suspended itself and is waiting to be resumed
    Suspended,
    /// The thread has been stopped by an error, and can't be resumed
    Failed,
}

/// A thread of execution, with its own value stack and chain of call frames
///
/// Additional threads (coroutines) are made with [Vm::new_thread], they share settings and
/// metatables with the VM that made them.
pub struct Vm {
    context: Ptr<VmContext>,
    stack: ValueStack,
    frames: FrameChain,
    open_upvalues: OpenUpvalues,
    // The nesting depth of calls made via `call`
    native_calls: usize,
    // Suspension is only allowed when this is zero
    non_suspendable: usize,
    hook: Option<Ptr<dyn Hook>>,
    hook_mask: HookMask,
    base_hook_count: usize,
    hook_count: usize,
    allow_hook: bool,
    // The saved pc of the most recently traced instruction
    old_pc: usize,
    status: ThreadStatus,
    // The number of values passed to the most recent suspension
    suspended_count: usize,
    error_handler: Option<Value>,
    is_main: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Initializes a Wisp VM with default settings
    pub fn new() -> Self {
        Self::with_settings(VmSettings::default())
    }

    /// Initializes a Wisp VM with the provided settings
    pub fn with_settings(settings: VmSettings) -> Self {
        let context = VmContext {
            settings,
            type_metatables: WispCell::default(),
        };
        Self::with_context(context.into(), true)
    }

    fn with_context(context: Ptr<VmContext>, is_main: bool) -> Self {
        let settings = &context.settings;
        let mut stack = ValueStack::new(settings.basic_stack_size(), settings.extra_stack);
        // The base frame's function slot
        stack.push(Value::Nil);
        let base_frame = CallFrame::native(0, stack.top() + settings.min_stack, ResultCount::All);

        Self {
            stack,
            frames: FrameChain::new(base_frame),
            open_upvalues: OpenUpvalues::default(),
            native_calls: 0,
            non_suspendable: 1,
            hook: None,
            hook_mask: HookMask::default(),
            base_hook_count: 0,
            hook_count: 0,
            allow_hook: true,
            old_pc: 0,
            status: ThreadStatus::Ok,
            suspended_count: 0,
            error_handler: None,
            is_main,
            context,
        }
    }

    /// Makes a new thread that shares this VM's settings and metatables
    ///
    /// The new thread inherits the VM's debug hook.
    pub fn new_thread(&self) -> Self {
        let mut thread = Self::with_context(self.context.clone(), false);
        thread.hook = self.hook.clone();
        thread.hook_mask = self.hook_mask;
        thread.base_hook_count = self.base_hook_count;
        thread.reset_hook_count();
        thread
    }

    /// The VM's settings
    pub fn settings(&self) -> &VmSettings {
        &self.context.settings
    }

    /// The thread's status
    pub fn status(&self) -> ThreadStatus {
        self.status
    }

    /// True if this is the main thread, rather than a thread made with [Vm::new_thread]
    pub fn is_main_thread(&self) -> bool {
        self.is_main
    }

    /// The current nesting depth of calls made via [Vm::call]
    pub fn native_call_depth(&self) -> usize {
        self.native_calls
    }

    /// The index of the stack slot above the last occupied slot
    pub fn top(&self) -> usize {
        self.stack.top()
    }

    /// Moves the top of the stack
    ///
    /// The caller is responsible for the stack having enough space, see [Vm::check_stack].
    pub fn set_top(&mut self, top: usize) {
        self.stack.set_top(top);
    }

    /// Moves the top of the stack to the top of the current frame
    ///
    /// The bytecode loop uses this after calls that produced an exact number of results.
    pub fn restore_frame_top(&mut self) {
        let top = self.frames.current().top;
        self.stack.set_top(top);
    }

    /// The number of slots allocated for the stack
    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// Pushes a value to the top of the stack
    pub fn push(&mut self, value: impl Into<Value>) {
        debug_assert!(self.stack.top() < self.stack.len());
        self.stack.push(value.into());
    }

    /// Removes the value at the top of the stack
    pub fn pop(&mut self) -> Value {
        self.stack.pop()
    }

    /// Returns the value in the given stack slot
    pub fn get(&self, index: usize) -> Value {
        self.stack.get(index)
    }

    /// Assigns a value to the given stack slot
    pub fn set(&mut self, index: usize, value: impl Into<Value>) {
        self.stack.set(index, value.into());
    }

    /// Copies `count` values from `source` to `target` on the stack
    pub fn copy(&mut self, source: usize, target: usize, count: usize) {
        self.stack.copy_within(source, target, count);
    }

    /// Returns the values between the given index and the top of the stack
    pub fn values_from(&self, start: usize) -> Vec<Value> {
        (start..self.stack.top()).map(|i| self.stack.get(i)).collect()
    }

    /// The number of arguments passed to the current native function
    pub fn arg_count(&self) -> usize {
        self.stack
            .top()
            .saturating_sub(self.frames.current().function + 1)
    }

    /// Returns an argument of the current native function, or nil if it's out of range
    pub fn arg(&self, index: usize) -> Value {
        if index < self.arg_count() {
            self.stack.get(self.frames.current().function + 1 + index)
        } else {
            Value::Nil
        }
    }

    /// The function being called by the current frame
    pub fn current_function(&self) -> Value {
        self.stack.get(self.frames.current().function)
    }

    /// Returns an upvalue of the current frame's function
    pub fn upvalue(&self, index: usize) -> Option<Value> {
        match self.current_function() {
            Value::Function(closure) => closure.upvalue(index),
            _ => None,
        }
    }

    /// Assigns a value to an upvalue of the current frame's function
    pub fn set_upvalue(&self, index: usize, value: Value) -> bool {
        match self.current_function() {
            Value::Function(closure) => closure.set_upvalue(index, value),
            _ => false,
        }
    }

    /// The depth of the current frame, the base frame has a depth of zero
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// The current call frame
    pub fn current_frame(&self) -> &CallFrame {
        self.frames.current()
    }

    /// The current call frame, mutably
    ///
    /// The bytecode loop uses this to step through the current script frame's instructions.
    pub fn current_frame_mut(&mut self) -> &mut CallFrame {
        self.frames.current_mut()
    }

    /// Returns the active frame at the given depth
    pub fn frame(&self, depth: usize) -> Option<&CallFrame> {
        self.frames.get(depth)
    }

    /// The number of frames that have been allocated, including inactive frames available for reuse
    pub fn allocated_frames(&self) -> usize {
        self.frames.allocated()
    }

    /// Sets or clears the metatable used for values of the given type
    ///
    /// Tables and user data have their own metatables, and aren't affected.
    pub fn set_type_metatable(&self, value_type: ValueType, metatable: Option<TableRef>) {
        let mut metatables = self.context.type_metatables.borrow_mut();
        match metatable {
            Some(metatable) => metatables.insert(value_type, metatable),
            None => metatables.remove(&value_type),
        };
    }

    /// Returns the metatable used for the value
    pub fn metatable(&self, value: &Value) -> Option<TableRef> {
        match value {
            Value::Table(table) => table.borrow().metatable().cloned(),
            Value::UserData(data) => data.borrow().metatable.clone(),
            other => self
                .context
                .type_metatables
                .borrow()
                .get(&other.value_type())
                .cloned(),
        }
    }

    /// Looks up the tag method for an operation in the value's metatable
    pub fn tag_method(&self, value: &Value, tag_method: TagMethod) -> Option<Value> {
        let metatable = self.metatable(value)?;
        let result = metatable.borrow().get(tag_method.name()).cloned();
        result
    }

    /// Returns the script closure being run by the current frame
    pub fn current_closure(&self) -> Option<Ptr<ScriptClosure>> {
        match self.current_function() {
            Value::Function(Closure::Script(closure)) => Some(closure),
            _ => None,
        }
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        // Closures that outlive the thread keep the values of their captured locals
        self.close_upvalues(0);
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("status", &self.status)
            .field("depth", &self.frames.depth())
            .field("top", &self.stack.top())
            .field("stack_size", &self.stack.len())
            .finish_non_exhaustive()
    }
}
