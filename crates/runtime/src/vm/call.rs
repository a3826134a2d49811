use crate::{
    CallFrame, Closure, Error, ErrorKind, HookEvent, HookMask, NativeFunction, Prototype, Result,
    ResultCount, ScriptFrame, TagMethod, Vm, error::type_error, prelude::*,
};
use tracing::trace;

/// A trait for the bytecode loop that runs script functions
///
/// The VM calls [Execute::execute] after a script frame has been pushed by [Vm::call], the loop
/// then fetches and dispatches instructions from the current frame, using [Vm::pre_call],
/// [Vm::post_call], and [Vm::tail_call] for calls and returns.
pub trait Execute: WispSend + WispSync + 'static {
    /// Runs the current script frame
    ///
    /// Execution continues through any frames called by the loop, and returns once a frame
    /// marked as fresh (see [CallStatus::is_fresh](crate::CallStatus::is_fresh)) has returned.
    fn execute(&self, vm: &mut Vm) -> Result<()>;
}

/// The outcome of [Vm::pre_call]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// A native function was called, and its results are on the stack
    Native,
    /// A script frame was pushed, and needs to be run by the bytecode loop
    Script,
}

impl Vm {
    /// Prepares a call to the value at the `function` stack position
    ///
    /// The call's arguments are between the function and the top of the stack.
    ///
    /// - Native closures are called immediately, with their results placed at the function's
    ///   position.
    /// - Script closures get a new frame, which becomes the current frame. The fixed parameters of
    ///   a variadic function are moved above the variable arguments, so that they're always at
    ///   the start of the frame.
    /// - Other values are called via their `__call` tag method, with the value inserted as the
    ///   first argument.
    pub fn pre_call(&mut self, function: usize, results: ResultCount) -> Result<CallKind> {
        loop {
            match self.stack.get(function) {
                Value::Function(Closure::Native(closure)) => {
                    self.call_native(function, results, closure.function.clone())?;
                    return Ok(CallKind::Native);
                }
                Value::Function(Closure::Script(closure)) => {
                    self.push_script_call(function, results, closure.prototype.clone())?;
                    return Ok(CallKind::Script);
                }
                other => {
                    // The tag method must be a function, so only a single redirection is possible
                    let Some(Value::Function(tag_method)) =
                        self.tag_method(&other, TagMethod::Call)
                    else {
                        return type_error("call", &other);
                    };

                    self.check_stack(1)?;
                    self.stack.shift_up(function);
                    self.stack.set(function, Value::Function(tag_method));
                }
            }
        }
    }

    fn call_native(
        &mut self,
        function: usize,
        results: ResultCount,
        native: NativeFunction,
    ) -> Result<()> {
        let min_stack = self.settings().min_stack;
        self.check_stack(min_stack)?;

        let top = self.stack.top() + min_stack;
        debug_assert!(top <= self.stack.last());
        self.frames.push(CallFrame::native(function, top, results));
        trace!(depth = self.frames.depth(), function, "pushed native frame");

        if self.hook_mask.contains(HookMask::CALL) {
            self.hook(HookEvent::Call, None)?;
        }

        let count = match native.call(self) {
            Ok(count) => count,
            Err(error) => return Err(self.handle_error(error)),
        };

        self.return_from_native(count)?;
        Ok(())
    }

    /// Checks the number of values returned by a native function, and then returns from its frame
    ///
    /// Returns true if the caller wanted an exact number of results.
    pub(crate) fn return_from_native(&mut self, count: usize) -> Result<bool> {
        if count > self.arg_count() {
            return runtime_error!("not enough elements in the stack");
        }
        self.post_call(self.stack.top() - count)
    }

    fn push_script_call(
        &mut self,
        function: usize,
        results: ResultCount,
        prototype: Ptr<Prototype>,
    ) -> Result<()> {
        let parameter_count = prototype.parameter_count;
        let arg_count = self.arg_count_from(function);
        let missing = parameter_count.saturating_sub(arg_count);
        self.check_stack(prototype.max_stack_size + missing)?;

        for _ in 0..missing {
            self.stack.push(Value::Nil);
        }

        let base = if prototype.is_vararg {
            self.adjust_varargs(parameter_count, arg_count.max(parameter_count))
        } else {
            function + 1
        };

        let frame = CallFrame::script(function, base, results, prototype);
        let top = frame.top;
        debug_assert!(top <= self.stack.last());
        self.stack.clear(base + parameter_count, top);
        self.stack.set_top(top);
        self.frames.push(frame);
        trace!(depth = self.frames.depth(), function, base, "pushed script frame");

        if self.hook_mask.contains(HookMask::CALL) {
            self.call_hook()?;
        }

        Ok(())
    }

    fn arg_count_from(&self, function: usize) -> usize {
        self.stack.top().saturating_sub(function + 1)
    }

    /// Moves the fixed parameters of a variadic call above its arguments
    ///
    /// Returns the new base, where the first fixed parameter is now placed.
    fn adjust_varargs(&mut self, parameter_count: usize, arg_count: usize) -> usize {
        let fixed = self.stack.top() - arg_count;
        let base = self.stack.top();
        for i in 0..parameter_count {
            let value = self.stack.get(fixed + i);
            self.stack.set(fixed + i, Value::Nil);
            self.stack.push(value);
        }
        base
    }

    /// Returns from the current frame
    ///
    /// The returned values are between `first_result` and the top of the stack, they're moved to
    /// the frame's function position, truncated or padded with nil when the caller wanted an
    /// exact number of results. The frame's upvalues are closed before it's popped.
    ///
    /// Returns true if the caller wanted an exact number of results.
    pub fn post_call(&mut self, first_result: usize) -> Result<bool> {
        if self.hook_mask.contains(HookMask::RETURN) {
            self.hook(HookEvent::Return, None)?;
        }

        let frame = self.frames.current();
        let function = frame.function;
        let wanted = frame.results;
        let base = frame.as_script().map(ScriptFrame::base);

        // Padding can reach beyond the current top
        if let ResultCount::Exact(wanted) = wanted {
            let end = function + wanted;
            if end > self.stack.top() {
                self.check_stack(end - self.stack.top())?;
            }
        }

        if let Some(base) = base {
            self.close_upvalues(base);
        }

        let available = self.stack.top().saturating_sub(first_result);
        let count = match wanted {
            ResultCount::Exact(wanted) => wanted,
            ResultCount::All => available,
        };
        let copied = count.min(available);
        self.stack.copy_within(first_result, function, copied);
        self.stack.clear(function + copied, function + count);
        self.stack.set_top(function + count);

        self.frames.pop();
        trace!(depth = self.frames.depth(), results = count, "popped frame");

        if self.hook_mask.intersects(HookMask::RETURN | HookMask::LINE) {
            if let Some(caller) = self.frames.current().as_script() {
                self.old_pc = caller.saved_pc();
            }
        }

        Ok(wanted.is_exact())
    }

    /// Calls the value at the `function` stack position, running script functions to completion
    ///
    /// The results are placed at the function's position, with the top of the stack following
    /// the last result.
    ///
    /// If `allow_suspend` is false then the thread can't be suspended during the call.
    pub fn call(&mut self, function: usize, results: ResultCount, allow_suspend: bool) -> Result<()> {
        self.native_calls += 1;
        if !allow_suspend {
            self.non_suspendable += 1;
        }

        let result = match self.call_and_execute(function, results) {
            Err(error) => Err(self.handle_error(error)),
            ok => ok,
        };

        if !allow_suspend {
            self.non_suspendable -= 1;
        }
        self.native_calls -= 1;

        result
    }

    fn call_and_execute(&mut self, function: usize, results: ResultCount) -> Result<()> {
        let limit = self.settings().max_native_calls;
        if self.native_calls == limit {
            return Err(Error::new(ErrorKind::NativeStackOverflow));
        } else if self.native_calls >= limit + (limit >> 3) {
            // The stack overflow is already being handled
            return Err(Error::new(ErrorKind::ErrorInErrorHandling));
        }

        if self.pre_call(function, results)? == CallKind::Script {
            self.frames.current_mut().status.set_fresh(true);
            self.execute()?;
        }

        Ok(())
    }

    pub(crate) fn execute(&mut self) -> Result<()> {
        let Some(executor) = self.settings().executor.clone() else {
            return runtime_error!("no bytecode interpreter is installed");
        };
        executor.execute(self)
    }

    /// Makes a tail call to the value at the `function` stack position
    ///
    /// The call's arguments are between the function and the top of the stack, and all results
    /// are requested. If a script frame is pushed then it replaces the calling frame, which keeps
    /// its status and is marked as a tail call.
    pub fn tail_call(&mut self, function: usize) -> Result<CallKind> {
        if self.pre_call(function, ResultCount::All)? == CallKind::Native {
            return Ok(CallKind::Native);
        }

        let called = self.frames.current().clone();
        let Some(called_script) = called.as_script() else {
            return Ok(CallKind::Script);
        };
        let Some(caller_base) = self
            .frames
            .previous()
            .and_then(CallFrame::as_script)
            .map(|caller| caller.base())
        else {
            return Ok(CallKind::Script);
        };

        self.close_upvalues(caller_base);

        let caller_function = self.frames.previous().map_or(0, |caller| caller.function);
        let prototype = called_script.prototype().clone();
        // The function, varargs, and fixed parameters are moved down to the caller's position
        let limit = called_script.base() + prototype.parameter_count;
        self.stack
            .copy_within(called.function, caller_function, limit - called.function);

        let base = caller_function + (called_script.base() - called.function);
        let top = caller_function + (self.stack.top() - called.function);
        let saved_pc = called_script.saved_pc();

        self.frames.pop();
        let caller = self.frames.current_mut();
        caller.top = top;
        caller.status.set_tail_call(true);
        if let Some(script) = caller.as_script_mut() {
            script.relocate(base, prototype, saved_pc);
        }
        self.stack.set_top(top);
        trace!(depth = self.frames.depth(), base, "replaced frame with tail call");

        Ok(CallKind::Script)
    }
}
