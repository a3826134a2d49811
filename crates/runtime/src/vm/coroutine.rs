use crate::{
    CallKind, Error, ErrorKind, NativeFn, NativeFrame, NativeFunction, Result, ResultCount,
    ThreadStatus, Vm, prelude::*,
};
use tracing::debug;

/// The outcome of a successful call to [Vm::resume]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resumed {
    /// The thread's main function has returned, with the given number of results
    ///
    /// The results are at the top of the thread's stack.
    Finished(usize),
    /// The thread suspended itself, passing out the given number of values
    ///
    /// The values are at the top of the thread's stack.
    Suspended(usize),
}

impl Vm {
    /// Suspends the thread, passing the top `count` values from the stack to the resumer
    ///
    /// This should be called by a native function as its return expression, e.g.
    /// `return vm.suspend(1);`. When the thread is resumed, the values passed to [Vm::resume]
    /// become the native function's results.
    ///
    /// The thread can only be suspended while it's being run by [Vm::resume], and not from inside
    /// a native call that can't be suspended (see [Vm::call]).
    pub fn suspend(&mut self, count: usize) -> Result<usize> {
        self.suspend_native_call(count, None)
    }

    /// Suspends the thread, with a continuation that's called when the thread is resumed
    ///
    /// The continuation's results are then used as the suspended native function's results. The
    /// continuation can retrieve `context` with [Vm::continuation_context].
    pub fn suspend_with_continuation(
        &mut self,
        count: usize,
        context: i32,
        continuation: impl NativeFn,
    ) -> Result<usize> {
        self.suspend_native_call(count, Some((context, NativeFunction::new(continuation))))
    }

    fn suspend_native_call(
        &mut self,
        count: usize,
        continuation: Option<(i32, NativeFunction)>,
    ) -> Result<usize> {
        if self.non_suspendable > 0 {
            return if self.is_main {
                runtime_error!("attempt to yield from outside a coroutine")
            } else {
                runtime_error!("attempt to yield across a native-call boundary")
            };
        }
        if count > self.arg_count() {
            return runtime_error!("not enough elements in the stack");
        }

        let depth = self.frames.depth();
        let Some(native) = self.frames.current_mut().as_native_mut() else {
            return runtime_error!("attempt to yield from a script frame");
        };
        match continuation {
            Some((context, continuation)) => {
                native.context = context;
                native.continuation = Some(continuation);
            }
            None => native.continuation = None,
        }

        self.status = ThreadStatus::Suspended;
        self.suspended_count = count;
        debug!(depth, count, "suspending thread");

        Err(Error::new(ErrorKind::Suspended))
    }

    /// Starts or continues running the thread
    ///
    /// When starting, the thread's main function and its `arg_count` arguments should be at the
    /// top of the stack. When continuing a suspended thread, the top `arg_count` values are passed
    /// back to the native function that suspended the thread.
    ///
    /// `from` is the thread that's resuming this one, its nesting depth of native calls is
    /// inherited.
    ///
    /// If an error is thrown then the thread's status becomes [ThreadStatus::Failed], and the
    /// error's value is placed at the top of the thread's stack.
    pub fn resume(&mut self, from: Option<&Vm>, arg_count: usize) -> Result<Resumed> {
        match self.status {
            ThreadStatus::Failed => return runtime_error!("cannot resume dead coroutine"),
            ThreadStatus::Ok if self.frames.depth() > 0 => {
                return runtime_error!("cannot resume non-suspended coroutine");
            }
            ThreadStatus::Ok if self.stack.top() < arg_count + 2 => {
                return runtime_error!("cannot resume dead coroutine");
            }
            _ => {}
        }

        let native_calls = self.native_calls;
        self.native_calls = from.map_or(0, |from| from.native_calls) + 1;
        if self.native_calls >= self.settings().max_native_calls {
            self.native_calls = native_calls;
            return Err(Error::new(ErrorKind::NativeStackOverflow));
        }

        self.non_suspendable = 0;
        let result = if self.status == ThreadStatus::Suspended {
            self.continue_suspended(arg_count)
        } else {
            self.start(arg_count)
        };
        self.non_suspendable = 1;
        self.native_calls = native_calls;

        match result {
            Ok(()) => {
                let count = self.stack.top() - 1;
                debug!(count, "thread finished");
                Ok(Resumed::Finished(count))
            }
            Err(error) if error.is_suspension() => Ok(Resumed::Suspended(self.suspended_count)),
            Err(error) => {
                self.fail(&error);
                Err(error)
            }
        }
    }

    fn start(&mut self, arg_count: usize) -> Result<()> {
        let function = self.stack.top() - arg_count - 1;
        if self.pre_call(function, ResultCount::All)? == CallKind::Script {
            self.frames.current_mut().status.set_fresh(true);
            self.execute()?;
        }
        Ok(())
    }

    fn continue_suspended(&mut self, arg_count: usize) -> Result<()> {
        self.status = ThreadStatus::Ok;

        let first_arg = self.stack.top() - arg_count;
        let has_continuation = self
            .frames
            .current()
            .as_native()
            .map(NativeFrame::has_continuation);

        let exact = match has_continuation {
            Some(true) => self.run_continuation()?,
            Some(false) => self.post_call(first_arg)?,
            None => false,
        };
        self.finish_interrupted_call(exact);

        self.unroll()
    }

    // Runs the frames that were interrupted by the suspension, until the base frame is reached
    fn unroll(&mut self) -> Result<()> {
        while self.frames.depth() > 0 {
            if self.frames.current().status.is_script() {
                self.execute()?;
            } else {
                let exact = self.run_continuation()?;
                self.finish_interrupted_call(exact);
            }
        }
        Ok(())
    }

    fn run_continuation(&mut self) -> Result<bool> {
        let stack_top = self.stack.top();
        let frame = self.frames.current_mut();
        frame.top = frame.top.max(stack_top);
        frame.status.set_resumed(true);

        let Some(continuation) = frame
            .as_native()
            .and_then(|native| native.continuation.clone())
        else {
            return runtime_error!("attempt to resume a native call without a continuation");
        };

        let count = match continuation.call(self) {
            Ok(count) => count,
            Err(error) => return Err(self.handle_error(error)),
        };
        self.return_from_native(count)
    }

    // A script frame that wanted an exact number of results continues with its own top
    fn finish_interrupted_call(&mut self, exact: bool) {
        if exact && self.frames.current().status.is_script() {
            self.restore_frame_top();
        }
    }

    fn fail(&mut self, error: &Error) {
        self.status = ThreadStatus::Failed;
        self.unwind_frames(0);
        self.close_upvalues(1);
        self.stack.set_top(1);
        self.stack.push(error.value());
        debug!(error = %error, "thread failed");
    }

    /// Calls a function from a native function, allowing the thread to be suspended during the call
    ///
    /// If the thread is suspended, then when it's resumed the continuation is called in place of
    /// the rest of the native function, and the continuation's results are returned to the native
    /// function's caller. `context` is made available to the continuation via
    /// [Vm::continuation_context].
    ///
    /// The call can't be suspended if the thread isn't being run by [Vm::resume].
    pub fn call_with_continuation(
        &mut self,
        function: usize,
        results: ResultCount,
        context: i32,
        continuation: impl NativeFn,
    ) -> Result<()> {
        let allow_suspend = self.non_suspendable == 0;
        let Some(native) = self.frames.current_mut().as_native_mut() else {
            return runtime_error!("a continuation can only be set from a native function");
        };
        native.context = context;
        native.continuation = Some(NativeFunction::new(continuation));

        self.call(function, results, allow_suspend)?;

        if results == ResultCount::All {
            let stack_top = self.stack.top();
            let frame = self.frames.current_mut();
            frame.top = frame.top.max(stack_top);
        }
        Ok(())
    }

    /// Returns the context value if the current native function is a continuation that was
    /// called after resuming the thread
    pub fn continuation_context(&self) -> Option<i32> {
        let frame = self.frames.current();
        if frame.status.is_resumed() {
            frame.as_native().map(NativeFrame::context)
        } else {
            None
        }
    }

    /// Moves the top `count` values from this thread's stack to the top of another thread's stack
    pub fn transfer(&mut self, to: &mut Vm, count: usize) -> Result<()> {
        if count > self.stack.top() {
            return runtime_error!("not enough elements in the stack");
        }
        to.check_stack(count)?;

        let first = self.stack.top() - count;
        for index in first..self.stack.top() {
            to.stack.push(self.stack.get(index));
        }
        self.stack.clear(first, self.stack.top());
        self.stack.set_top(first);
        Ok(())
    }
}
