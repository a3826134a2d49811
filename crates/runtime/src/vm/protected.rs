use crate::{Error, ResultCount, Result, ScriptFrame, Vm, prelude::*};
use tracing::debug;

impl Vm {
    /// Sets the function that's called with the value of a runtime error before it propagates
    ///
    /// The handler's single result replaces the error's value. An error thrown by the handler is
    /// itself passed to the handler, and if the handler keeps failing then the recursion is
    /// stopped with an [ErrorInErrorHandling](crate::ErrorKind::ErrorInErrorHandling) error.
    ///
    /// Returns the previous handler.
    pub fn set_error_handler(&mut self, handler: Option<Value>) -> Option<Value> {
        std::mem::replace(&mut self.error_handler, handler)
    }

    /// The function that's called when a runtime error is thrown
    pub fn error_handler(&self) -> Option<&Value> {
        self.error_handler.as_ref()
    }

    /// Passes an error through the error handler
    ///
    /// This is called at the point where the error is thrown, while the frames that produced the
    /// error are still active. Errors are only handled once.
    pub(crate) fn handle_error(&mut self, mut error: Error) -> Error {
        if error.handled || !error.is_recoverable() {
            return error;
        }
        error.handled = true;

        let Some(handler) = self.error_handler.clone() else {
            return error;
        };

        let top = self.stack.top();
        if let Err(mut stack_error) = self.check_stack(2) {
            stack_error.handled = true;
            return stack_error;
        }
        self.stack.push(handler);
        self.stack.push(error.value());

        match self.call(top, ResultCount::Exact(1), false) {
            Ok(()) => {
                let mut handled = Error::from_value(self.stack.get(top));
                handled.handled = true;
                self.stack.set_top(top);
                handled
            }
            Err(nested) => nested,
        }
    }

    /// Calls the value at the `function` stack position, catching recoverable errors
    ///
    /// When the call succeeds, the results are placed at the function's position as with
    /// [Vm::call], and `None` is returned.
    ///
    /// When a recoverable error is thrown, the frames above the calling frame are unwound, upvalues
    /// that refer to the unwound part of the stack are closed, and the error's value is placed at
    /// the function's position. The error is then returned as `Some`.
    ///
    /// Fatal errors also unwind the stack, but are then returned as `Err`.
    pub fn protected_call(
        &mut self,
        function: usize,
        results: ResultCount,
    ) -> Result<Option<Error>> {
        let depth = self.frames.depth();
        let allow_hook = self.allow_hook;

        let Err(error) = self.call(function, results, false) else {
            return Ok(None);
        };

        self.unwind_frames(depth);
        self.close_upvalues(function);
        self.allow_hook = allow_hook;

        if error.is_recoverable() {
            self.stack.set(function, error.value());
            self.stack.set_top(function + 1);
            self.shrink_stack();
            debug!(depth, error = %error, "caught error in protected call");
            Ok(Some(error))
        } else {
            self.stack.set_top(function);
            Err(error)
        }
    }

    /// Pops frames until the given depth is reached, closing the popped script frames' upvalues
    pub(crate) fn unwind_frames(&mut self, depth: usize) {
        while self.frames.depth() > depth {
            if let Some(base) = self.frames.current().as_script().map(ScriptFrame::base) {
                self.close_upvalues(base);
            }
            self.frames.pop();
        }
    }
}
