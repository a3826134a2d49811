use crate::{CallFrame, Error, ErrorKind, Result, Vm, prelude::*};
use tracing::trace;

/// A thread's value stack
///
/// The slots are shared with the thread's open upvalues, which refer to slots by index so that
/// they remain valid when the stack is reallocated.
pub(crate) struct ValueStack {
    slots: PtrMut<Vec<Value>>,
    top: usize,
    // The limit of the usable part of the stack, the remaining slots are spare
    last: usize,
}

impl ValueStack {
    pub fn new(size: usize, extra: usize) -> Self {
        Self {
            slots: PtrMut::from(vec![Value::Nil; size]),
            top: 0,
            last: size - extra,
        }
    }

    pub fn slots(&self) -> &PtrMut<Vec<Value>> {
        &self.slots
    }

    pub fn handle(&self) -> WeakMut<Vec<Value>> {
        Ptr::downgrade(&self.slots)
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn set_top(&mut self, top: usize) {
        debug_assert!(top <= self.len());
        self.top = top;
    }

    pub fn last(&self) -> usize {
        self.last
    }

    pub fn get(&self, index: usize) -> Value {
        self.slots.borrow().get(index).cloned().unwrap_or_default()
    }

    pub fn set(&self, index: usize, value: Value) {
        self.slots.borrow_mut()[index] = value;
    }

    pub fn push(&mut self, value: Value) {
        self.set(self.top, value);
        self.top += 1;
    }

    pub fn pop(&mut self) -> Value {
        assert!(self.top > 0, "attempt to pop from an empty stack");
        self.top -= 1;
        std::mem::take(&mut self.slots.borrow_mut()[self.top])
    }

    /// Copies `count` values from `source` to `target`, the ranges may overlap
    pub fn copy_within(&self, source: usize, target: usize, count: usize) {
        let mut slots = self.slots.borrow_mut();
        if target <= source {
            for i in 0..count {
                slots[target + i] = slots[source + i].clone();
            }
        } else {
            for i in (0..count).rev() {
                slots[target + i] = slots[source + i].clone();
            }
        }
    }

    /// Sets the slots in the range to nil
    pub fn clear(&self, start: usize, end: usize) {
        let mut slots = self.slots.borrow_mut();
        for slot in &mut slots[start..end] {
            *slot = Value::Nil;
        }
    }

    /// Moves the values from `start` up to the top up by one slot, and increments the top
    pub fn shift_up(&mut self, start: usize) {
        {
            let mut slots = self.slots.borrow_mut();
            for i in (start + 1..=self.top).rev() {
                slots[i] = std::mem::take(&mut slots[i - 1]);
            }
        }
        self.top += 1;
    }

    /// True if there are `n` or fewer free slots available above the top
    pub fn needs_growth(&self, n: usize) -> bool {
        self.last.saturating_sub(self.top) <= n
    }

    pub fn resize(&mut self, size: usize, extra: usize) {
        let mut slots = self.slots.borrow_mut();
        slots.resize(size, Value::Nil);
        slots.shrink_to_fit();
        self.last = size - extra;
    }
}

/// Returns the size that the stack should grow to, or `None` if the stack would overflow
fn growth_target(size: usize, top: usize, n: usize, extra: usize, max: usize) -> Option<usize> {
    let needed = top + n + extra;
    let target = (2 * size).min(max).max(needed);
    (target <= max).then_some(target)
}

impl Vm {
    /// Ensures that at least `n` free slots are available above the top of the stack
    ///
    /// The stack is grown if necessary, which fails with a stack overflow error when the
    /// configured maximum stack size would be exceeded.
    pub fn check_stack(&mut self, n: usize) -> Result<()> {
        if self.stack.needs_growth(n) {
            self.grow_stack(n)
        } else {
            Ok(())
        }
    }

    fn grow_stack(&mut self, n: usize) -> Result<()> {
        let settings = self.settings();
        let (max, extra) = (settings.max_stack, settings.extra_stack);
        let error_stack_size = max + settings.error_stack_margin;
        let size = self.stack.len();

        // The stack has already grown into the space reserved for handling an overflow
        if size > max {
            return Err(Error::new(ErrorKind::ErrorInErrorHandling));
        }

        match growth_target(size, self.stack.top(), n, extra, max) {
            Some(target) => {
                self.reallocate_stack(target);
                Ok(())
            }
            None => {
                self.reallocate_stack(error_stack_size);
                Err(Error::new(ErrorKind::StackOverflow))
            }
        }
    }

    fn reallocate_stack(&mut self, size: usize) {
        let old_size = self.stack.len();
        self.stack.resize(size, self.settings().extra_stack);
        trace!(old_size, size, depth = self.frames.depth(), "reallocated stack");

        // Frames refer to the stack by index, so their windows only need to fit in the new stack
        debug_assert!(
            self.frames
                .active()
                .iter()
                .filter_map(CallFrame::window)
                .all(|window| window.end <= size)
        );
    }

    /// Shrinks the stack after recovering from an error
    ///
    /// The stack is reduced to what's in use by active frames plus some slack, which also releases
    /// the space reserved for reporting a stack overflow.
    pub(crate) fn shrink_stack(&mut self) {
        let settings = self.settings();
        let (max, extra) = (settings.max_stack, settings.extra_stack);

        let in_use = self
            .frames
            .active()
            .iter()
            .map(|frame| frame.top())
            .fold(self.stack.top(), usize::max)
            + 1;
        let good_size = (in_use + in_use / 8 + 2 * extra).min(max);

        if in_use <= max && good_size < self.stack.len() {
            self.reallocate_stack(good_size);
        }
    }
}
