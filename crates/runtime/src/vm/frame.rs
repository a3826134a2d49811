use crate::{Instruction, NativeFunction, Prototype, prelude::*};
use std::{fmt, ops::Range};

/// The number of results that a caller wants from a call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCount {
    /// Exactly this many results, missing results are padded with nil
    Exact(usize),
    /// All of the results produced by the callee
    All,
}

impl ResultCount {
    /// Returns true if an exact number of results was requested
    pub fn is_exact(self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

/// Flags describing the state of a [CallFrame]
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct CallStatus(u8);

impl CallStatus {
    const SCRIPT: u8 = 1 << 0;
    const HOOKED: u8 = 1 << 1;
    const FRESH: u8 = 1 << 2;
    const TAIL_CALL: u8 = 1 << 3;
    const RESUMED: u8 = 1 << 4;

    pub(crate) fn script() -> Self {
        Self(Self::SCRIPT)
    }

    /// True if the frame belongs to a script function
    pub fn is_script(self) -> bool {
        self.0 & Self::SCRIPT != 0
    }

    /// True while a debug hook is running for the frame
    pub fn is_hooked(self) -> bool {
        self.0 & Self::HOOKED != 0
    }

    /// True if the frame was started by a new run of the bytecode loop
    ///
    /// The bytecode loop returns to its caller when a fresh frame returns.
    pub fn is_fresh(self) -> bool {
        self.0 & Self::FRESH != 0
    }

    /// True if the frame's function was tail called
    pub fn is_tail_call(self) -> bool {
        self.0 & Self::TAIL_CALL != 0
    }

    /// True if a native frame is running its continuation after its thread was resumed
    pub fn is_resumed(self) -> bool {
        self.0 & Self::RESUMED != 0
    }

    pub(crate) fn set_hooked(&mut self, value: bool) {
        self.set(Self::HOOKED, value)
    }

    pub(crate) fn set_fresh(&mut self, value: bool) {
        self.set(Self::FRESH, value)
    }

    pub(crate) fn set_tail_call(&mut self, value: bool) {
        self.set(Self::TAIL_CALL, value)
    }

    pub(crate) fn set_resumed(&mut self, value: bool) {
        self.set(Self::RESUMED, value)
    }

    fn set(&mut self, flag: u8, value: bool) {
        if value {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
    }
}

impl fmt::Debug for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.is_script(), "script"),
            (self.is_hooked(), "hooked"),
            (self.is_fresh(), "fresh"),
            (self.is_tail_call(), "tail call"),
            (self.is_resumed(), "resumed"),
        ];
        f.debug_set()
            .entries(flags.iter().filter(|(set, _)| *set).map(|(_, name)| name))
            .finish()
    }
}

/// The bookkeeping for an active function call
#[derive(Clone, Debug)]
pub struct CallFrame {
    pub(crate) function: usize,
    pub(crate) top: usize,
    pub(crate) results: ResultCount,
    pub(crate) status: CallStatus,
    pub(crate) kind: FrameKind,
}

impl CallFrame {
    pub(crate) fn native(function: usize, top: usize, results: ResultCount) -> Self {
        Self {
            function,
            top,
            results,
            status: CallStatus::default(),
            kind: FrameKind::Native(NativeFrame::default()),
        }
    }

    pub(crate) fn script(
        function: usize,
        base: usize,
        results: ResultCount,
        prototype: Ptr<Prototype>,
    ) -> Self {
        Self {
            function,
            top: base + prototype.max_stack_size,
            results,
            status: CallStatus::script(),
            kind: FrameKind::Script(ScriptFrame {
                base,
                saved_pc: 0,
                prototype,
            }),
        }
    }

    /// The stack position of the called function
    ///
    /// The call's arguments follow the function, and its results are placed here on return.
    pub fn function(&self) -> usize {
        self.function
    }

    /// The upper bound of the stack slots available to the call
    pub fn top(&self) -> usize {
        self.top
    }

    /// The number of results wanted by the caller
    pub fn results(&self) -> ResultCount {
        self.results
    }

    /// The frame's status flags
    pub fn status(&self) -> CallStatus {
        self.status
    }

    /// The frame's script or native specific data
    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    /// Returns the frame's script data, if it's a script frame
    pub fn as_script(&self) -> Option<&ScriptFrame> {
        match &self.kind {
            FrameKind::Script(frame) => Some(frame),
            FrameKind::Native(_) => None,
        }
    }

    /// Returns the frame's script data mutably, if it's a script frame
    pub fn as_script_mut(&mut self) -> Option<&mut ScriptFrame> {
        match &mut self.kind {
            FrameKind::Script(frame) => Some(frame),
            FrameKind::Native(_) => None,
        }
    }

    /// Returns the frame's native data, if it's a native frame
    pub fn as_native(&self) -> Option<&NativeFrame> {
        match &self.kind {
            FrameKind::Native(frame) => Some(frame),
            FrameKind::Script(_) => None,
        }
    }

    pub(crate) fn as_native_mut(&mut self) -> Option<&mut NativeFrame> {
        match &mut self.kind {
            FrameKind::Native(frame) => Some(frame),
            FrameKind::Script(_) => None,
        }
    }

    /// The range of stack slots that belong to a script frame's activation
    pub fn window(&self) -> Option<Range<usize>> {
        self.as_script().map(|frame| frame.base..self.top)
    }

    /// Converts a stack index into an index relative to the script frame's base
    ///
    /// Panics if the index is outside of the frame's window.
    pub fn frame_index(&self, stack_index: usize) -> usize {
        match self.window() {
            Some(window) if window.contains(&stack_index) => stack_index - window.start,
            _ => panic!("frame_index called with an out-of-range stack index ({stack_index})"),
        }
    }

    /// Returns the source line that the frame is currently executing
    pub fn current_line(&self) -> Option<u32> {
        self.as_script().and_then(ScriptFrame::current_line)
    }
}

/// The script or native specific part of a [CallFrame]
#[derive(Clone, Debug)]
pub enum FrameKind {
    /// A frame that's executed by the bytecode loop
    Script(ScriptFrame),
    /// A frame that's running a native function
    Native(NativeFrame),
}

/// The state of a script function's activation
#[derive(Clone, Debug)]
pub struct ScriptFrame {
    base: usize,
    saved_pc: usize,
    prototype: Ptr<Prototype>,
}

impl ScriptFrame {
    /// The stack position of the activation's first register
    ///
    /// Fixed parameters always start at the base, for variadic functions the extra arguments are
    /// below it.
    pub fn base(&self) -> usize {
        self.base
    }

    /// The prototype of the function being executed
    pub fn prototype(&self) -> &Ptr<Prototype> {
        &self.prototype
    }

    /// The position of the next instruction to be executed
    pub fn pc(&self) -> usize {
        self.saved_pc
    }

    /// Fetches the next instruction and advances the program counter
    pub fn step(&mut self) -> Option<Instruction> {
        let instruction = self.prototype.code.get(self.saved_pc).copied()?;
        self.saved_pc += 1;
        Some(instruction)
    }

    /// Skips over the next instruction
    pub fn skip(&mut self) {
        self.saved_pc += 1;
    }

    /// Moves the program counter by the given offset
    pub fn jump(&mut self, offset: isize) {
        self.saved_pc = self.saved_pc.saturating_add_signed(offset);
    }

    /// The stack index of the given register
    pub fn stack_index(&self, register: usize) -> usize {
        self.base + register
    }

    /// The most recently fetched instruction
    pub fn previous_instruction(&self) -> Option<Instruction> {
        let pc = self.saved_pc.checked_sub(1)?;
        self.prototype.code.get(pc).copied()
    }

    /// The source line of the most recently fetched instruction
    pub fn current_line(&self) -> Option<u32> {
        self.prototype.line_at(self.saved_pc.checked_sub(1)?)
    }

    pub(crate) fn saved_pc(&self) -> usize {
        self.saved_pc
    }

    pub(crate) fn set_saved_pc(&mut self, pc: usize) {
        self.saved_pc = pc;
    }

    pub(crate) fn relocate(&mut self, base: usize, prototype: Ptr<Prototype>, saved_pc: usize) {
        self.base = base;
        self.prototype = prototype;
        self.saved_pc = saved_pc;
    }
}

/// The state of a native function's call
#[derive(Clone, Debug, Default)]
pub struct NativeFrame {
    pub(crate) context: i32,
    pub(crate) continuation: Option<NativeFunction>,
}

impl NativeFrame {
    /// The context value that was provided with the frame's continuation
    pub fn context(&self) -> i32 {
        self.context
    }

    /// Returns true if a continuation has been provided for the frame
    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }
}

/// The chain of call frames in a thread, indexed by depth
///
/// Frames above the current depth stay allocated and are overwritten by later calls.
pub(crate) struct FrameChain {
    frames: Vec<CallFrame>,
    depth: usize,
}

impl FrameChain {
    pub fn new(base: CallFrame) -> Self {
        Self {
            frames: vec![base],
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The number of frames that have been allocated, including inactive frames
    pub fn allocated(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.depth += 1;
        if let Some(slot) = self.frames.get_mut(self.depth) {
            *slot = frame;
        } else {
            self.frames.push(frame);
        }
    }

    pub fn pop(&mut self) {
        assert!(self.depth > 0, "attempt to pop the base frame");
        self.depth -= 1;
    }

    pub fn truncate(&mut self, depth: usize) {
        self.depth = self.depth.min(depth);
    }

    pub fn current(&self) -> &CallFrame {
        &self.frames[self.depth]
    }

    pub fn current_mut(&mut self) -> &mut CallFrame {
        &mut self.frames[self.depth]
    }

    pub fn previous(&self) -> Option<&CallFrame> {
        self.depth.checked_sub(1).and_then(|depth| self.get(depth))
    }

    pub fn get(&self, depth: usize) -> Option<&CallFrame> {
        if depth <= self.depth {
            self.frames.get(depth)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, depth: usize) -> Option<&mut CallFrame> {
        if depth <= self.depth {
            self.frames.get_mut(depth)
        } else {
            None
        }
    }

    /// The active frames, from the base frame up to the current frame
    pub fn active(&self) -> &[CallFrame] {
        &self.frames[..=self.depth]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prototype(max_stack_size: usize) -> Ptr<Prototype> {
        Prototype {
            max_stack_size,
            ..Default::default()
        }
        .into()
    }

    #[test]
    fn frames_are_reused_after_popping() {
        let mut chain = FrameChain::new(CallFrame::native(0, 21, ResultCount::All));

        chain.push(CallFrame::script(1, 2, ResultCount::All, prototype(4)));
        chain.push(CallFrame::native(6, 26, ResultCount::Exact(1)));
        assert_eq!(chain.depth(), 2);
        assert_eq!(chain.allocated(), 3);

        chain.pop();
        chain.pop();
        chain.push(CallFrame::native(1, 21, ResultCount::Exact(0)));

        assert_eq!(chain.depth(), 1);
        assert_eq!(chain.allocated(), 3);
        assert!(!chain.current().status().is_script());
        assert!(chain.get(2).is_none());
    }

    #[test]
    fn script_frame_window() {
        let frame = CallFrame::script(3, 5, ResultCount::All, prototype(4));

        assert_eq!(frame.window(), Some(5..9));
        assert_eq!(frame.frame_index(6), 1);
    }

    #[test]
    #[should_panic]
    fn frame_index_outside_of_window() {
        let frame = CallFrame::script(3, 5, ResultCount::All, prototype(4));
        frame.frame_index(9);
    }

    #[test]
    fn call_status_flags() {
        let mut status = CallStatus::script();
        status.set_fresh(true);
        status.set_hooked(true);
        status.set_hooked(false);

        assert!(status.is_script());
        assert!(status.is_fresh());
        assert!(!status.is_hooked());
        assert!(!status.is_tail_call());
    }
}
