use crate::{CallFrame, Result, ScriptFrame, Vm, prelude::*};
use std::ops::BitOr;

/// A trait for debug hooks
///
/// A hook is called with the VM and a description of the event that triggered it. While the hook
/// runs it has [VmSettings::min_stack](crate::VmSettings::min_stack) free stack slots available,
/// hooks can't trigger nested hooks, and the thread can't be suspended.
pub trait Hook: Fn(&mut Vm, &DebugInfo) -> Result<()> + WispSend + WispSync + 'static {}

impl<T> Hook for T where T: Fn(&mut Vm, &DebugInfo) -> Result<()> + WispSend + WispSync + 'static {}

/// The events that trigger a debug hook
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookEvent {
    /// A function is being called
    Call,
    /// A function is about to return
    Return,
    /// The bytecode loop is starting a new line
    Line,
    /// The configured number of instructions has been executed
    Count,
    /// A function is being called as a tail call
    TailCall,
}

/// A set of [HookEvent]s that a debug hook should be called for
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct HookMask(u8);

impl HookMask {
    /// Call and tail call events
    pub const CALL: Self = Self(1 << 0);
    /// Return events
    pub const RETURN: Self = Self(1 << 1);
    /// Line events
    pub const LINE: Self = Self(1 << 2);
    /// Count events
    pub const COUNT: Self = Self(1 << 3);

    /// Returns true if all of the events in `other` are in the mask
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if any of the events in `other` are in the mask
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns true if the mask doesn't contain any events
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for HookMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::fmt::Debug for HookMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = [
            (Self::CALL, "call"),
            (Self::RETURN, "return"),
            (Self::LINE, "line"),
            (Self::COUNT, "count"),
        ];
        f.debug_set()
            .entries(
                events
                    .iter()
                    .filter(|(event, _)| self.contains(*event))
                    .map(|(_, name)| name),
            )
            .finish()
    }
}

/// The information provided to a debug hook
#[derive(Clone, Debug)]
pub struct DebugInfo {
    /// The event that triggered the hook
    pub event: HookEvent,
    /// The line being executed, if known
    pub current_line: Option<u32>,
    /// The depth of the frame that the event refers to, see [Vm::frame]
    pub depth: usize,
}

impl Vm {
    /// Installs a debug hook
    ///
    /// The hook is called for the events in `mask`, and if `mask` contains [HookMask::COUNT] then
    /// the hook is called after every `count` instructions. Count events are ignored when `count`
    /// is zero.
    pub fn set_hook(&mut self, hook: impl Hook, mask: HookMask, count: usize) {
        // A zero count disables count events
        let mask = if count == 0 {
            HookMask(mask.0 & !HookMask::COUNT.0)
        } else {
            mask
        };
        if mask.is_empty() {
            self.clear_hook();
            return;
        }

        if let Some(frame) = self.frames.current().as_script() {
            self.old_pc = frame.saved_pc();
        }
        let hook: Ptr<dyn Hook> = make_ptr!(hook);
        self.hook = Some(hook);
        self.hook_mask = mask;
        self.base_hook_count = count;
        self.reset_hook_count();
    }

    /// Removes the debug hook
    pub fn clear_hook(&mut self) {
        self.hook = None;
        self.hook_mask = HookMask::default();
        self.base_hook_count = 0;
        self.reset_hook_count();
    }

    /// The events that the debug hook is called for
    pub fn hook_mask(&self) -> HookMask {
        self.hook_mask
    }

    /// Restarts the count used for [HookEvent::Count] events
    pub fn reset_hook_count(&mut self) {
        self.hook_count = self.base_hook_count;
    }

    /// Calls the debug hook for the current frame
    ///
    /// `line` should be provided for [HookEvent::Line] events, otherwise the line is taken from
    /// the current frame.
    ///
    /// The hook is skipped when no hook is installed or when a hook is already running. The stack
    /// top, the frame's top, and the frame's status are restored after the hook has been called.
    pub fn hook(&mut self, event: HookEvent, line: Option<u32>) -> Result<()> {
        let Some(hook) = self.hook.clone() else {
            return Ok(());
        };
        if !self.allow_hook {
            return Ok(());
        }

        let min_stack = self.settings().min_stack;
        let top = self.stack.top();
        let depth = self.frames.depth();
        let frame_top = self.frames.current().top;
        self.check_stack(min_stack)?;

        let frame = self.frames.current_mut();
        frame.top = top + min_stack;
        frame.status.set_hooked(true);
        debug_assert!(frame.top <= self.stack.last());

        let info = DebugInfo {
            event,
            current_line: line.or_else(|| frame.current_line()),
            depth,
        };

        self.allow_hook = false;
        self.non_suspendable += 1;

        let result = hook(self, &info);

        self.non_suspendable -= 1;
        self.allow_hook = true;
        if let Some(frame) = self.frames.get_mut(depth) {
            frame.top = frame_top;
            frame.status.set_hooked(false);
        }
        self.stack.set_top(top);

        result
    }

    /// Calls the hook for a newly pushed script frame
    ///
    /// If the calling instruction was a tail call then the frame is marked as a tail call, and a
    /// [HookEvent::TailCall] event is used.
    pub(crate) fn call_hook(&mut self) -> Result<()> {
        let tail_call = self
            .frames
            .previous()
            .and_then(CallFrame::as_script)
            .and_then(ScriptFrame::previous_instruction)
            .is_some_and(|instruction| instruction.is_tail_call());

        let frame = self.frames.current_mut();
        let event = if tail_call {
            frame.status.set_tail_call(true);
            HookEvent::TailCall
        } else {
            HookEvent::Call
        };

        // Hooks see the frame as though its first instruction has been fetched
        let depth = self.frames.depth();
        self.step_saved_pc(depth, 1);
        let result = self.hook(event, None);
        self.step_saved_pc(depth, -1);
        result
    }

    fn step_saved_pc(&mut self, depth: usize, offset: isize) {
        if let Some(frame) = self.frames.get_mut(depth).and_then(CallFrame::as_script_mut) {
            frame.jump(offset);
        }
    }

    /// Calls the hook for count and line events
    ///
    /// This should be called by the bytecode loop after fetching an instruction, when the hook
    /// mask contains [HookMask::LINE] or [HookMask::COUNT].
    ///
    /// A line event is triggered when entering a function, when jumping backwards, or when the
    /// instruction is on a different line to the previously traced instruction.
    pub fn trace_execution(&mut self) -> Result<()> {
        let mask = self.hook_mask;
        if !mask.intersects(HookMask::LINE | HookMask::COUNT) {
            return Ok(());
        }

        let count_hook = if mask.contains(HookMask::COUNT) {
            self.hook_count = self.hook_count.saturating_sub(1);
            if self.hook_count == 0 {
                self.reset_hook_count();
                true
            } else {
                false
            }
        } else {
            false
        };

        if count_hook {
            self.hook(HookEvent::Count, None)?;
        }

        let Some(frame) = self.frames.current().as_script() else {
            return Ok(());
        };
        let saved_pc = frame.saved_pc();

        if mask.contains(HookMask::LINE) {
            let prototype = frame.prototype().clone();
            let pc = saved_pc.saturating_sub(1);
            let new_line = prototype.line_at(pc);
            let old_line = self
                .old_pc
                .checked_sub(1)
                .and_then(|old_pc| prototype.line_at(old_pc));

            if pc == 0 || saved_pc <= self.old_pc || new_line != old_line {
                self.hook(HookEvent::Line, new_line)?;
            }
        }

        self.old_pc = saved_pc;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_operations() {
        let mask = HookMask::CALL | HookMask::LINE;

        assert!(mask.contains(HookMask::CALL));
        assert!(!mask.contains(HookMask::CALL | HookMask::RETURN));
        assert!(mask.intersects(HookMask::RETURN | HookMask::LINE));
        assert!(!mask.intersects(HookMask::RETURN | HookMask::COUNT));
        assert!(HookMask::default().is_empty());
    }
}
