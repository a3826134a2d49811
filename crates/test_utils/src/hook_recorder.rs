use wisp_runtime::{DebugInfo, HookEvent, HookMask, PtrMut, Result, Vm, make_ptr_mut};

/// A debug hook invocation captured by a [HookRecorder]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookRecord {
    /// The event that triggered the hook
    pub event: HookEvent,
    /// The line reported to the hook
    pub line: Option<u32>,
    /// The depth of the frame that was current when the hook was called
    pub depth: usize,
    /// The stack top seen by the hook
    pub top: usize,
}

/// Captures the events seen by a debug hook
#[derive(Clone, Debug)]
pub struct HookRecorder {
    records: PtrMut<Vec<HookRecord>>,
}

impl Default for HookRecorder {
    fn default() -> Self {
        Self {
            records: make_ptr_mut!(Vec::new()),
        }
    }
}

impl HookRecorder {
    /// Installs a hook in the VM that records into this recorder
    pub fn install(&self, vm: &mut Vm, mask: HookMask, count: usize) {
        let records = self.records.clone();
        vm.set_hook(
            move |vm: &mut Vm, info: &DebugInfo| -> Result<()> {
                records.borrow_mut().push(HookRecord {
                    event: info.event,
                    line: info.current_line,
                    depth: info.depth,
                    top: vm.top(),
                });
                Ok(())
            },
            mask,
            count,
        );
    }

    /// Returns the records captured so far
    pub fn records(&self) -> Vec<HookRecord> {
        self.records.borrow().clone()
    }

    /// Returns the events captured so far
    pub fn events(&self) -> Vec<HookEvent> {
        self.records.borrow().iter().map(|record| record.event).collect()
    }

    /// Clears the captured records
    pub fn clear(&self) {
        self.records.borrow_mut().clear();
    }
}
