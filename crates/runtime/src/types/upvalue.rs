use crate::prelude::*;
use std::fmt;

/// A variable captured by a script closure
///
/// While the captured local is still in scope the upvalue is *open*, reading and writing through
/// to the local's stack slot. When the local goes out of scope the upvalue is *closed*, taking
/// ownership of the slot's value. A closed upvalue never reopens.
///
/// Cloning an upvalue produces another reference to the same cell, closures that capture the same
/// local share a single cell.
#[derive(Clone)]
pub struct Upvalue(PtrMut<UpvalueState>);

enum UpvalueState {
    Open {
        // The slots of the thread that owns the captured local
        slots: WeakMut<Vec<Value>>,
        index: usize,
    },
    Closed(Value),
}

impl Upvalue {
    pub(crate) fn open(slots: WeakMut<Vec<Value>>, index: usize) -> Self {
        Self(UpvalueState::Open { slots, index }.into())
    }

    /// Makes a closed upvalue containing the given value
    pub fn closed(value: Value) -> Self {
        Self(UpvalueState::Closed(value).into())
    }

    /// Returns the upvalue's current value
    pub fn get(&self) -> Value {
        match &*self.0.borrow() {
            UpvalueState::Open { slots, index } => {
                let Some(slots) = slots.upgrade() else {
                    return Value::Nil;
                };
                let value = slots.borrow().get(*index).cloned().unwrap_or_default();
                value
            }
            UpvalueState::Closed(value) => value.clone(),
        }
    }

    /// Assigns a new value to the upvalue
    pub fn set(&self, value: Value) {
        match &mut *self.0.borrow_mut() {
            UpvalueState::Open { slots, index } => {
                if let Some(slots) = slots.upgrade() {
                    if let Some(slot) = slots.borrow_mut().get_mut(*index) {
                        *slot = value;
                    }
                }
            }
            UpvalueState::Closed(closed) => *closed = value,
        }
    }

    /// Copies the captured slot's value into the upvalue
    ///
    /// Panics if the upvalue has already been closed.
    pub(crate) fn close(&self) {
        let mut state = self.0.borrow_mut();
        let value = match &*state {
            UpvalueState::Open { slots, index } => match slots.upgrade() {
                Some(slots) => {
                    let value = slots.borrow().get(*index).cloned().unwrap_or_default();
                    value
                }
                None => Value::Nil,
            },
            UpvalueState::Closed(_) => panic!("attempt to close an already-closed upvalue"),
        };
        *state = UpvalueState::Closed(value);
    }

    /// Returns true if the upvalue still refers to a stack slot
    pub fn is_open(&self) -> bool {
        matches!(&*self.0.borrow(), UpvalueState::Open { .. })
    }

    /// Returns the index of the captured stack slot while the upvalue is open
    pub fn stack_index(&self) -> Option<usize> {
        match &*self.0.borrow() {
            UpvalueState::Open { index, .. } => Some(*index),
            UpvalueState::Closed(_) => None,
        }
    }

    /// Returns true if the upvalue is open and captures the given slot of the given stack
    pub(crate) fn is_open_at(&self, slots: &PtrMut<Vec<Value>>, stack_index: usize) -> bool {
        match &*self.0.borrow() {
            UpvalueState::Open { slots: s, index } => *index == stack_index && s.points_to(slots),
            UpvalueState::Closed(_) => false,
        }
    }

    /// Returns true if the two upvalues are the same cell
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Ptr::ptr_eq(&a.0, &b.0)
    }
}

impl fmt::Debug for Upvalue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0.borrow() {
            UpvalueState::Open { index, .. } => write!(f, "Upvalue(open: {index})"),
            UpvalueState::Closed(value) => write!(f, "Upvalue(closed: {value:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_upvalues_read_and_write_through_to_the_stack() {
        let slots = PtrMut::from(vec![Value::Nil, Value::from(1)]);
        let upvalue = Upvalue::open(Ptr::downgrade(&slots), 1);

        assert!(upvalue.get().raw_equals(&Value::from(1)));
        upvalue.set(Value::from(2));
        assert!(slots.borrow()[1].raw_equals(&Value::from(2)));
        assert!(upvalue.is_open_at(&slots, 1));
        assert!(!upvalue.is_open_at(&slots, 0));
    }

    #[test]
    fn closing_copies_the_value() {
        let slots = PtrMut::from(vec![Value::from(42)]);
        let upvalue = Upvalue::open(Ptr::downgrade(&slots), 0);

        upvalue.close();
        slots.borrow_mut()[0] = Value::from(99);

        assert!(!upvalue.is_open());
        assert!(upvalue.get().raw_equals(&Value::from(42)));
    }

    #[test]
    #[should_panic(expected = "already-closed")]
    fn closing_twice_panics() {
        let upvalue = Upvalue::closed(Value::Nil);
        upvalue.close();
    }
}
