use crate::{Closure, Prototype, Result, ScriptClosure, Upvalue, Vm, prelude::*};
use tracing::trace;

/// The registry of a thread's open upvalues
///
/// Entries are sorted by stack index, so that closing all upvalues above a level only needs to
/// visit the upvalues being closed, starting from the highest index.
#[derive(Default)]
pub(crate) struct OpenUpvalues {
    entries: Vec<(usize, Upvalue)>,
}

impl OpenUpvalues {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn position(&self, stack_index: usize) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by_key(&stack_index, |(index, _)| *index)
    }

    pub fn find(&self, stack_index: usize) -> Option<&Upvalue> {
        self.position(stack_index)
            .ok()
            .map(|position| &self.entries[position].1)
    }

    pub fn find_or_insert(
        &mut self,
        stack_index: usize,
        make_upvalue: impl FnOnce() -> Upvalue,
    ) -> Upvalue {
        match self.position(stack_index) {
            Ok(position) => self.entries[position].1.clone(),
            Err(position) => {
                let upvalue = make_upvalue();
                self.entries
                    .insert(position, (stack_index, upvalue.clone()));
                upvalue
            }
        }
    }

    /// Closes and removes every upvalue with a stack index at or above the given level
    ///
    /// Returns the number of upvalues that were closed.
    pub fn close_from(&mut self, level: usize) -> usize {
        let mut closed = 0;
        while let Some((index, upvalue)) = self.entries.last() {
            if *index < level {
                break;
            }
            upvalue.close();
            self.entries.pop();
            closed += 1;
        }
        closed
    }

    /// The open upvalues, from the highest stack index to the lowest
    pub fn iter(&self) -> impl Iterator<Item = &Upvalue> {
        self.entries.iter().rev().map(|(_, upvalue)| upvalue)
    }
}

impl Vm {
    /// Returns the open upvalue for the given stack slot, creating it if necessary
    ///
    /// Closures that capture the same slot share the same upvalue.
    pub fn find_upvalue(&mut self, stack_index: usize) -> Upvalue {
        let slots = self.stack.handle();
        self.open_upvalues
            .find_or_insert(stack_index, || Upvalue::open(slots, stack_index))
    }

    /// Closes all open upvalues that capture slots at or above the given level
    pub fn close_upvalues(&mut self, level: usize) {
        let closed = self.open_upvalues.close_from(level);
        if closed > 0 {
            trace!(level, closed, "closed upvalues");
        }
    }

    /// The number of open upvalues in the thread
    pub fn open_upvalue_count(&self) -> usize {
        self.open_upvalues.len()
    }

    /// Returns the thread's open upvalues, ordered from the highest stack index to the lowest
    pub fn open_upvalues(&self) -> impl Iterator<Item = &Upvalue> {
        self.open_upvalues.iter()
    }

    /// Instantiates a closure from a prototype
    ///
    /// `enclosing` are the upvalues of the running closure, and `base` is the base of its frame.
    /// Upvalues that capture locals are bound to `base + index`, inherited upvalues are shared.
    ///
    /// If the closure that was last created from the prototype has identical bindings then it's
    /// returned instead of making a new one.
    pub fn instantiate(
        &mut self,
        prototype: &Ptr<Prototype>,
        enclosing: &[Upvalue],
        base: usize,
    ) -> Result<Closure> {
        let closure = match self.cached_closure(prototype, enclosing, base) {
            Some(cached) => cached,
            None => self.new_closure(prototype, enclosing, base)?,
        };
        Ok(Closure::Script(closure))
    }

    /// Makes a new closure from a prototype, and caches it in the prototype
    pub fn new_closure(
        &mut self,
        prototype: &Ptr<Prototype>,
        enclosing: &[Upvalue],
        base: usize,
    ) -> Result<Ptr<ScriptClosure>> {
        let max_upvalues = self.settings().max_upvalues;
        if prototype.upvalues.len() > max_upvalues {
            return runtime_error!("too many upvalues (limit is {max_upvalues})");
        }

        let upvalues = prototype
            .upvalues
            .iter()
            .map(|descriptor| {
                if descriptor.in_stack {
                    Ok(self.find_upvalue(base + descriptor.index))
                } else {
                    match enclosing.get(descriptor.index) {
                        Some(upvalue) => Ok(upvalue.clone()),
                        None => runtime_error!(
                            "invalid upvalue index {} for '{}'",
                            descriptor.index,
                            descriptor.name
                        ),
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let closure = Ptr::from(ScriptClosure::new(prototype.clone(), upvalues));
        prototype.cache.set(&closure);
        Ok(closure)
    }

    /// Returns the prototype's cached closure if its upvalues match the bindings that would be
    /// made by [Vm::new_closure]
    pub fn cached_closure(
        &self,
        prototype: &Prototype,
        enclosing: &[Upvalue],
        base: usize,
    ) -> Option<Ptr<ScriptClosure>> {
        let cached = prototype.cache.get()?;
        let slots = self.stack.slots();

        let bindings_match = prototype
            .upvalues
            .iter()
            .zip(cached.upvalues())
            .all(|(descriptor, upvalue)| {
                if descriptor.in_stack {
                    upvalue.is_open_at(slots, base + descriptor.index)
                } else {
                    enclosing
                        .get(descriptor.index)
                        .is_some_and(|enclosing| Upvalue::ptr_eq(enclosing, upvalue))
                }
            });

        bindings_match.then_some(cached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_upvalue(slots: &PtrMut<Vec<Value>>, index: usize) -> Upvalue {
        Upvalue::open(Ptr::downgrade(slots), index)
    }

    #[test]
    fn registry_is_ordered_by_stack_index() {
        let slots = PtrMut::from(vec![Value::Nil; 10]);
        let mut registry = OpenUpvalues::default();

        for index in [5, 1, 8, 3] {
            registry.find_or_insert(index, || open_upvalue(&slots, index));
        }

        let indices: Vec<_> = registry.iter().filter_map(Upvalue::stack_index).collect();
        assert_eq!(indices, [8, 5, 3, 1]);
    }

    #[test]
    fn existing_upvalues_are_shared() {
        let slots = PtrMut::from(vec![Value::Nil; 10]);
        let mut registry = OpenUpvalues::default();

        let a = registry.find_or_insert(4, || open_upvalue(&slots, 4));
        let b = registry.find_or_insert(4, || open_upvalue(&slots, 4));

        assert!(Upvalue::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn closing_from_a_level() {
        let slots = PtrMut::from(vec![Value::Nil; 10]);
        let mut registry = OpenUpvalues::default();
        let upvalues: Vec<_> = [2, 4, 6]
            .into_iter()
            .map(|index| registry.find_or_insert(index, || open_upvalue(&slots, index)))
            .collect();

        assert_eq!(registry.close_from(4), 2);
        assert!(upvalues[0].is_open());
        assert!(!upvalues[1].is_open());
        assert!(!upvalues[2].is_open());
        assert!(registry.find(2).is_some());
        assert!(registry.find(4).is_none());

        // Closing again at the same level has nothing left to close
        assert_eq!(registry.close_from(4), 0);
    }
}
