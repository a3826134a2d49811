use crate::prelude::*;
use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::{fmt, hash::BuildHasherDefault};

/// The hasher used throughout the Wisp runtime
pub type WispHasher = FxHasher;

type TableFields = IndexMap<String, Value, BuildHasherDefault<WispHasher>>;

/// A shared reference to a [Table]
pub type TableRef = PtrMut<Table>;

/// A minimal string-keyed table
///
/// The runtime only reads tables when looking up tag methods in metatables,
/// so fields are keyed by name.
#[derive(Clone, Default)]
pub struct Table {
    fields: TableFields,
    metatable: Option<TableRef>,
}

impl Table {
    /// Creates an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value associated with the key, if it's not nil
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Associates a value with a key
    ///
    /// Setting a field to nil removes it.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if value.is_nil() {
            self.fields.shift_remove(&key);
        } else {
            self.fields.insert(key, value);
        }
    }

    /// The number of non-nil fields in the table
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the table has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the table's metatable
    pub fn metatable(&self) -> Option<&TableRef> {
        self.metatable.as_ref()
    }

    /// Sets or clears the table's metatable
    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Table {
    fn from_iter<T: IntoIterator<Item = (K, Value)>>(iter: T) -> Self {
        let mut result = Self::new();
        for (key, value) in iter {
            result.set(key, value);
        }
        result
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("fields", &self.fields.len())
            .field("has_metatable", &self.metatable.is_some())
            .finish()
    }
}

/// The operations that can be overridden in a metatable
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum TagMethod {
    Index,
    NewIndex,
    Gc,
    Mode,
    Len,
    Eq,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    Lt,
    Le,
    Concat,
    Call,
}

impl TagMethod {
    /// The key used for the tag method in a metatable
    pub fn name(self) -> &'static str {
        use TagMethod::*;
        match self {
            Index => "__index",
            NewIndex => "__newindex",
            Gc => "__gc",
            Mode => "__mode",
            Len => "__len",
            Eq => "__eq",
            Add => "__add",
            Sub => "__sub",
            Mul => "__mul",
            Div => "__div",
            Mod => "__mod",
            Pow => "__pow",
            Unm => "__unm",
            Lt => "__lt",
            Le => "__le",
            Concat => "__concat",
            Call => "__call",
        }
    }
}

impl fmt::Display for TagMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_nil_removes_a_field() {
        let mut table = Table::from_iter([("a", Value::from(1)), ("b", Value::from(2))]);
        assert_eq!(table.len(), 2);

        table.set("a", Value::Nil);
        assert!(table.get("a").is_none());
        assert_eq!(table.len(), 1);
    }
}
