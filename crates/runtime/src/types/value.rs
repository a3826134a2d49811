//! The core value type used in the Wisp runtime

use super::number::number_to_string;
use crate::{Closure, TableRef, UserData, prelude::*};
use std::fmt;

/// The core Value type for Wisp
#[derive(Clone, Default)]
pub enum Value {
    /// The default type representing the absence of a value
    #[default]
    Nil,

    /// A boolean, can be either true or false
    Bool(bool),

    /// A double-precision floating point number
    Number(f64),

    /// An immutable string
    Str(Ptr<str>),

    /// A shared reference to a table
    Table(TableRef),

    /// A script closure or a native closure
    Function(Closure),

    /// A shared reference to data provided by the host
    UserData(PtrMut<UserData>),
}

impl Value {
    /// Returns the value's type
    pub fn value_type(&self) -> ValueType {
        use Value::*;
        match self {
            Nil => ValueType::Nil,
            Bool(_) => ValueType::Bool,
            Number(_) => ValueType::Number,
            Str(_) => ValueType::Str,
            Table(_) => ValueType::Table,
            Function(_) => ValueType::Function,
            UserData(_) => ValueType::UserData,
        }
    }

    /// Returns the name of the value's type, as used in error messages
    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Returns true if the value is `nil` or `false`
    pub fn is_falsy(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Returns true if the value is `nil`
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Compares two values without invoking any tag methods
    ///
    /// Numbers, booleans and strings are compared by value, everything else by identity.
    pub fn raw_equals(&self, other: &Value) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bool(a), Bool(b)) => a == b,
            (Number(a), Number(b)) => a == b,
            (Str(a), Str(b)) => **a == **b,
            (Table(a), Table(b)) => Ptr::ptr_eq(a, b),
            (Function(a), Function(b)) => a.ptr_eq(b),
            (UserData(a), UserData(b)) => Ptr::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Returns the address of reference values, `None` for values that are copied
    pub fn address(&self) -> Option<Address> {
        use Value::*;
        match self {
            Table(t) => Some(Ptr::address(t)),
            Function(f) => Some(f.address()),
            UserData(u) => Some(Ptr::address(u)),
            Nil | Bool(_) | Number(_) | Str(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Value::*;
        match self {
            Nil => f.write_str("nil"),
            Bool(b) => write!(f, "{b}"),
            Number(n) => f.write_str(&number_to_string(*n)),
            Str(s) => f.write_str(s),
            Table(t) => write!(f, "table: {}", Ptr::address(t)),
            Function(function) => write!(f, "function: {}", function.address()),
            UserData(u) => write!(f, "userdata: {}", Ptr::address(u)),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", &**s),
            other => fmt::Display::fmt(other, f),
        }
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Self::Nil
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

impl From<Ptr<str>> for Value {
    fn from(value: Ptr<str>) -> Self {
        Self::Str(value)
    }
}

impl From<TableRef> for Value {
    fn from(value: TableRef) -> Self {
        Self::Table(value)
    }
}

impl From<Closure> for Value {
    fn from(value: Closure) -> Self {
        Self::Function(value)
    }
}

impl From<PtrMut<UserData>> for Value {
    fn from(value: PtrMut<UserData>) -> Self {
        Self::UserData(value)
    }
}

/// The type of a [Value]
///
/// Values without their own metatable look up tag methods via per-type metatables,
/// see [Vm::set_type_metatable].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ValueType {
    Nil,
    Bool,
    Number,
    Str,
    Table,
    Function,
    UserData,
}

impl ValueType {
    /// The name of the type
    pub fn name(self) -> &'static str {
        use ValueType::*;
        match self {
            Nil => "nil",
            Bool => "boolean",
            Number => "number",
            Str => "string",
            Table => "table",
            Function => "function",
            UserData => "userdata",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
