use crate::prelude::*;
use std::{any::Any, fmt};

/// A trait for data that can be stored in a [UserData] value
///
/// Implemented automatically for all suitable types.
pub trait UserDataValue: Any + WispSend + WispSync {
    /// Returns a reference to the data as `Any`, allowing it to be downcast
    fn as_any(&self) -> &dyn Any;
    /// Returns a mutable reference to the data as `Any`, allowing it to be downcast
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + WispSend + WispSync> UserDataValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Host data that can be stored in a [Value]
///
/// User data values have their own optional metatable, e.g. a `__call` tag method makes the value
/// callable.
pub struct UserData {
    data: Box<dyn UserDataValue>,
    /// The user data's metatable
    pub metatable: Option<TableRef>,
}

impl UserData {
    /// Wraps the given data
    pub fn new(data: impl UserDataValue) -> Self {
        Self {
            data: Box::new(data),
            metatable: None,
        }
    }

    /// Wraps the given data, with a metatable
    pub fn with_metatable(data: impl UserDataValue, metatable: TableRef) -> Self {
        Self {
            data: Box::new(data),
            metatable: Some(metatable),
        }
    }

    /// Returns a reference to the data if it has the given type
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        (*self.data).as_any().downcast_ref()
    }

    /// Returns a mutable reference to the data if it has the given type
    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        (*self.data).as_any_mut().downcast_mut()
    }

    /// Returns true if the data has the given type
    pub fn is<T: Any>(&self) -> bool {
        (*self.data).as_any().is::<T>()
    }
}

impl fmt::Debug for UserData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserData")
            .field("has_metatable", &self.metatable.is_some())
            .finish_non_exhaustive()
    }
}
