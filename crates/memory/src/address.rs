use std::fmt;

/// The address of an allocation, used for identity comparisons and display
///
/// Values like tables and closures are displayed by address (e.g. `table: 0x55d0c2a3b2f0`),
/// and the address is also used to hash values by identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(usize);

impl<T: ?Sized> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Self(pointer as *const u8 as usize)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
