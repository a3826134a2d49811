use std::ops::{Deref, DerefMut};

use crate::{
    Ptr,
    ptr_impl::{BorrowImpl, BorrowMutImpl, CellImpl, borrow, borrow_mut},
};

/// Makes a [PtrMut], allowing the value to be cast to a trait object
///
/// See [make_ptr](crate::make_ptr).
#[macro_export]
macro_rules! make_ptr_mut {
    ($value:expr) => {
        $crate::make_ptr!($crate::WispCell::from($value))
    };
}

/// A shared pointer to a value that can be modified through [WispCell::borrow_mut]
pub type PtrMut<T> = Ptr<WispCell<T>>;

impl<T> From<T> for PtrMut<T> {
    fn from(value: T) -> Self {
        Ptr::from(WispCell::from(value))
    }
}

/// A cell that checks its borrows at runtime
///
/// With the `rc` feature a conflicting borrow panics, with `arc` it blocks until the other
/// borrow is released.
#[derive(Debug, Default)]
pub struct WispCell<T: ?Sized>(CellImpl<T>);

impl<T> From<T> for WispCell<T> {
    fn from(value: T) -> Self {
        Self(CellImpl::from(value))
    }
}

impl<T: ?Sized> WispCell<T> {
    /// Borrows the value immutably, any number of immutable borrows can be held at once
    pub fn borrow(&self) -> Borrow<'_, T> {
        Borrow(borrow(&self.0))
    }

    /// Borrows the value mutably
    pub fn borrow_mut(&self) -> BorrowMut<'_, T> {
        BorrowMut(borrow_mut(&self.0))
    }
}

/// An immutable borrow of a [WispCell]'s value
pub struct Borrow<'a, T: ?Sized>(BorrowImpl<'a, T>);

impl<T: ?Sized> Deref for Borrow<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

/// A mutable borrow of a [WispCell]'s value
pub struct BorrowMut<'a, T: ?Sized>(BorrowMutImpl<'a, T>);

impl<T: ?Sized> Deref for BorrowMut<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> DerefMut for BorrowMut<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
