use std::fmt;

use crate::{Ptr, WispCell, ptr_impl::WeakImpl};

/// A non-owning pointer to a value in allocated memory
///
/// A `Weak` doesn't keep its value alive, [Weak::upgrade] returns `None` once all [Ptr]s to the
/// value have been dropped.
pub struct Weak<T: ?Sized>(pub(crate) WeakImpl<T>);

/// A non-owning pointer to a mutable value, see [crate::PtrMut]
pub type WeakMut<T> = Weak<WispCell<T>>;

impl<T: ?Sized> Weak<T> {
    /// Attempts to get a strong pointer to the value
    pub fn upgrade(&self) -> Option<Ptr<T>> {
        self.0.upgrade().map(Ptr)
    }

    /// Returns true if the weak pointer refers to the same allocation as the given [Ptr]
    pub fn points_to(&self, ptr: &Ptr<T>) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), Ptr::address_ptr(ptr))
    }

    /// Returns true if the two weak pointers refer to the same allocation
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.0.ptr_eq(&other.0)
    }
}

impl<T: ?Sized> Ptr<T> {
    pub(crate) fn address_ptr(this: &Self) -> *const T {
        crate::ptr_impl::PtrImpl::as_ptr(&this.0)
    }
}

impl<T: ?Sized> Clone for Weak<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ?Sized> fmt::Debug for Weak<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(Weak)")
    }
}
