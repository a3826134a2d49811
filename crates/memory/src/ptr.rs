use std::{fmt, ops::Deref};

use crate::{Address, Weak, ptr_impl::PtrImpl};

/// Makes a Ptr, with support for casting to trait objects
///
/// Although `Ptr::from` can be used, the challenge comes when a trait object needs to be used as
/// the pointee type. Until the `CoerceUnized` trait is stabilized, casting from a concrete type to
/// `dyn Trait` needs to be performed on the inner pointer. This macro encapsulates the casting to
/// make life easier at the call site.
#[macro_export]
macro_rules! make_ptr {
    ($value:expr) => {
        $crate::__make_ptr!($value)
    };
}

/// An immutable pointer to a value in allocated memory
#[derive(Debug, Default)]
pub struct Ptr<T: ?Sized>(pub(crate) PtrImpl<T>);

impl<T> From<T> for Ptr<T> {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

impl<T: ?Sized> From<Box<T>> for Ptr<T> {
    fn from(boxed: Box<T>) -> Self {
        Self(boxed.into())
    }
}

impl<T: ?Sized> From<PtrImpl<T>> for Ptr<T> {
    fn from(inner: PtrImpl<T>) -> Self {
        Self(inner)
    }
}

impl<T: ?Sized> Ptr<T> {
    /// Returns true if the two `Ptr`s point to the same allocation
    ///
    /// See also: [`Rc::ptr_eq`] or [`Arc::ptr_eq`]
    ///
    /// [`Rc::ptr_eq`]: std::rc::Rc::ptr_eq
    /// [`Arc::ptr_eq`]: std::sync::Arc::ptr_eq
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        PtrImpl::ptr_eq(&this.0, &other.0)
    }

    /// Returns the address of the allocated memory
    pub fn address(this: &Self) -> Address {
        PtrImpl::as_ptr(&this.0).into()
    }

    /// Returns the number of strong references to the allocated memory
    pub fn ref_count(this: &Self) -> usize {
        PtrImpl::strong_count(&this.0)
    }

    /// Makes a non-owning [Weak] pointer to the same allocation
    pub fn downgrade(this: &Self) -> Weak<T> {
        Weak(PtrImpl::downgrade(&this.0))
    }
}

impl<T: ?Sized> Deref for Ptr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.0.deref()
    }
}

impl<T: ?Sized> Clone for Ptr<T> {
    fn clone(&self) -> Self {
        Self(PtrImpl::clone(&self.0))
    }
}

impl<T> From<Vec<T>> for Ptr<[T]> {
    #[inline]
    fn from(value: Vec<T>) -> Self {
        Self(PtrImpl::from(value))
    }
}

impl From<&str> for Ptr<str> {
    #[inline]
    fn from(value: &str) -> Self {
        Self(PtrImpl::from(value))
    }
}

impl From<String> for Ptr<str> {
    #[inline]
    fn from(value: String) -> Self {
        Self(PtrImpl::from(value))
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for Ptr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
