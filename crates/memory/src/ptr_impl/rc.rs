pub(crate) use std::cell::Ref as BorrowImpl;
pub(crate) use std::cell::RefCell as CellImpl;
pub(crate) use std::cell::RefMut as BorrowMutImpl;
pub(crate) use std::rc::Rc as PtrImpl;
pub(crate) use std::rc::Weak as WeakImpl;

#[doc(hidden)]
#[macro_export]
macro_rules! __make_ptr {
    ($value:expr) => {
        $crate::Ptr::from(::std::rc::Rc::new($value) as ::std::rc::Rc<_>)
    };
}

#[inline]
pub(crate) fn borrow<T: ?Sized>(cell: &CellImpl<T>) -> BorrowImpl<'_, T> {
    cell.borrow()
}

#[inline]
pub(crate) fn borrow_mut<T: ?Sized>(cell: &CellImpl<T>) -> BorrowMutImpl<'_, T> {
    cell.borrow_mut()
}
