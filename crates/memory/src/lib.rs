//! Memory management utilities for Wisp
//!
//! Values are shared with reference-counted pointers. Reference cycles aren't collected, so the
//! runtime uses [Weak] pointers where a strong back-reference would otherwise form a cycle
//! (e.g. a prototype's closure cache, or an open upvalue's handle on its stack).
//!
//! One of two strategies can be selected with a feature:
//!
//! - `rc`: single-threaded `Rc` pointers with `RefCell` interior mutability.
//! - `arc`: thread-safe `Arc` pointers with `parking_lot::RwLock` interior mutability.

#![warn(missing_docs)]

#[cfg(all(feature = "arc", feature = "rc"))]
compile_error!("A single memory management feature can be enabled at a time");

mod address;
mod ptr;
mod ptr_impl;
mod ptr_mut;
mod weak;

pub use crate::{
    address::Address,
    ptr::Ptr,
    ptr_mut::{Borrow, BorrowMut, PtrMut, WispCell},
    weak::{Weak, WeakMut},
};
