//! Definitions of Send and Sync used in the Wisp runtime
//!
//! When Wisp is being used in a single-threaded context [WispSend] and [WispSync] are empty
//! traits implemented for all types.

#[cfg(feature = "rc")]
mod traits {
    /// An empty trait for single-threaded contexts, implemented for all types
    pub trait WispSend {}
    impl<T: ?Sized> WispSend for T {}

    /// An empty trait for single-threaded contexts, implemented for all types
    pub trait WispSync {}
    impl<T: ?Sized> WispSync for T {}
}

#[cfg(not(feature = "rc"))]
mod traits {
    pub use Send as WispSend;
    pub use Sync as WispSync;
}

pub use traits::*;
