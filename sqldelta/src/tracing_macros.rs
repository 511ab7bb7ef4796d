//! Logging shims: forward to `tracing` when it is enabled, expand to nothing otherwise.

#[cfg(any(test, feature = "tracing"))]
macro_rules! debug {
    ($($tt:tt)*) => { ::tracing::debug!($($tt)*) };
}

#[cfg(not(any(test, feature = "tracing")))]
macro_rules! debug {
    ($($tt:tt)*) => {};
}

#[cfg(any(test, feature = "tracing"))]
macro_rules! trace {
    ($($tt:tt)*) => { ::tracing::trace!($($tt)*) };
}

#[cfg(not(any(test, feature = "tracing")))]
macro_rules! trace {
    ($($tt:tt)*) => {};
}

pub(crate) use {debug, trace};
