//! Logging macros
//!
//! Each level forwards to `defmt` with the `defmt` feature. Without it the
//! arguments are only borrowed, so a value computed just for logging does
//! not trip the unused-variable lint.

#[cfg(feature = "defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $($arg:tt)*) => { defmt::$level!($($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log {
    ($level:ident, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        $( let _ = &$arg; )*
    }};
}

/// Trace message
#[macro_export]
macro_rules! trace { ($($arg:tt)*) => { $crate::__log!(trace, $($arg)*) }; }

/// Debug message
#[macro_export]
macro_rules! debug { ($($arg:tt)*) => { $crate::__log!(debug, $($arg)*) }; }

/// Info message
#[macro_export]
macro_rules! info { ($($arg:tt)*) => { $crate::__log!(info, $($arg)*) }; }

/// Warning message
#[macro_export]
macro_rules! warn { ($($arg:tt)*) => { $crate::__log!(warn, $($arg)*) }; }

/// Error message
#[macro_export]
macro_rules! error { ($($arg:tt)*) => { $crate::__log!(error, $($arg)*) }; }
