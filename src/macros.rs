//! Crate-internal logging shims.
//!
//! The engines report phase-boundary events (feedback broadcast, minislot
//! collisions, registrations, resyncs) through these macros. They forward to
//! `defmt` or `log` depending on the enabled feature and compile to nothing
//! when neither backend is selected, so the protocol path carries no logging
//! cost on silent builds.

#[cfg(feature = "defmt-0-3")]
macro_rules! net_debug {
    ($($arg:tt)*) => {
        defmt::debug!($($arg)*)
    };
}

#[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
macro_rules! net_debug {
    ($($arg:tt)*) => {
        log::debug!($($arg)*)
    };
}

#[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
macro_rules! net_debug {
    ($($arg:tt)*) => {{
        let _ = core::format_args!($($arg)*);
    }};
}

#[cfg(feature = "defmt-0-3")]
macro_rules! net_warn {
    ($($arg:tt)*) => {
        defmt::warn!($($arg)*)
    };
}

#[cfg(all(feature = "log", not(feature = "defmt-0-3")))]
macro_rules! net_warn {
    ($($arg:tt)*) => {
        log::warn!($($arg)*)
    };
}

#[cfg(not(any(feature = "log", feature = "defmt-0-3")))]
macro_rules! net_warn {
    ($($arg:tt)*) => {{
        let _ = core::format_args!($($arg)*);
    }};
}

pub(crate) use net_debug;
pub(crate) use net_warn;
