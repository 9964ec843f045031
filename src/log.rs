#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! flash_log {
    ($level:ident, $fmt:expr) => { { let _ = $fmt; } };
    ($level:ident, $fmt:expr, $($arg:expr),*) => { { let _ = $fmt; $( let _ = &$arg; )* } };
}

#[cfg(feature = "defmt")]
#[macro_export]
macro_rules! flash_log {
    (trace, $($arg:expr),*) => { defmt::trace!($($arg),*); };
    (debug, $($arg:expr),*) => { defmt::debug!($($arg),*); };
    (info, $($arg:expr),*) => { defmt::info!($($arg),*); };
    (warn, $($arg:expr),*) => { defmt::warn!($($arg),*); };
    (error, $($arg:expr),*) => { defmt::error!($($arg),*); };
}
