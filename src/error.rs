use core::fmt::{self, Debug};
use embedded_hal::spi::SpiDevice;

/// The error type used by the flash command layer.
///
/// This can encapsulate an SPI error, and adds its own protocol errors
/// on top of that.
pub enum Error<SPI: SpiDevice> {
    /// An SPI transfer failed.
    Spi(SPI::Error),
    /// The write-in-progress bit was still set after `polls` status reads.
    BusyTimeout { polls: u32 },
}

#[cfg(feature = "defmt")]
impl<SPI: SpiDevice> defmt::Format for Error<SPI>
where
    SPI::Error: Debug,
{
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Spi(_spi) => defmt::write!(fmt, "Error::Spi"),
            Error::BusyTimeout { polls } => {
                defmt::write!(fmt, "Error::BusyTimeout {{ polls: {} }}", polls)
            }
        }
    }
}

impl<SPI: SpiDevice> Debug for Error<SPI>
where
    SPI::Error: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Spi(spi) => write!(f, "Error::Spi({:?})", spi),
            Error::BusyTimeout { polls } => write!(f, "Error::BusyTimeout {{ polls: {} }}", polls),
        }
    }
}

impl<SPI: SpiDevice> PartialEq for Error<SPI>
where
    SPI::Error: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Error::Spi(a), Error::Spi(b)) => a == b,
            (Error::BusyTimeout { polls: a }, Error::BusyTimeout { polls: b }) => a == b,
            _ => false,
        }
    }
}
