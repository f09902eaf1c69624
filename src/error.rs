//! Errors surfaced to the caller of the hardware context

use core::fmt;

use embedded_hal::{blocking::spi as hal_spi, digital::v2::OutputPin};

use crate::{gpio, spi, spi::SpiPort};

/// One of the DW3000's control lines
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Line {
    /// RSTn
    Reset,

    /// WAKEUP
    Wakeup,

    /// IRQ
    Interrupt,
}

/// An error that can occur while driving the DW3000's hardware interface
pub enum Error<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    /// Error occured on the SPI bus or the chip select line
    Spi(spi::Error<P, CS>),

    /// The DW3000 did not come out of reset in time
    Timeout,

    /// The requested feature needs a line that is not configured
    Configuration(Line),

    /// Driving or configuring a control line failed
    Gpio(Line),
}

impl<P, CS> From<spi::Error<P, CS>> for Error<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    fn from(error: spi::Error<P, CS>) -> Self {
        Error::Spi(error)
    }
}

impl<P, CS> From<gpio::Error> for Error<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    fn from(error: gpio::Error) -> Self {
        match error {
            gpio::Error::Timeout => Error::Timeout,
            gpio::Error::Unassigned(line) => Error::Configuration(line),
            gpio::Error::Pin(line) => Error::Gpio(line),
        }
    }
}

// We can't derive this implementation, as `Debug` is only implemented
// conditionally for `spi::Error`.
impl<P, CS> fmt::Debug for Error<P, CS>
where
    P: SpiPort,
    P::Error: fmt::Debug,
    <P::Device as hal_spi::Write<u8>>::Error: fmt::Debug,
    <P::Device as hal_spi::Transfer<u8>>::Error: fmt::Debug,
    CS: OutputPin,
    CS::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Spi(error) => write!(f, "Spi({:?})", error),
            Error::Timeout => write!(f, "Timeout"),
            Error::Configuration(line) => write!(f, "Configuration({:?})", line),
            Error::Gpio(line) => write!(f, "Gpio({:?})", line),
        }
    }
}
