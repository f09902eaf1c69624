//! Reset and wakeup lines
//!
//! RSTn is open drain: the DW3000 holds it low until it is ready, and the
//! host may pull it low to reset the chip. The host never drives it high.
//! WAKEUP is a plain push-pull output.

use embedded_hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::OutputPin,
};
use log::{error, info, warn};

use crate::error::Line;

/// Number of times the reset line is polled before giving up
///
/// The line is polled once per millisecond.
pub const RESET_POLL_LIMIT: u32 = 1000;

/// How long the wakeup line (or chip select) is held active
pub const WAKEUP_PULSE_US: u32 = 500;

/// How long the DW3000 gets to settle after a wakeup pulse
pub const WAKEUP_SETTLE_MS: u32 = 1;

/// How long RSTn is held low for a reset
pub const RESET_ASSERT_MS: u32 = 1;

/// How long the DW3000 gets to come out of reset
pub const RESET_RECOVER_MS: u32 = 2;

/// The platform's open-drain reset line
pub trait ResetLine {
    /// Error returned by the pin operations
    type Error;

    /// Drives the line low
    fn assert(&mut self) -> Result<(), Self::Error>;

    /// Stops driving the line, letting it float
    fn release(&mut self) -> Result<(), Self::Error>;

    /// Whether the line is high, i.e. the DW3000 is out of reset
    fn is_released(&self) -> Result<bool, Self::Error>;
}

/// An error that can occur while driving the reset or wakeup line
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The DW3000 did not release RSTn in time
    Timeout,

    /// The operation needs a line that is not connected
    Unassigned(Line),

    /// The pin reported an error
    Pin(Line),
}

/// The reset and wakeup lines
pub struct Gpio<RST, WAKE> {
    reset: Option<RST>,
    wakeup: Option<WAKE>,
}

impl<RST, WAKE> Gpio<RST, WAKE>
where
    RST: ResetLine,
    WAKE: OutputPin,
{
    /// Takes ownership of the lines that are connected
    pub fn new(reset: Option<RST>, wakeup: Option<WAKE>) -> Self {
        Gpio { reset, wakeup }
    }

    /// Waits for the DW3000 to come out of reset, then drives wakeup low
    pub fn init<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayMs<u32>,
    {
        self.wait_for_reset_release(delay)?;
        self.wakeup_pin_low()
    }

    /// Checks once whether the DW3000 is out of reset
    ///
    /// Returns `WouldBlock` while RSTn is low. Without a reset line, the chip
    /// is assumed to be ready.
    pub fn poll_reset_release(&self) -> nb::Result<(), Error> {
        let reset = match &self.reset {
            Some(reset) => reset,
            None => return Ok(()),
        };

        match reset.is_released() {
            Ok(true) => Ok(()),
            Ok(false) => Err(nb::Error::WouldBlock),
            Err(_) => Err(nb::Error::Other(Error::Pin(Line::Reset))),
        }
    }

    /// Lets RSTn float, then waits up to [`RESET_POLL_LIMIT`] ms for the
    /// DW3000 to release it
    pub fn wait_for_reset_release<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayMs<u32>,
    {
        match &mut self.reset {
            Some(reset) => reset.release().map_err(|_| Error::Pin(Line::Reset))?,
            None => return Ok(()),
        }

        for _ in 0..RESET_POLL_LIMIT {
            match self.poll_reset_release() {
                Ok(()) => return Ok(()),
                Err(nb::Error::WouldBlock) => delay.delay_ms(1),
                Err(nb::Error::Other(error)) => return Err(error),
            }
        }

        error!("DW3000 did not come out of reset");
        Err(Error::Timeout)
    }

    /// Resets the DW3000 through RSTn
    pub fn reset<D>(&mut self, delay: &mut D) -> Result<(), Error>
    where
        D: DelayMs<u32>,
    {
        let reset = match &mut self.reset {
            Some(reset) => reset,
            None => {
                error!("Reset pin is not defined");
                return Err(Error::Unassigned(Line::Reset));
            }
        };

        info!("HW reset");

        reset.assert().map_err(|_| Error::Pin(Line::Reset))?;
        delay.delay_ms(RESET_ASSERT_MS);
        reset.release().map_err(|_| Error::Pin(Line::Reset))?;
        delay.delay_ms(RESET_RECOVER_MS);

        Ok(())
    }

    /// Wakes the DW3000 from sleep
    ///
    /// Pulses WAKEUP if it is connected. If it isn't, `fallback` is called to
    /// pulse chip select instead. Either way, the chip is given
    /// [`WAKEUP_SETTLE_MS`] to settle afterwards.
    pub fn wakeup<D, F, E>(&mut self, delay: &mut D, fallback: F) -> Result<(), E>
    where
        D: DelayMs<u32> + DelayUs<u32>,
        F: FnOnce(&mut D) -> Result<(), E>,
        E: From<Error>,
    {
        match &mut self.wakeup {
            Some(wakeup) => {
                info!("WAKEUP PIN");
                wakeup.set_high().map_err(|_| Error::Pin(Line::Wakeup))?;
                delay.delay_us(WAKEUP_PULSE_US);
                wakeup.set_low().map_err(|_| Error::Pin(Line::Wakeup))?;
            }
            None => {
                info!("WAKEUP CS");
                fallback(delay)?;
            }
        }

        delay.delay_ms(WAKEUP_SETTLE_MS);
        Ok(())
    }

    /// Drives WAKEUP low, if it is connected
    pub fn wakeup_pin_low(&mut self) -> Result<(), Error> {
        if let Some(wakeup) = &mut self.wakeup {
            wakeup.set_low().map_err(|_| Error::Pin(Line::Wakeup))?;
        }
        Ok(())
    }

    /// Returns the lines, leaving RSTn floating and WAKEUP low
    pub fn fini(mut self) -> (Option<RST>, Option<WAKE>) {
        if let Some(reset) = &mut self.reset {
            if reset.release().is_err() {
                warn!("Failed to release reset line");
            }
        }
        if self.wakeup_pin_low().is_err() {
            warn!("Failed to drive wakeup line low");
        }

        (self.reset, self.wakeup)
    }
}
