//! Blocking delays

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

/// The platform delay, as used by the vendor driver and the wakeup and reset
/// sequences
pub struct Delay<D>(D);

impl<D> Delay<D>
where
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Wraps a platform delay
    pub fn new(delay: D) -> Self {
        Delay(delay)
    }

    /// Blocks for `ms` milliseconds
    pub fn ms(&mut self, ms: u32) {
        self.0.delay_ms(ms);
    }

    /// Blocks for `us` microseconds
    pub fn us(&mut self, us: u32) {
        self.0.delay_us(us);
    }

    /// The wrapped platform delay
    pub fn inner(&mut self) -> &mut D {
        &mut self.0
    }

    /// Returns the platform delay
    pub fn free(self) -> D {
        self.0
    }
}

impl<D> DelayMs<u32> for Delay<D>
where
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn delay_ms(&mut self, ms: u32) {
        self.ms(ms);
    }
}

impl<D> DelayUs<u32> for Delay<D>
where
    D: DelayMs<u32> + DelayUs<u32>,
{
    fn delay_us(&mut self, us: u32) {
        self.us(us);
    }
}
