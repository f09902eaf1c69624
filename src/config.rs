//! Hardware configuration
//!
//! Describes how the DW3000 is wired to the microcontroller. The numbers are
//! platform pin numbers; the board support crate turns them into pin objects,
//! and the core uses them for logging and for checking that the lines it was
//! handed match what the configuration promises.

/// How the DW3000 is wired up
///
/// The reset, wakeup and interrupt lines are optional. `None` means the line
/// is not connected, and the behavior that depends on it is skipped:
///
/// - no reset line: initialization does not wait for the chip to come out of
///   reset, and an explicit reset is refused;
/// - no wakeup line: the chip is woken up by pulsing chip select instead;
/// - no interrupt line: interrupt enable/disable are no-ops, and the
///   interrupt always reads as disabled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HwConfig {
    /// RSTn, open drain
    pub reset_pin: Option<u8>,

    /// WAKEUP, active high
    pub wakeup_pin: Option<u8>,

    /// IRQ, active high
    pub irq_pin: Option<u8>,

    /// SPI chip select, active low
    pub spi_cs_pin: u8,

    /// SPI clock
    pub spi_clk_pin: u8,

    /// SPI MISO
    pub spi_miso_pin: u8,

    /// SPI MOSI
    pub spi_mosi_pin: u8,

    /// Highest SPI clock the wiring supports, in MHz
    ///
    /// Used for the fast rate, capped at the platform's safe ceiling.
    pub spi_max_mhz: u32,
}

impl HwConfig {
    /// The fast SPI clock requested by this configuration, in Hz
    pub fn spi_max_hz(&self) -> u32 {
        self.spi_max_mhz.saturating_mul(1_000_000)
    }
}

/// Formats an optional pin number the way the logs show it
pub(crate) struct PinNumber(pub Option<u8>);

impl core::fmt::Display for PinNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.0 {
            Some(pin) => write!(f, "{}", pin),
            None => write!(f, "-"),
        }
    }
}
