//! The hardware context
//!
//! [`DW3000Hw`] owns everything the vendor driver needs to reach the DW3000,
//! and is the only way to get at it. There is one context per transceiver.

use core::{convert::Infallible, fmt};

use embedded_hal::{
    blocking::{
        delay::{DelayMs, DelayUs},
        spi as hal_spi,
    },
    digital::v2::OutputPin,
};
use log::{error, info};

use crate::{
    config::{HwConfig, PinNumber},
    delay::Delay,
    error::{Error, Line},
    gpio::{self, Gpio, ResetLine, WAKEUP_PULSE_US},
    irq::{InterruptGate, IrqGate},
    lock::{DeviceLock, LockToken, Strategy},
    spi::{self, Bus, Frame, Speed, SpiPort},
};

/// Stands in for a line that is not connected
///
/// Use it as the type of an absent line in [`Lines`], so the type parameter
/// can be inferred:
///
/// ``` rust
/// # use dw3000_port::{Lines, NoPin};
/// # fn lines<CS>(chip_select: CS) -> Lines<CS, NoPin, NoPin, NoPin> {
/// Lines {
///     chip_select,
///     reset: None::<NoPin>,
///     wakeup: None::<NoPin>,
///     irq: None::<NoPin>,
/// }
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NoPin;

impl OutputPin for NoPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ResetLine for NoPin {
    type Error = Infallible;

    fn assert(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn is_released(&self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

impl InterruptGate for NoPin {
    type Error = Infallible;

    fn listen(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn unlisten(&mut self) {}

    fn enable(&mut self) {}

    fn disable(&mut self) {}

    fn is_enabled(&self) -> bool {
        false
    }

    fn is_asserted(&self) -> bool {
        false
    }
}

/// The control lines of the DW3000
///
/// Chip select is required. The other lines are `None` if they are not
/// connected, which must agree with the [`HwConfig`] they are used with.
pub struct Lines<CS, RST, WAKE, G> {
    /// SPI chip select
    pub chip_select: CS,

    /// RSTn
    pub reset: Option<RST>,

    /// WAKEUP
    pub wakeup: Option<WAKE>,

    /// IRQ
    pub irq: Option<G>,
}

/// A failed [`DW3000Hw::init`], with the parts it was given
///
/// The parts can be passed to `init` again.
pub struct InitError<P, CS, RST, WAKE, G, D>
where
    P: SpiPort,
    CS: OutputPin,
{
    /// What went wrong
    pub error: Error<P, CS>,

    /// The SPI bus, released
    pub port: P,

    /// The control lines, with RSTn floating and WAKEUP low if they were
    /// touched at all
    pub lines: Lines<CS, RST, WAKE, G>,

    /// The platform delay
    pub delay: D,
}

// Only the error is printed, the parts rarely implement `Debug`.
impl<P, CS, RST, WAKE, G, D> fmt::Debug for InitError<P, CS, RST, WAKE, G, D>
where
    P: SpiPort,
    P::Error: fmt::Debug,
    <P::Device as hal_spi::Write<u8>>::Error: fmt::Debug,
    <P::Device as hal_spi::Transfer<u8>>::Error: fmt::Debug,
    CS: OutputPin,
    CS::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InitError({:?})", self.error)
    }
}

/// Entry point to the DW3000's hardware interface
///
/// Every transaction is serialized through the device lock, so the context
/// can be shared with the interrupt handler, as long as the handler only runs
/// while the lock is not held. See [`Strategy`].
pub struct DW3000Hw<P, CS, RST, WAKE, G, D>
where
    P: SpiPort,
{
    bus: Bus<P, CS>,
    gpio: Gpio<RST, WAKE>,
    irq: IrqGate<G>,
    lock: DeviceLock,
    delay: Delay<D>,
    config: HwConfig,
}

impl<P, CS, RST, WAKE, G, D> DW3000Hw<P, CS, RST, WAKE, G, D>
where
    P: SpiPort,
    CS: OutputPin,
    RST: ResetLine,
    WAKE: OutputPin,
    G: InterruptGate,
    D: DelayMs<u32> + DelayUs<u32>,
{
    /// Brings up the hardware interface
    ///
    /// Waits for the DW3000 to come out of reset, drives WAKEUP low, and
    /// attaches the DW3000 to the bus at [`spi::SLOW_HZ`]. The interrupt line
    /// is not touched; see [`init_interrupt`].
    ///
    /// Fails with [`Error::Configuration`] if `lines` doesn't match
    /// `config`, and with [`Error::Timeout`] if the chip doesn't come out of
    /// reset. In both cases the bus is left alone. Every failure hands the
    /// parts back in the [`InitError`].
    ///
    /// [`init_interrupt`]: #method.init_interrupt
    pub fn init(
        port: P,
        lines: Lines<CS, RST, WAKE, G>,
        delay: D,
        config: HwConfig,
        strategy: Strategy,
    ) -> Result<Self, InitError<P, CS, RST, WAKE, G, D>> {
        info!(
            "HW Init (RESET:{} WAKEUP:{} IRQ:{})",
            PinNumber(config.reset_pin),
            PinNumber(config.wakeup_pin),
            PinNumber(config.irq_pin),
        );
        info!(
            "SPI (CS:{} CLK:{} MISO:{} MOSI:{}) max {} MHz",
            config.spi_cs_pin,
            config.spi_clk_pin,
            config.spi_miso_pin,
            config.spi_mosi_pin,
            config.spi_max_mhz,
        );

        if let Err(error) = check_lines(&config, &lines) {
            return Err(InitError {
                error: error.into(),
                port,
                lines,
                delay,
            });
        }

        let Lines {
            chip_select,
            reset,
            wakeup,
            irq,
        } = lines;
        let mut delay = Delay::new(delay);
        let mut gpio = Gpio::new(reset, wakeup);
        let mut bus = Bus::new(port, chip_select, config.spi_max_hz());

        let result: Result<(), Error<P, CS>> = match gpio.init(&mut delay) {
            Ok(()) => bus.init().map_err(Error::from),
            Err(error) => Err(Error::from(error)),
        };
        if let Err(error) = result {
            let (reset, wakeup) = gpio.fini();
            let (port, chip_select) = bus.fini();

            return Err(InitError {
                error,
                port,
                lines: Lines {
                    chip_select,
                    reset,
                    wakeup,
                    irq,
                },
                delay: delay.free(),
            });
        }

        Ok(DW3000Hw {
            bus,
            gpio,
            irq: IrqGate::new(irq),
            lock: DeviceLock::new(strategy),
            delay,
            config,
        })
    }

    /// The configuration the context was created with
    pub fn config(&self) -> &HwConfig {
        &self.config
    }

    /// Starts listening on the interrupt line
    ///
    /// The interrupt stays masked until [`interrupt_enable`] is called.
    ///
    /// [`interrupt_enable`]: #method.interrupt_enable
    pub fn init_interrupt(&mut self) -> Result<(), Error<P, CS>> {
        self.irq.init()?;
        Ok(())
    }

    /// Unmasks the DW3000's interrupt
    pub fn interrupt_enable(&mut self) {
        self.irq.enable();
    }

    /// Masks the DW3000's interrupt
    pub fn interrupt_disable(&mut self) {
        self.irq.disable();
    }

    /// Whether the DW3000's interrupt is unmasked
    pub fn interrupt_is_enabled(&self) -> bool {
        self.irq.is_enabled()
    }

    /// Services the DW3000's interrupt
    ///
    /// Call this from the interrupt handler. `isr` is called with the context
    /// for as long as the interrupt line stays high, and the number of calls
    /// is returned. It is meant to run the vendor driver's event handler,
    /// which reads and clears the DW3000's status through the context. The
    /// line only goes low once the status is cleared.
    pub fn service_interrupt<F>(&mut self, mut isr: F) -> usize
    where
        F: FnMut(&mut Self),
    {
        self.irq.acknowledge();

        let mut calls = 0;
        while self.irq.is_asserted() {
            isr(self);
            calls += 1;
        }
        calls
    }

    /// Resets the DW3000 through RSTn
    pub fn reset(&mut self) -> Result<(), Error<P, CS>> {
        self.gpio.reset(&mut self.delay)?;
        Ok(())
    }

    /// Wakes the DW3000 from sleep
    ///
    /// Uses WAKEUP if connected, and holds chip select low instead if not.
    pub fn wakeup(&mut self) -> Result<(), Error<P, CS>> {
        let bus = &mut self.bus;

        self.gpio
            .wakeup(&mut self.delay, |delay| -> Result<(), Error<P, CS>> {
                bus.pulse_chip_select(delay, WAKEUP_PULSE_US)?;
                Ok(())
            })
    }

    /// Drives WAKEUP low, if it is connected
    pub fn wakeup_pin_low(&mut self) -> Result<(), Error<P, CS>> {
        self.gpio.wakeup_pin_low()?;
        Ok(())
    }

    /// Sends `header`, then reads `buffer.len()` bytes
    pub fn read(&mut self, header: &[u8], buffer: &mut [u8]) -> Result<(), Error<P, CS>> {
        let token = self.lock.lock(&mut self.irq);
        let result = self.bus.read(header, buffer);
        self.lock.unlock(&mut self.irq, token);

        result.map_err(Error::from)
    }

    /// Writes `header` followed by `body`
    ///
    /// Header and body together must fit into [`spi::WRITE_BUFFER_LEN`].
    pub fn write(&mut self, header: &[u8], body: &[u8]) -> Result<(), Error<P, CS>> {
        let frame = Frame::new(header, body).map_err(spi::Error::<P, CS>::from)?;
        self.transmit(&frame)
    }

    /// Writes `header`, `body` and a trailing CRC byte
    ///
    /// For use with the DW3000's SPI CRC mode. Header, body and CRC together
    /// must fit into [`spi::WRITE_BUFFER_LEN`].
    pub fn write_with_crc(
        &mut self,
        header: &[u8],
        body: &[u8],
        crc8: u8,
    ) -> Result<(), Error<P, CS>> {
        let frame = Frame::with_crc(header, body, crc8).map_err(spi::Error::<P, CS>::from)?;
        self.transmit(&frame)
    }

    fn transmit(&mut self, frame: &Frame) -> Result<(), Error<P, CS>> {
        let token = self.lock.lock(&mut self.irq);
        let result = self.bus.transmit(frame);
        self.lock.unlock(&mut self.irq, token);

        result.map_err(Error::from)
    }

    /// Switches the SPI clock rate
    pub fn set_speed(&mut self, speed: Speed) -> Result<(), Error<P, CS>> {
        let token = self.lock.lock(&mut self.irq);
        let result = self.bus.set_speed(speed);
        self.lock.unlock(&mut self.irq, token);

        result.map_err(Error::from)
    }

    /// The SPI clock rate, or `None` if a speed change left the DW3000
    /// detached
    pub fn clock_hz(&self) -> Option<u32> {
        self.bus.clock_hz()
    }

    /// Keeps the interrupt handler out until [`unlock`] is called
    ///
    /// Not reentrant. See [`lock`](crate::lock).
    ///
    /// [`unlock`]: #method.unlock
    pub fn lock(&mut self) -> LockToken {
        self.lock.lock(&mut self.irq)
    }

    /// Undoes [`lock`]
    ///
    /// [`lock`]: #method.lock
    pub fn unlock(&mut self, token: LockToken) {
        self.lock.unlock(&mut self.irq, token);
    }

    /// Blocks for `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.ms(ms);
    }

    /// Blocks for `us` microseconds
    pub fn delay_us(&mut self, us: u32) {
        self.delay.us(us);
    }

    /// The SPI transaction trace
    #[cfg(feature = "trace")]
    pub fn trace(&mut self) -> &mut crate::trace::Trace {
        self.bus.trace()
    }

    /// Shuts the hardware interface down and returns its parts
    ///
    /// The interrupt is masked and released, RSTn floats, WAKEUP is low, and
    /// the bus is released.
    pub fn fini(self) -> (P, Lines<CS, RST, WAKE, G>, D) {
        info!("HW fini");

        let irq = self.irq.fini();
        let (reset, wakeup) = self.gpio.fini();
        let (port, chip_select) = self.bus.fini();

        let lines = Lines {
            chip_select,
            reset,
            wakeup,
            irq,
        };
        (port, lines, self.delay.free())
    }
}

fn check_lines<CS, RST, WAKE, G>(
    config: &HwConfig,
    lines: &Lines<CS, RST, WAKE, G>,
) -> Result<(), gpio::Error> {
    check_line(Line::Reset, config.reset_pin, &lines.reset)?;
    check_line(Line::Wakeup, config.wakeup_pin, &lines.wakeup)?;
    check_line(Line::Interrupt, config.irq_pin, &lines.irq)
}

fn check_line<T>(line: Line, pin: Option<u8>, handle: &Option<T>) -> Result<(), gpio::Error> {
    if pin.is_some() == handle.is_some() {
        return Ok(());
    }

    error!(
        "{:?} line {} configured, but {} passed",
        line,
        if pin.is_some() { "is" } else { "is not" },
        if handle.is_some() { "one was" } else { "none was" },
    );
    Err(gpio::Error::Unassigned(line))
}
