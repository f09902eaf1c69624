//! Board support crate for the Qorvo DWM3000EVB on the Nordic nRF52-DK
//!
//! The [DWM3000EVB] is an Arduino shield carrying the DW3000 UWB transceiver.
//! Plugged into the [nRF52-DK], it is wired to the [nRF52832] like this:
//!
//! | DW3000  | Arduino | nRF52832 |
//! |---------|---------|----------|
//! | RSTn    | D7      | P0.18    |
//! | IRQ     | D8      | P0.19    |
//! | WAKEUP  | D9      | P0.20    |
//! | SPICSn  | D10     | P0.22    |
//! | SPIMOSI | D11     | P0.23    |
//! | SPIMISO | D12     | P0.24    |
//! | SPICLK  | D13     | P0.25    |
//!
//! Note that the DK's LEDs share P0.17 to P0.20 with the shield, so they are
//! not available.
//!
//! The entry point to the API is the [`DWM3000EVB`] struct.
//!
//! [DWM3000EVB]: https://www.qorvo.com/products/p/DWM3000EVB
//! [nRF52-DK]: https://www.nordicsemi.com/Products/Development-hardware/nRF52-DK
//! [nRF52832]: https://www.nordicsemi.com/Products/Low-power-short-range-wireless/nRF52832

#![no_std]
#![deny(missing_docs)]

pub use cortex_m;
#[cfg(feature = "rt")]
pub use cortex_m_rt;
pub use dw3000_port;
pub use embedded_hal;

pub use nrf52832_hal;

#[cfg(feature = "semihosting")]
pub mod logger;

/// Exports traits that are usually needed when using this crate
pub mod prelude {
    pub use dw3000_port::DriverPort as _;
    pub use nrf52832_hal::prelude::*;
}

use core::convert::Infallible;

use dw3000_port::{
    DW3000Hw, HwConfig, InitError, InterruptGate, Lines, ResetLine, SpiPort, Strategy,
};
use embedded_hal::digital::v2::InputPin;
use nrf52832_hal::{
    gpio::{
        p0::{self, P0_18, P0_19, P0_20, P0_22},
        Floating, Input, Level, OpenDrain, OpenDrainConfig, Output, Pin, PullDown, PushPull,
    },
    pac::{self as nrf52, CorePeripherals, Interrupt, Peripherals, GPIOTE, SPIM0},
    spim::{self, Frequency, Spim},
    Delay,
};

/// The hardware context of the DW3000 on this board
pub type DW3000 = DW3000Hw<SpimPort, ChipSelect, ResetPin, Wakeup, GpioteGate, Delay>;

/// A failed [`init_dw3000`], holding the bus, lines and delay for another try
pub type Dw3000InitError =
    InitError<SpimPort, ChipSelect, ResetPin, Wakeup, GpioteGate, Delay>;

/// The DW3000's chip select line
pub type ChipSelect = P0_22<Output<PushPull>>;

/// The DW3000's WAKEUP line
pub type Wakeup = P0_20<Output<PushPull>>;

/// How the shield is wired to the nRF52-DK
pub fn config() -> HwConfig {
    HwConfig {
        reset_pin: Some(18),
        wakeup_pin: Some(20),
        irq_pin: Some(19),
        spi_cs_pin: 22,
        spi_clk_pin: 25,
        spi_miso_pin: 24,
        spi_mosi_pin: 23,
        spi_max_mhz: 8,
    }
}

/// Brings up the DW3000
///
/// See [`DW3000Hw::init`].
pub fn init_dw3000(
    parts: Dw3000Parts,
    delay: Delay,
    strategy: Strategy,
) -> Result<DW3000, Dw3000InitError> {
    DW3000Hw::init(parts.port, parts.lines, delay, config(), strategy)
}

/// Provides access to the DW3000 and the nRF52's remaining peripherals
///
/// You can get an instance of this struct by using [`DWM3000EVB::take`] or
/// [`DWM3000EVB::steal`].
#[allow(non_snake_case)]
pub struct DWM3000EVB {
    /// The DW3000's bus and control lines, ready for [`init_dw3000`]
    pub DW3000: Dw3000Parts,

    /// A delay based on SysTick
    pub delay: Delay,

    /// nRF52 core peripheral: Nested Vector Interrupt Controller
    pub NVIC: nrf52::NVIC,

    /// nRF52 core peripheral: System Control Block
    pub SCB: nrf52::SCB,

    /// nRF52 peripheral: CLOCK
    pub CLOCK: nrf52::CLOCK,

    /// nRF52 peripheral: RADIO
    pub RADIO: nrf52::RADIO,

    /// nRF52 peripheral: UARTE0
    pub UARTE0: nrf52::UARTE0,

    /// nRF52 peripheral: TIMER0
    pub TIMER0: nrf52::TIMER0,

    /// nRF52 peripheral: TIMER1
    pub TIMER1: nrf52::TIMER1,

    /// nRF52 peripheral: RTC0
    pub RTC0: nrf52::RTC0,

    /// nRF52 peripheral: RNG
    pub RNG: nrf52::RNG,
}

impl DWM3000EVB {
    /// Take ownership of a `DWM3000EVB` instance safely
    ///
    /// This method will return an instance of `DWM3000EVB` the first time it
    /// is called. It will return only `None` on subsequent calls.
    pub fn take() -> Option<Self> {
        Some(Self::new(CorePeripherals::take()?, Peripherals::take()?))
    }

    /// Take ownership of a `DWM3000EVB` instance, circumventing safety
    /// guarantees
    ///
    /// # Safety
    ///
    /// This method can be used to create multiple instances of `DWM3000EVB`.
    /// Those instances can interfere with each other, causing all kinds of
    /// unexpected behavior and circumventing safety guarantees in many ways.
    ///
    /// Always use `DWM3000EVB::take`, unless you really know what you're
    /// doing.
    pub unsafe fn steal() -> Self {
        Self::new(CorePeripherals::steal(), Peripherals::steal())
    }

    fn new(cp: CorePeripherals, p: Peripherals) -> Self {
        let pins = p0::Parts::new(p.P0);

        let port = SpimPort::new(
            p.SPIM0,
            pins.p0_25.into_push_pull_output(Level::Low).degrade(),
            pins.p0_23.into_push_pull_output(Level::Low).degrade(),
            pins.p0_24.into_floating_input().degrade(),
        );

        DWM3000EVB {
            DW3000: Dw3000Parts {
                port,
                lines: Lines {
                    chip_select: pins.p0_22.into_push_pull_output(Level::High),
                    reset: Some(ResetPin::new(pins.p0_18)),
                    wakeup: Some(pins.p0_20.into_push_pull_output(Level::Low)),
                    irq: Some(GpioteGate::new(p.GPIOTE, pins.p0_19)),
                },
            },

            delay: Delay::new(cp.SYST),

            NVIC: cp.NVIC,
            SCB: cp.SCB,

            CLOCK: p.CLOCK,
            RADIO: p.RADIO,
            UARTE0: p.UARTE0,
            TIMER0: p.TIMER0,
            TIMER1: p.TIMER1,
            RTC0: p.RTC0,
            RNG: p.RNG,
        }
    }
}

/// The DW3000's bus and control lines
pub struct Dw3000Parts {
    /// SPIM0, wired to the DW3000
    pub port: SpimPort,

    /// Chip select, RSTn, WAKEUP and IRQ
    pub lines: Lines<ChipSelect, ResetPin, Wakeup, GpioteGate>,
}

/// SPIM0, with the DW3000 as the only device on it
///
/// The SPIM peripheral has to be disabled to change its clock rate, so a
/// rate change frees the driver and creates a new one.
pub struct SpimPort {
    spim: Option<SPIM0>,
    sck: u32,
    mosi: u32,
    miso: u32,
}

impl SpimPort {
    /// Takes ownership of SPIM0 and its pins
    pub fn new(
        spim: SPIM0,
        sck: Pin<Output<PushPull>>,
        mosi: Pin<Output<PushPull>>,
        miso: Pin<Input<Floating>>,
    ) -> Self {
        SpimPort {
            spim: Some(spim),
            sck: sck.psel_bits(),
            mosi: mosi.psel_bits(),
            miso: miso.psel_bits(),
        }
    }

    /// Returns SPIM0, if it isn't in use
    pub fn free(self) -> Option<SPIM0> {
        self.spim
    }
}

/// Returns the highest SPIM clock rate not above `hz`
fn frequency(hz: u32) -> Frequency {
    match hz {
        hz if hz >= 8_000_000 => Frequency::M8,
        hz if hz >= 4_000_000 => Frequency::M4,
        hz if hz >= 2_000_000 => Frequency::M2,
        hz if hz >= 1_000_000 => Frequency::M1,
        hz if hz >= 500_000 => Frequency::K500,
        hz if hz >= 250_000 => Frequency::K250,
        _ => Frequency::K125,
    }
}

/// SPIM0 is in use, or was lost
#[derive(Debug)]
pub struct SpimBusy;

impl SpiPort for SpimPort {
    type Device = Spim<SPIM0>;
    type Error = SpimBusy;

    fn attach(&mut self, hz: u32) -> Result<Self::Device, Self::Error> {
        let spim = self.spim.take().ok_or(SpimBusy)?;

        // Safety: The pins were handed to `new`, and are only used by SPIM0.
        let pins = unsafe {
            spim::Pins {
                sck: Pin::from_psel_bits(self.sck),
                mosi: Some(Pin::from_psel_bits(self.mosi)),
                miso: Some(Pin::from_psel_bits(self.miso)),
            }
        };

        Ok(Spim::new(spim, pins, frequency(hz), spim::MODE_0, 0))
    }

    fn detach(&mut self, device: Self::Device) {
        self.spim = Some(device.free());
    }

    fn max_safe_hz(&self) -> u32 {
        8_000_000
    }
}

/// The DW3000's RSTn line (P0.18 on the nRF52)
///
/// Floats while released, since the DW3000 drives it itself.
pub struct ResetPin(Option<Reset>);

enum Reset {
    Released(P0_18<Input<Floating>>),
    Asserted(P0_18<Output<OpenDrain>>),
}

impl ResetPin {
    /// Create a new instance of the RSTn line
    pub fn new<Mode>(p0_18: P0_18<Mode>) -> Self {
        ResetPin(Some(Reset::Released(p0_18.into_floating_input())))
    }
}

impl ResetLine for ResetPin {
    type Error = Infallible;

    fn assert(&mut self) -> Result<(), Self::Error> {
        // This whole `Option` thing is a bit of a hack. What we actually need
        // here is the ability to put the pin into a tri-state mode that allows
        // us to switch input/output on the fly.
        self.0 = self.0.take().map(|reset| match reset {
            // The reset pin may only be pulled low using open-drain, and must
            // never be pulled high.
            Reset::Released(pin) => Reset::Asserted(
                pin.into_open_drain_output(OpenDrainConfig::Standard0Disconnect1, Level::Low),
            ),
            asserted => asserted,
        });
        Ok(())
    }

    fn release(&mut self) -> Result<(), Self::Error> {
        self.0 = self.0.take().map(|reset| match reset {
            Reset::Asserted(pin) => Reset::Released(pin.into_floating_input()),
            released => released,
        });
        Ok(())
    }

    fn is_released(&self) -> Result<bool, Self::Error> {
        match &self.0 {
            Some(Reset::Released(pin)) => Ok(pin.is_high().unwrap_or(false)),
            _ => Ok(false),
        }
    }
}

/// The DW3000's IRQ line (P0.19 on the nRF52), on GPIOTE channel 0
pub struct GpioteGate {
    gpiote: GPIOTE,
    pin: P0_19<Input<PullDown>>,
}

impl GpioteGate {
    /// Takes ownership of GPIOTE and the IRQ pin
    ///
    /// IRQ is active high, so the pin is pulled down.
    pub fn new<Mode>(gpiote: GPIOTE, p0_19: P0_19<Mode>) -> Self {
        GpioteGate {
            gpiote,
            pin: p0_19.into_pulldown_input(),
        }
    }

    /// Returns GPIOTE and the IRQ pin
    pub fn free(self) -> (GPIOTE, P0_19<Input<PullDown>>) {
        (self.gpiote, self.pin)
    }
}

impl InterruptGate for GpioteGate {
    type Error = Infallible;

    fn listen(&mut self) -> Result<(), Self::Error> {
        self.gpiote.config[0].write(|w| {
            let w = w.mode().event().polarity().lo_to_hi();

            unsafe { w.psel().bits(19) }
        });
        self.acknowledge();

        // Safe, as the handler only touches the DW3000 through the device
        // lock.
        unsafe {
            nrf52::NVIC::unmask(Interrupt::GPIOTE);
        }
        Ok(())
    }

    fn unlisten(&mut self) {
        nrf52::NVIC::mask(Interrupt::GPIOTE);
        self.gpiote.intenclr.write(|w| w.in0().clear());
        self.gpiote.config[0].write(|w| w.mode().disabled());
        self.acknowledge();
    }

    fn enable(&mut self) {
        self.gpiote.intenset.write(|w| w.in0().set());
    }

    fn disable(&mut self) {
        self.gpiote.intenclr.write(|w| w.in0().clear());
    }

    fn is_enabled(&self) -> bool {
        self.gpiote.intenset.read().in0().is_enabled()
    }

    fn is_asserted(&self) -> bool {
        self.pin.is_high().unwrap_or(false)
    }

    fn acknowledge(&mut self) {
        self.gpiote.events_in[0].write(|w| unsafe { w.bits(0) });
    }
}
