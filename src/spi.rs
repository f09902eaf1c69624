//! SPI transport
//!
//! Moves header + body transactions over the bus, keeping chip select
//! asserted for the whole logical transaction. The DW3000 frames every access
//! as a header (register address and access mode) followed by the body, and
//! it needs both on the wire back to back.
//!
//! Writes are copied into one contiguous [`Frame`] and sent as a single
//! transfer. Some SPI controllers corrupt data when chip select is held across
//! two discrete transfers with driver overhead in between, so this is the only
//! write path. Reads can't avoid two phases, since the header has to be sent
//! before anything can be received, so chip select is held manually across
//! both.
//!
//! This module does not lock. [`DW3000Hw`] takes the device lock around every
//! call into [`Bus`].
//!
//! [`DW3000Hw`]: ../hw/struct.DW3000Hw.html

use core::fmt;

use embedded_hal::{
    blocking::{
        delay::DelayUs,
        spi::{Transfer, Write},
    },
    digital::v2::OutputPin,
};
use heapless::Vec;
use log::{error, warn};

#[cfg(any(test, feature = "trace"))]
use crate::trace::{Direction, Trace};

/// The slow SPI clock, used until the DW3000 is known to be up
pub const SLOW_HZ: u32 = 2_000_000;

/// Size of the scratch buffer a write is assembled in
///
/// Header, body and (for CRC writes) the CRC byte must fit together.
pub const WRITE_BUFFER_LEN: usize = 100;

/// The two bus clock rates the driver switches between
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Speed {
    /// [`SLOW_HZ`]
    Slow,

    /// The configured maximum, capped at the platform's safe ceiling
    Fast,
}

/// The platform's side of the SPI bus
///
/// A platform implements this to hand out a device handle for the DW3000 at a
/// given clock rate. Changing the rate goes through [`detach`] and
/// [`attach`], never through a handle that is in use.
///
/// [`attach`]: #tymethod.attach
/// [`detach`]: #tymethod.detach
pub trait SpiPort {
    /// A handle to the DW3000 on the bus
    ///
    /// Chip select is not part of the handle, it is driven separately.
    type Device: Write<u8> + Transfer<u8>;

    /// Error returned when the bus can't be claimed or configured
    type Error;

    /// Claims the bus and attaches the DW3000 at `hz`
    fn attach(&mut self, hz: u32) -> Result<Self::Device, Self::Error>;

    /// Detaches the DW3000 again
    fn detach(&mut self, device: Self::Device);

    /// Highest clock rate the platform's bus routing transfers reliably
    fn max_safe_hz(&self) -> u32;

    /// Releases the bus after the last detach
    fn release(&mut self) {}
}

/// Returns the fast clock rate for a configured maximum
///
/// The rate is capped at `ceiling`. That is logged, since a configuration
/// asking for more than the platform can do is worth knowing about.
pub fn fast_clock_hz(max_hz: u32, ceiling: u32) -> u32 {
    if max_hz > ceiling {
        warn!(
            "SPI max {} Hz exceeds the safe {} Hz of this platform, using {} Hz",
            max_hz, ceiling, ceiling,
        );
        ceiling
    } else {
        max_hz
    }
}

/// A write transaction, assembled into one contiguous buffer
pub struct Frame {
    bytes: Vec<u8, WRITE_BUFFER_LEN>,
    header_len: usize,
    body_len: usize,
}

impl Frame {
    /// Assembles header followed by body
    pub fn new(header: &[u8], body: &[u8]) -> Result<Self, FrameTooLong> {
        Self::assemble(header, body, None)
    }

    /// Assembles header, body and a trailing CRC byte
    ///
    /// The DW3000 checks the CRC against the header and body when its SPI CRC
    /// mode is enabled. [`crc::crc8`] computes it.
    ///
    /// [`crc::crc8`]: ../crc/fn.crc8.html
    pub fn with_crc(header: &[u8], body: &[u8], crc8: u8) -> Result<Self, FrameTooLong> {
        Self::assemble(header, body, Some(crc8))
    }

    fn assemble(header: &[u8], body: &[u8], crc8: Option<u8>) -> Result<Self, FrameTooLong> {
        let too_long = FrameTooLong {
            len: header.len() + body.len() + crc8.is_some() as usize,
            max: WRITE_BUFFER_LEN,
        };

        let mut bytes = Vec::new();
        bytes.extend_from_slice(header).map_err(|()| too_long)?;
        bytes.extend_from_slice(body).map_err(|()| too_long)?;
        if let Some(crc8) = crc8 {
            bytes.push(crc8).map_err(|_| too_long)?;
        }

        Ok(Frame {
            bytes,
            header_len: header.len(),
            body_len: body.len(),
        })
    }

    /// The header bytes
    pub fn header(&self) -> &[u8] {
        &self.bytes[..self.header_len]
    }

    /// The body bytes, without the CRC
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.header_len..self.header_len + self.body_len]
    }

    /// Everything that goes on the wire
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A write did not fit into [`WRITE_BUFFER_LEN`]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameTooLong {
    /// Length the frame would have had
    pub len: usize,

    /// Length of the scratch buffer
    pub max: usize,
}

/// An open channel to the DW3000
///
/// Owns the [`SpiPort`], so there is exactly one `Bus` per SPI peripheral.
/// Created detached by [`Bus::new`], attached by [`Bus::init`] and consumed
/// by [`Bus::fini`].
pub struct Bus<P, CS>
where
    P: SpiPort,
{
    port: P,
    device: Option<P::Device>,
    chip_select: CS,
    hz: u32,
    fast_hz: u32,
    #[cfg(any(test, feature = "trace"))]
    trace: Trace,
}

impl<P, CS> Bus<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    /// Takes ownership of the bus and chip select, without touching either
    ///
    /// `max_hz` is the clock the wiring supports. It becomes the fast rate,
    /// capped at [`SpiPort::max_safe_hz`].
    pub fn new(port: P, chip_select: CS, max_hz: u32) -> Self {
        let fast_hz = fast_clock_hz(max_hz, port.max_safe_hz());

        Bus {
            port,
            device: None,
            chip_select,
            hz: SLOW_HZ,
            fast_hz,
            #[cfg(any(test, feature = "trace"))]
            trace: Trace::new(),
        }
    }

    /// Attaches the DW3000 at [`SLOW_HZ`]
    ///
    /// If this fails the bus stays detached, and [`Bus::fini`] hands the
    /// parts back.
    pub fn init(&mut self) -> Result<(), Error<P, CS>> {
        // Chip select goes inactive before the first clock edge, otherwise the
        // DW3000 may see a glitch.
        self.chip_select.set_high().map_err(Error::ChipSelect)?;

        if let Some(device) = self.device.take() {
            self.port.detach(device);
        }

        let device = self.port.attach(SLOW_HZ).map_err(|err| {
            error!("SPI init failed");
            Error::Bus(err)
        })?;

        self.device = Some(device);
        self.hz = SLOW_HZ;
        Ok(())
    }

    /// Switches the clock rate
    ///
    /// The DW3000 is detached and attached again at the new rate. If the
    /// attach fails the bus stays detached, and every transfer fails with
    /// [`Error::Detached`] until a later call succeeds.
    pub fn set_speed(&mut self, speed: Speed) -> Result<(), Error<P, CS>> {
        let hz = match speed {
            Speed::Slow => SLOW_HZ,
            Speed::Fast => self.fast_hz,
        };

        if let Some(device) = self.device.take() {
            self.port.detach(device);
        }

        match self.port.attach(hz) {
            Ok(device) => {
                self.device = Some(device);
                self.hz = hz;
                Ok(())
            }
            Err(err) => {
                error!("Set SPI speed error ({} Hz)", hz);
                Err(Error::Bus(err))
            }
        }
    }

    /// The clock rate the DW3000 is attached at, if it is attached
    pub fn clock_hz(&self) -> Option<u32> {
        self.device.as_ref().map(|_| self.hz)
    }

    /// The rate [`Speed::Fast`] selects
    pub fn fast_hz(&self) -> u32 {
        self.fast_hz
    }

    /// Sends a frame in one transfer, framed by chip select
    pub fn transmit(&mut self, frame: &Frame) -> Result<(), Error<P, CS>> {
        let device = self.device.as_mut().ok_or(Error::Detached)?;

        #[cfg(any(test, feature = "trace"))]
        self.trace
            .record(Direction::Write, frame.header(), frame.body());

        self.chip_select.set_low().map_err(Error::ChipSelect)?;
        let result = device.write(frame.as_bytes()).map_err(Error::Write);
        let deassert = self.chip_select.set_high().map_err(Error::ChipSelect);

        if result.is_err() {
            error!("SPI write error");
        }

        result.and(deassert)
    }

    /// Sends `header`, then fills `buffer` from the DW3000
    ///
    /// Chip select stays low from before the header until after the last
    /// byte is received. `buffer` is zeroed first, since its contents are
    /// clocked out while receiving.
    pub fn read(&mut self, header: &[u8], buffer: &mut [u8]) -> Result<(), Error<P, CS>> {
        let device = self.device.as_mut().ok_or(Error::Detached)?;

        for byte in buffer.iter_mut() {
            *byte = 0;
        }

        self.chip_select.set_low().map_err(Error::ChipSelect)?;
        let result = match device.write(header) {
            Ok(()) => device
                .transfer(buffer)
                .map(|_| ())
                .map_err(Error::Transfer),
            Err(err) => Err(Error::Write(err)),
        };
        let deassert = self.chip_select.set_high().map_err(Error::ChipSelect);

        match result {
            Ok(()) => {
                #[cfg(any(test, feature = "trace"))]
                self.trace.record(Direction::Read, header, buffer);
            }
            Err(_) => error!("SPI read error"),
        }

        result.and(deassert)
    }

    /// Holds chip select low for `us` microseconds
    ///
    /// Used to wake the DW3000 up when there is no WAKEUP line.
    pub fn pulse_chip_select<D>(&mut self, delay: &mut D, us: u32) -> Result<(), Error<P, CS>>
    where
        D: DelayUs<u32>,
    {
        self.chip_select.set_low().map_err(Error::ChipSelect)?;
        delay.delay_us(us);
        self.chip_select.set_high().map_err(Error::ChipSelect)
    }

    /// The transaction trace
    #[cfg(feature = "trace")]
    pub fn trace(&mut self) -> &mut Trace {
        &mut self.trace
    }

    /// Detaches the DW3000, releases the bus, and returns its parts
    pub fn fini(mut self) -> (P, CS) {
        if let Some(device) = self.device.take() {
            self.port.detach(device);
        }
        self.port.release();

        (self.port, self.chip_select)
    }
}

/// An error that can occur when communicating with the DW3000 over SPI
pub enum Error<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    /// The bus could not be claimed or configured
    Bus(P::Error),

    /// SPI error occured during a write
    Write(<P::Device as Write<u8>>::Error),

    /// SPI error occured during a receive
    Transfer(<P::Device as Transfer<u8>>::Error),

    /// Error occured while changing the chip select signal
    ChipSelect(CS::Error),

    /// The transaction does not fit into the write buffer
    ///
    /// Nothing was sent.
    TooLong {
        /// Length the transaction would have had
        len: usize,

        /// Length of the write buffer
        max: usize,
    },

    /// The DW3000 is not attached, since a speed change failed
    Detached,
}

impl<P, CS> From<FrameTooLong> for Error<P, CS>
where
    P: SpiPort,
    CS: OutputPin,
{
    fn from(error: FrameTooLong) -> Self {
        Error::TooLong {
            len: error.len,
            max: error.max,
        }
    }
}

// We can't derive this implementation, as the compiler will complain that the
// associated error types don't implement `Debug`.
impl<P, CS> fmt::Debug for Error<P, CS>
where
    P: SpiPort,
    P::Error: fmt::Debug,
    <P::Device as Write<u8>>::Error: fmt::Debug,
    <P::Device as Transfer<u8>>::Error: fmt::Debug,
    CS: OutputPin,
    CS::Error: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bus(error) => write!(f, "Bus({:?})", error),
            Error::Write(error) => write!(f, "Write({:?})", error),
            Error::Transfer(error) => write!(f, "Transfer({:?})", error),
            Error::ChipSelect(error) => write!(f, "ChipSelect({:?})", error),
            Error::TooLong { len, max } => {
                write!(f, "TooLong {{ len: {:?}, max: {:?} }}", len, max)
            }
            Error::Detached => write!(f, "Detached"),
        }
    }
}
