//! The vendor driver's call table
//!
//! The DW3000 vendor driver reaches the hardware through a fixed set of
//! functions: SPI access, the interrupt "mutex", wakeup, and sleeps.
//! [`DriverPort`] is that set. The integration layer is handed one
//! implementation at startup and forwards every driver callback to it;
//! [`Status`] is the integer form results take across that boundary.

use embedded_hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::OutputPin,
};
use num_enum::IntoPrimitive;

use crate::{
    error::Error,
    gpio::ResetLine,
    hw::DW3000Hw,
    irq::InterruptGate,
    lock::LockToken,
    spi::{Speed, SpiPort},
};

/// The functions the vendor driver calls into
pub trait DriverPort {
    /// Error returned by the fallible calls
    type Error;

    /// Sends `header`, then fills `buffer` (`readfromspi`)
    fn read_from_spi(&mut self, header: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Sends `header` followed by `body` (`writetospi`)
    fn write_to_spi(&mut self, header: &[u8], body: &[u8]) -> Result<(), Self::Error>;

    /// Sends `header`, `body` and `crc8` (`writetospiwithcrc`)
    fn write_to_spi_with_crc(
        &mut self,
        header: &[u8],
        body: &[u8],
        crc8: u8,
    ) -> Result<(), Self::Error>;

    /// Switches to the slow SPI clock (`setslowrate`)
    fn set_slow_rate(&mut self) -> Result<(), Self::Error>;

    /// Switches to the fast SPI clock (`setfastrate`)
    fn set_fast_rate(&mut self) -> Result<(), Self::Error>;

    /// Wakes the DW3000 from sleep (`wakeup_device_with_io`)
    fn wakeup_device_with_io(&mut self) -> Result<(), Self::Error>;

    /// Keeps the DW3000's interrupt handler out (`decamutexon`)
    fn mutex_on(&mut self) -> LockToken;

    /// Lets the interrupt handler back in (`decamutexoff`)
    fn mutex_off(&mut self, token: LockToken);

    /// Blocks for `ms` milliseconds (`deca_sleep`)
    fn sleep_ms(&mut self, ms: u32);

    /// Blocks for `us` microseconds (`deca_usleep`)
    fn sleep_us(&mut self, us: u32);
}

impl<P, CS, RST, WAKE, G, D> DriverPort for DW3000Hw<P, CS, RST, WAKE, G, D>
where
    P: SpiPort,
    CS: OutputPin,
    RST: ResetLine,
    WAKE: OutputPin,
    G: InterruptGate,
    D: DelayMs<u32> + DelayUs<u32>,
{
    type Error = Error<P, CS>;

    fn read_from_spi(&mut self, header: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.read(header, buffer)
    }

    fn write_to_spi(&mut self, header: &[u8], body: &[u8]) -> Result<(), Self::Error> {
        self.write(header, body)
    }

    fn write_to_spi_with_crc(
        &mut self,
        header: &[u8],
        body: &[u8],
        crc8: u8,
    ) -> Result<(), Self::Error> {
        self.write_with_crc(header, body, crc8)
    }

    fn set_slow_rate(&mut self) -> Result<(), Self::Error> {
        self.set_speed(Speed::Slow)
    }

    fn set_fast_rate(&mut self) -> Result<(), Self::Error> {
        self.set_speed(Speed::Fast)
    }

    fn wakeup_device_with_io(&mut self) -> Result<(), Self::Error> {
        self.wakeup()
    }

    fn mutex_on(&mut self) -> LockToken {
        self.lock()
    }

    fn mutex_off(&mut self, token: LockToken) {
        self.unlock(token)
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.delay_ms(ms)
    }

    fn sleep_us(&mut self, us: u32) {
        self.delay_us(us)
    }
}

/// Result of a driver call, as the vendor driver expects it
///
/// Converts into the driver's `DWT_SUCCESS`/`DWT_ERROR` integers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive)]
#[repr(i32)]
pub enum Status {
    /// The call succeeded
    Success = 0,

    /// The call failed
    Error = -1,
}

impl Status {
    /// Maps a result to its status
    pub fn from_result<T, E>(result: &Result<T, E>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(_) => Status::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        hw::Lines,
        lock::Strategy,
        mock::{Event, MockDelay, MockGate, MockPin, MockPort, MockReset, Rig},
        spi::SLOW_HZ,
        HwConfig,
    };

    fn port(rig: &Rig) -> impl DriverPort<Error = Error<MockPort, MockPin>> {
        let hw: DW3000Hw<MockPort, MockPin, MockReset, MockPin, MockGate, MockDelay> =
            DW3000Hw::init(
                rig.port_with_data(20_000_000, &[0x03, 0x03, 0xca, 0xde]),
                Lines {
                    chip_select: rig.chip_select(),
                    reset: Some(rig.reset(Some(0))),
                    wakeup: Some(rig.wakeup()),
                    irq: Some(rig.gate(true, 0)),
                },
                rig.delay(),
                HwConfig {
                    reset_pin: Some(24),
                    wakeup_pin: Some(23),
                    irq_pin: Some(19),
                    spi_cs_pin: 17,
                    spi_clk_pin: 16,
                    spi_miso_pin: 18,
                    spi_mosi_pin: 20,
                    spi_max_mhz: 38,
                },
                Strategy::InterruptGate,
            )
            .unwrap();
        hw
    }

    #[test]
    fn status_codes() {
        assert_eq!(i32::from(Status::Success), 0);
        assert_eq!(i32::from(Status::Error), -1);

        assert_eq!(Status::from_result(&Ok::<_, ()>(5)), Status::Success);
        assert_eq!(Status::from_result(&Err::<(), _>("nope")), Status::Error);
    }

    #[test]
    fn reads_device_id() {
        let rig = Rig::new();
        let mut port = port(&rig);

        let mut id = [0; 4];
        let result = port.read_from_spi(&[0x00], &mut id);

        assert_eq!(Status::from_result(&result), Status::Success);
        assert_eq!(id, [0x03, 0x03, 0xca, 0xde]);
    }

    #[test]
    fn rates_are_capped_at_the_platform_ceiling() {
        let rig = Rig::new();
        let mut port = port(&rig);
        rig.clear();

        port.set_fast_rate().unwrap();
        port.set_slow_rate().unwrap();

        assert_eq!(
            rig.bus_events(),
            [Event::Attach(20_000_000), Event::Attach(SLOW_HZ)]
        );
    }

    #[test]
    fn oversized_write_maps_to_error_status() {
        let rig = Rig::new();
        let mut port = port(&rig);

        let result = port.write_to_spi(&[0xc0, 0x00], &[0; 99]);
        assert_eq!(Status::from_result(&result), Status::Error);

        let result = port.write_to_spi_with_crc(&[0xc0, 0x00], &[0; 97], 0x00);
        assert_eq!(Status::from_result(&result), Status::Success);
    }

    #[test]
    fn mutex_masks_the_interrupt() {
        let rig = Rig::new();
        let mut port = port(&rig);
        rig.clear();

        let token = port.mutex_on();
        port.mutex_off(token);

        assert_eq!(rig.events(), [Event::IrqDisable, Event::IrqEnable]);
    }

    #[test]
    fn sleeps_and_wakeup() {
        let rig = Rig::new();
        let mut port = port(&rig);
        rig.clear();

        port.sleep_ms(5);
        port.sleep_us(10);
        port.wakeup_device_with_io().unwrap();

        assert_eq!(
            rig.events(),
            [
                Event::DelayMs(5),
                Event::DelayUs(10),
                Event::Wakeup(true),
                Event::DelayUs(500),
                Event::Wakeup(false),
                Event::DelayMs(1),
            ]
        );
    }
}
