//! Services DW3000 interrupts from the GPIOTE handler
//!
//! The hardware context is shared with the interrupt handler. The main loop
//! only touches the DW3000 through the call table, which masks the interrupt
//! around every transaction, so the handler never interrupts one.

#![no_main]
#![no_std]

extern crate panic_semihosting;

use core::cell::RefCell;

use cortex_m::interrupt::Mutex;
use cortex_m_semihosting::hprintln;
use dwm3000evb::{
    dw3000_port::{DriverPort, Strategy},
    nrf52832_hal::pac::interrupt,
    DW3000, DWM3000EVB,
};

static SHARED: Mutex<RefCell<Option<DW3000>>> = Mutex::new(RefCell::new(None));

// SYS_STATUS, full read of register file 0x00, offset 0x44. Bit 6 of the
// offset goes into the first byte.
const SYS_STATUS: [u8; 2] = [0x41, 0x04 << 2];

// The same register, full write. Writing a one clears an event bit.
const SYS_STATUS_CLEAR: [u8; 2] = [0xc1, 0x04 << 2];

#[cortex_m_rt::entry]
fn main() -> ! {
    dwm3000evb::logger::init(log::LevelFilter::Info).unwrap();

    let board = DWM3000EVB::take().unwrap();
    let mut dw3000 =
        dwm3000evb::init_dw3000(board.DW3000, board.delay, Strategy::InterruptGate)
            .expect("Failed to initialize DW3000");

    dw3000.init_interrupt().expect("Failed to set up IRQ");
    dw3000.interrupt_enable();

    cortex_m::interrupt::free(|cs| SHARED.borrow(cs).replace(Some(dw3000)));

    loop {
        let mut status = [0; 4];
        cortex_m::interrupt::free(|cs| {
            if let Some(dw3000) = SHARED.borrow(cs).borrow_mut().as_mut() {
                let _ = dw3000.read_from_spi(&SYS_STATUS, &mut status);
            }
        });
        hprintln!("SYS_STATUS: {:02x?}", status).unwrap();

        // About half a second at 64 MHz
        cortex_m::asm::delay(32_000_000);
    }
}

#[interrupt]
fn GPIOTE() {
    cortex_m::interrupt::free(|cs| {
        if let Some(dw3000) = SHARED.borrow(cs).borrow_mut().as_mut() {
            let events = dw3000.service_interrupt(|dw3000| {
                // Stands in for the vendor driver's `dwt_isr`: read the
                // events, then write them back to clear them.
                let mut status = [0; 4];
                if dw3000.read_from_spi(&SYS_STATUS, &mut status).is_ok() {
                    let _ = dw3000.write_to_spi(&SYS_STATUS_CLEAR, &status);
                }
            });
            log::info!("serviced {} DW3000 events", events);
        }
    });
}
