//! Brings up the DW3000 and reads its DEV_ID register
//!
//! Reads DEV_ID at the slow rate, switches to the fast rate, and reads it
//! again. Both reads should yield the DW3000's ID.

#![no_main]
#![no_std]

extern crate panic_semihosting;

use cortex_m_semihosting::hprintln;
use dwm3000evb::{
    dw3000_port::{DriverPort, Status, Strategy},
    DWM3000EVB,
};

// Short read of register file 0x00, offset 0.
const DEV_ID: [u8; 1] = [0x00];

#[cortex_m_rt::entry]
fn main() -> ! {
    dwm3000evb::logger::init(log::LevelFilter::Info).unwrap();

    let board = DWM3000EVB::take().unwrap();
    let mut dw3000 =
        dwm3000evb::init_dw3000(board.DW3000, board.delay, Strategy::InterruptGate)
            .expect("Failed to initialize DW3000");

    let mut id = [0; 4];
    let result = dw3000.read_from_spi(&DEV_ID, &mut id);
    hprintln!("slow: {:?} {:02x?}", Status::from_result(&result), id).unwrap();

    dw3000.set_fast_rate().expect("Failed to switch to fast rate");

    let mut id = [0; 4];
    let result = dw3000.read_from_spi(&DEV_ID, &mut id);
    hprintln!("fast: {:?} {:02x?}", Status::from_result(&result), id).unwrap();

    // RIDTAG 0xDECA, model 0x03
    assert_eq!(u32::from_le_bytes(id) >> 8, 0xDECA03);

    loop {}
}
