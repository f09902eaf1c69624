//! Platform port for the Qorvo DW3000 UWB transceiver driver
//!
//! The DW3000 vendor driver does not talk to hardware itself. It expects the
//! platform to provide a small set of functions: SPI reads and writes framed
//! as header + body, a mutex that keeps the transceiver's own interrupt from
//! starting a competing transaction, a way to wake the chip up, and delays.
//! This crate provides those functions on top of [`embedded-hal`] traits.
//!
//! The entry point is [`DW3000Hw`], which owns the SPI bus, the chip select
//! line, the optional reset, wakeup and interrupt lines, and a delay. It
//! implements [`DriverPort`], the call table handed to the vendor driver
//! integration.
//!
//! The platform plugs in through three small traits in addition to the
//! `embedded-hal` ones:
//!
//! - [`SpiPort`], which attaches the transceiver to the bus at a given clock
//!   rate and detaches it again;
//! - [`ResetLine`], for the open-drain RSTn line;
//! - [`InterruptGate`], for the interrupt line and its mask at the interrupt
//!   controller.
//!
//! [`embedded-hal`]: https://crates.io/crates/embedded-hal

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

pub mod config;
pub mod crc;
pub mod delay;
pub mod error;
pub mod gpio;
pub mod hw;
pub mod irq;
pub mod lock;
pub mod port;
pub mod spi;

#[cfg(any(test, feature = "trace"))]
pub mod trace;

#[cfg(test)]
mod mock;

pub use crate::{
    config::HwConfig,
    error::{Error, Line},
    gpio::{ResetLine, RESET_POLL_LIMIT},
    hw::{InitError, Lines, NoPin, DW3000Hw},
    irq::InterruptGate,
    lock::{LockToken, Strategy},
    port::{DriverPort, Status},
    spi::{Speed, SpiPort, SLOW_HZ, WRITE_BUFFER_LEN},
};
