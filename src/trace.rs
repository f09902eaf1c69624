//! SPI transaction trace
//!
//! Records a short summary of every transaction the bus performs, for
//! debugging the vendor driver's register accesses. Recording is cheap enough
//! to leave on while the radio runs; printing happens later, in [`Trace::drain`].
//!
//! The trace never affects a transaction's outcome.

use core::{convert::TryFrom, fmt, mem};

use heapless::Vec;
use log::{error, info};
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// Number of entries the trace holds before it starts dropping
pub const TRACE_LEN: usize = 256;

/// Header bytes kept per entry
pub const TRACE_HEADER_LEN: usize = 2;

/// Body bytes kept per entry
pub const TRACE_BODY_LEN: usize = 12;

/// Direction of a traced transaction
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Direction {
    /// Header sent, body received
    Read,

    /// Header and body sent
    Write,
}

/// One traced transaction
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Read or write
    pub direction: Direction,

    /// The first bytes of the header
    pub header: [u8; TRACE_HEADER_LEN],

    /// Valid bytes in `header`
    pub header_len: u8,

    /// The first bytes of the body
    pub body: [u8; TRACE_BODY_LEN],

    /// Valid bytes in `body`
    pub body_len: u8,
}

impl TraceEntry {
    /// The header bytes that were kept
    pub fn header(&self) -> &[u8] {
        &self.header[..self.header_len as usize]
    }

    /// The body bytes that were kept
    pub fn body(&self) -> &[u8] {
        &self.body[..self.body_len as usize]
    }

    /// Decodes the header
    pub fn access(&self) -> Access {
        Access::decode(self.header())
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let direction = match self.direction {
            Direction::Read => "READ",
            Direction::Write => "WRITE",
        };
        write!(f, "SPI {} {}", direction, self.access())
    }
}

/// Which bytes of a register a masked write modifies
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum WriteMask {
    /// Plain write
    None = 0b00,

    /// 8-bit AND/OR mask
    Bits8 = 0b01,

    /// 16-bit AND/OR mask
    Bits16 = 0b10,

    /// 32-bit AND/OR mask
    Bits32 = 0b11,
}

/// Access mode, encoded in the header's mode bits
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AccessMode {
    /// Fast command, a single header byte
    FastCommand,

    /// Short-addressed write, no sub-address
    ShortWrite,

    /// Short-addressed read, no sub-address
    ShortRead,

    /// Full-addressed read
    FullRead,

    /// Full-addressed write, possibly masked
    FullWrite(WriteMask),

    /// None of the above
    Unknown,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AccessMode::FastCommand => "fast",
            AccessMode::ShortWrite => "short write",
            AccessMode::ShortRead => "short read",
            AccessMode::FullRead => "full read",
            AccessMode::FullWrite(WriteMask::None) => "full write",
            AccessMode::FullWrite(WriteMask::Bits8) => "masked 8bit",
            AccessMode::FullWrite(WriteMask::Bits16) => "masked 16bit",
            AccessMode::FullWrite(WriteMask::Bits32) => "masked 32bit",
            AccessMode::Unknown => "-unk-",
        };
        f.write_str(s)
    }
}

/// A decoded transaction header
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Access {
    /// Register file ID
    pub register: u8,

    /// Offset within the register file, zero for one-byte headers
    pub sub_address: u8,

    /// Access mode
    pub mode: AccessMode,
}

impl Access {
    /// Decodes a header as the DW3000 interprets it
    pub fn decode(header: &[u8]) -> Self {
        let h0 = header.first().copied().unwrap_or(0);
        let h1 = header.get(1).copied();

        let register = (h0 & 0x3e) >> 1;
        let sub_address = match h1 {
            Some(h1) => ((h1 & 0xfc) >> 2) | ((h0 & 0x01) << 6),
            None => 0,
        };

        let mode = match h0 & 0xc1 {
            0x81 => AccessMode::FastCommand,
            0x80 => AccessMode::ShortWrite,
            0x00 => AccessMode::ShortRead,
            mode if mode & 0xc0 == 0x40 => AccessMode::FullRead,
            mode if mode & 0xc0 == 0xc0 => {
                match WriteMask::try_from(h1.unwrap_or(0) & 0x03) {
                    Ok(mask) => AccessMode::FullWrite(mask),
                    Err(_) => AccessMode::Unknown,
                }
            }
            _ => AccessMode::Unknown,
        };

        Access {
            register,
            sub_address,
            mode,
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X} ({})",
            self.register, self.sub_address, self.mode
        )
    }
}

/// A bounded record of SPI transactions
pub struct Trace {
    entries: Vec<TraceEntry, TRACE_LEN>,
    overflowed: bool,
    dropped: u32,
}

impl Trace {
    /// Creates an empty trace
    pub fn new() -> Self {
        Trace {
            entries: Vec::new(),
            overflowed: false,
            dropped: 0,
        }
    }

    /// Records a transaction
    ///
    /// Headers longer than [`TRACE_HEADER_LEN`] are unexpected and logged;
    /// long bodies are cut to [`TRACE_BODY_LEN`] without comment. Once full,
    /// further entries are dropped until the trace is drained.
    pub fn record(&mut self, direction: Direction, header: &[u8], body: &[u8]) {
        if self.entries.is_full() {
            if !self.overflowed {
                error!("SPI trace full, dropping entries");
                self.overflowed = true;
            }
            self.dropped = self.dropped.saturating_add(1);
            return;
        }

        if header.len() > TRACE_HEADER_LEN {
            error!("SPI trace: header length {}", header.len());
        }

        let mut entry = TraceEntry {
            direction,
            header: [0; TRACE_HEADER_LEN],
            header_len: 0,
            body: [0; TRACE_BODY_LEN],
            body_len: 0,
        };

        let header_len = header.len().min(TRACE_HEADER_LEN);
        entry.header[..header_len].copy_from_slice(&header[..header_len]);
        entry.header_len = header_len as u8;

        let body_len = body.len().min(TRACE_BODY_LEN);
        entry.body[..body_len].copy_from_slice(&body[..body_len]);
        entry.body_len = body_len as u8;

        // Can't fail, fullness was checked above.
        let _ = self.entries.push(entry);
    }

    /// The recorded entries, oldest first
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Number of entries dropped since the last drain
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Logs every entry, then empties the trace
    pub fn drain(&mut self) {
        info!("--- SPI DBG START");
        for entry in &self.entries {
            if entry.body_len > 0 {
                info!("{}: {:02X?}", entry, entry.body());
            } else {
                info!("{}", entry);
            }
        }
        if self.dropped > 0 {
            info!("--- {} entries dropped", self.dropped);
        }
        info!("--- SPI DBG END");

        self.clear();
    }

    /// Empties the trace without logging
    pub fn clear(&mut self) {
        self.entries.clear();
        self.overflowed = false;
        self.dropped = 0;
    }

    /// Serializes the entries into `buf`, oldest first
    ///
    /// Returns the number of bytes written. Each entry can be read back with
    /// `ssmarshal::deserialize::<TraceEntry>`.
    pub fn export(&self, buf: &mut [u8]) -> Result<usize, ssmarshal::Error> {
        let mut written = 0;

        for entry in &self.entries {
            let rest = buf.get_mut(written..).ok_or(ssmarshal::Error::EndOfStream)?;

            // ssmarshal panics in debug builds when it runs out of space. An
            // entry never takes more than its in-memory size.
            if rest.len() < mem::size_of::<TraceEntry>() {
                return Err(ssmarshal::Error::EndOfStream);
            }
            written += ssmarshal::serialize(rest, entry)?;
        }

        Ok(written)
    }
}

impl Default for Trace {
    fn default() -> Self {
        Self::new()
    }
}
