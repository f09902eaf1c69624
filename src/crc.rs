//! SPI CRC
//!
//! With SPI CRC mode enabled, the DW3000 expects every write to end in a CRC
//! over header and body, and flags a mismatch in its status register.

/// Computes the CRC-8 the DW3000 checks SPI writes against
///
/// Polynomial x^8 + x^2 + x + 1 (0x07), initial value 0, no reflection.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }

    crc
}
