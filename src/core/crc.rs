//! CRC16 used by every SSP frame and by the encrypted envelope.
//!
//! Polynomial 0x8005, seed 0xFFFF, processed MSB first with no reflection and
//! no final XOR. The result is transmitted low byte first.

/// Seed loaded into the register before the first byte
pub const CRC_SEED: u16 = 0xFFFF;

/// Generator polynomial
pub const CRC_POLY: u16 = 0x8005;

/// Compute the SSP CRC16 over `data`
#[inline]
pub fn crc16(data: &[u8]) -> u16 {
    crc16_with(CRC_SEED, CRC_POLY, data)
}

/// Compute a CRC16 with an explicit seed and polynomial
pub fn crc16_with(seed: u16, poly: u16, data: &[u8]) -> u16 {
    let mut crc = seed;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ poly
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// CRC of `data` as the two bytes that go on the wire (low, high)
#[inline]
pub fn crc16_bytes(data: &[u8]) -> [u8; 2] {
    crc16(data).to_le_bytes()
}
