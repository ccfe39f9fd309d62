//! CRC-8 (Maxim/Dallas) over `cnfLine` frames

/// Reflected form of the x^8 + x^5 + x^4 + 1 polynomial
const POLYNOMIAL: u8 = 0x8C;

/// Compute the CRC-8 of a byte slice, initial value 0
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| {
        let mut crc = crc;
        let mut byte = byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= POLYNOMIAL;
            }
            byte >>= 1;
        }
        crc
    })
}
