//! CRC16 integrity code for the piston wire protocol.
//!
//! LSB-first with polynomial `0x8005` and initial value `0xFFFF`. The
//! checksum is the sole integrity guard on a frame, so this must stay
//! bit-exact with every other implementation on the bus. CRC-CCITT
//! (`0x1021`, MSB-first) is *not* interoperable with this protocol.

/// Compute the 16-bit checksum over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0x8005;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_is_initial_value() {
        assert_eq!(crc16(b""), 0xFFFF);
    }

    #[test]
    fn test_check_string() {
        assert_eq!(crc16(b"123456789"), 0x3D7B);
    }

    #[test]
    fn test_single_byte_inputs_differ() {
        assert_ne!(crc16(&[0x00]), crc16(&[0x01]));
        assert_ne!(crc16(&[0x00]), 0xFFFF);
    }

    #[test]
    fn test_bit_flip_sensitivity() {
        let data = b"piston frame prefix";
        let reference = crc16(data);

        for byte_index in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data.to_vec();
                flipped[byte_index] ^= 1 << bit;
                assert_ne!(
                    crc16(&flipped),
                    reference,
                    "flip of byte {} bit {} not detected",
                    byte_index,
                    bit
                );
            }
        }
    }
}
