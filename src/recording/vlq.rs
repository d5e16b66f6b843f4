// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI variable-length quantities.
//!
//! Values are written big-endian in 7-bit groups. Every byte except the last
//! has its high bit set. Only the encoding direction exists here; SMF files are
//! written, never read, by this crate.

/// Largest value a 4-byte quantity can hold (2^28 - 1)
pub const MAX_VALUE: u32 = 0x0FFF_FFFF;

/// Number of bytes needed to encode `value` (1..=4 for in-range values)
fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=MAX_VALUE => 4,
        _ => 5,
    }
}

/// Encode `value` into a fixed array, returning the array and the used length.
///
/// Values above [`MAX_VALUE`] keep their low 28 bits plus the two highest bits
/// in a fifth leading byte, which is what a plain shift-and-mask encoder does.
pub fn encode(value: u32) -> ([u8; 5], usize) {
    let len = encoded_len(value);
    let mut bytes = [0u8; 5];
    for (i, byte) in bytes[..len].iter_mut().enumerate() {
        let shift = 7 * (len - 1 - i);
        *byte = ((value >> shift) & 0x7F) as u8;
        if i + 1 < len {
            *byte |= 0x80;
        }
    }
    (bytes, len)
}

/// Append the encoding of `value` to a byte buffer. Returns the number of bytes added.
pub fn encode_into(buffer: &mut Vec<u8>, value: u32) -> usize {
    let (bytes, len) = encode(value);
    buffer.extend_from_slice(&bytes[..len]);
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> u32 {
        bytes
            .iter()
            .fold(0u32, |acc, b| (acc << 7) | (*b & 0x7F) as u32)
    }

    fn encoded(value: u32) -> Vec<u8> {
        let mut buffer = Vec::new();
        encode_into(&mut buffer, value);
        buffer
    }

    #[test]
    fn test_known_values() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(0x40), vec![0x40]);
        assert_eq!(encoded(0x7F), vec![0x7F]);
        assert_eq!(encoded(0x80), vec![0x81, 0x00]);
        assert_eq!(encoded(480), vec![0x83, 0x60]);
        assert_eq!(encoded(0x2000), vec![0xC0, 0x00]);
        assert_eq!(encoded(0x3FFF), vec![0xFF, 0x7F]);
        assert_eq!(encoded(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encoded(0x1F_FFFF), vec![0xFF, 0xFF, 0x7F]);
        assert_eq!(encoded(0x20_0000), vec![0x81, 0x80, 0x80, 0x00]);
        assert_eq!(encoded(MAX_VALUE), vec![0xFF, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_decodes_back_with_minimum_length() {
        let mut value = 1u32;
        let mut samples = vec![0u32];
        while value <= MAX_VALUE {
            samples.extend([value - 1, value, value + 1]);
            value = value.saturating_mul(3);
        }
        samples.push(MAX_VALUE);

        for v in samples.into_iter().filter(|v| *v <= MAX_VALUE) {
            let bytes = encoded(v);
            let bits = 32 - v.leading_zeros() as usize;
            let expected_len = ((bits + 6) / 7).max(1);
            assert_eq!(bytes.len(), expected_len, "length for {}", v);
            assert_eq!(decode(&bytes), v);
            let (last, rest) = bytes.split_last().unwrap();
            assert_eq!(last & 0x80, 0);
            assert!(rest.iter().all(|b| b & 0x80 != 0));
        }
    }

    #[test]
    fn test_encoded_len() {
        assert_eq!(encoded_len(0), 1);
        assert_eq!(encoded_len(127), 1);
        assert_eq!(encoded_len(128), 2);
        assert_eq!(encoded_len(MAX_VALUE), 4);
    }
}
