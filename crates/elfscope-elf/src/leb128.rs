//! LEB128 (Little-Endian Base 128) decoding.
//!
//! Build attribute tags and most attribute values are ULEB128 encoded.
//! Each byte carries 7 payload bits; bit 7 set means another byte follows.

/// Decodes an unsigned LEB128 value from the start of `data`.
///
/// Returns `(value, bytes_consumed)`, or `None` if the encoding is truncated
/// or does not fit a `u64`.
#[must_use]
pub fn decode_uleb128(data: &[u8]) -> Option<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        let value = u64::from(byte & 0x7F);
        if shift > 0 && value > (u64::MAX >> shift) {
            return None;
        }
        result |= value << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            return Some((result, i + 1));
        }
    }
    None
}

/// Decodes a signed LEB128 value from the start of `data`.
///
/// The result is sign-extended when bit 6 of the last byte is set and the
/// shift is still inside 64 bits.
#[must_use]
pub fn decode_sleb128(data: &[u8]) -> Option<(i64, usize)> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if shift >= 64 {
            return None;
        }
        result |= i64::from(byte & 0x7F) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= !0i64 << shift;
            }
            return Some((result, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_uleb128(mut value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn encode_sleb128(mut value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
            if done {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    /// Deterministic spread over a range: edges, powers of two and a
    /// multiplicative walk.
    fn samples_u32() -> impl Iterator<Item = u32> {
        let edges = [0, 1, 0x7F, 0x80, 0x3FFF, 0x4000, u32::MAX - 1, u32::MAX];
        let powers = (0..32).map(|bit| 1u32 << bit);
        let walk = (0..2000u32).map(|i| i.wrapping_mul(2_654_435_761));
        edges.into_iter().chain(powers).chain(walk)
    }

    #[test]
    fn test_uleb128_known_encodings() {
        assert_eq!(decode_uleb128(&[0x00]), Some((0, 1)));
        assert_eq!(decode_uleb128(&[0x7F]), Some((127, 1)));
        assert_eq!(decode_uleb128(&[0x80, 0x01]), Some((128, 2)));
        assert_eq!(decode_uleb128(&[0xE5, 0x8E, 0x26]), Some((624_485, 3)));
        // Trailing bytes are not consumed.
        assert_eq!(decode_uleb128(&[0x05, 0xFF]), Some((5, 1)));
    }

    #[test]
    fn test_sleb128_known_encodings() {
        assert_eq!(decode_sleb128(&[0x7F]), Some((-1, 1)));
        assert_eq!(decode_sleb128(&[0x40]), Some((-64, 1)));
        assert_eq!(decode_sleb128(&[0xC0, 0x00]), Some((64, 2)));
        assert_eq!(decode_sleb128(&[0xC0, 0xBB, 0x78]), Some((-123_456, 3)));
    }

    #[test]
    fn test_truncated_input() {
        assert_eq!(decode_uleb128(&[]), None);
        assert_eq!(decode_uleb128(&[0x80]), None);
        assert_eq!(decode_sleb128(&[0xFF, 0xFF]), None);
    }

    #[test]
    fn test_uleb128_overflow() {
        let mut data = vec![0xFF; 9];
        data.push(0x01);
        assert_eq!(decode_uleb128(&data), Some((u64::MAX, 10)));
        data[9] = 0x02;
        assert_eq!(decode_uleb128(&data), None);
    }

    #[test]
    fn test_uleb128_round_trip() {
        for value in samples_u32() {
            let encoded = encode_uleb128(u64::from(value));
            assert_eq!(
                decode_uleb128(&encoded),
                Some((u64::from(value), encoded.len())),
                "value {value:#x}"
            );
        }
    }

    #[test]
    fn test_sleb128_round_trip() {
        for bits in samples_u32() {
            let value = i64::from(bits as i32);
            let encoded = encode_sleb128(value);
            assert_eq!(
                decode_sleb128(&encoded),
                Some((value, encoded.len())),
                "value {value}"
            );
        }
    }
}
