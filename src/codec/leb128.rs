//! Unsigned LEB128 for lengths and case indices.
//!
//! Lengths and discriminants are bounded to `u32`; anything wider is
//! rejected on decode.

use bytes::{Buf, BufMut};

use super::DecodeError;

/// Longest valid encoding of a `u32`.
const MAX_LEN: usize = 5;

pub(crate) fn put_u32(buf: &mut impl BufMut, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

pub(crate) fn get_u32(buf: &mut impl Buf) -> Result<u32, DecodeError> {
    let mut value: u64 = 0;
    for i in 0..MAX_LEN {
        if !buf.has_remaining() {
            return Err(DecodeError::Truncated {
                needed: 1,
                remaining: 0,
            });
        }
        let byte = buf.get_u8();
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return u32::try_from(value).map_err(|_| DecodeError::LengthOverflow);
        }
    }
    Err(DecodeError::LengthOverflow)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn encoded(value: u32) -> Vec<u8> {
        let mut out = Vec::new();
        put_u32(&mut out, value);
        out
    }

    #[test]
    fn test_known_encodings() {
        // ---
        assert_eq!(encoded(0), [0x00]);
        assert_eq!(encoded(0x7f), [0x7f]);
        assert_eq!(encoded(0x80), [0x80, 0x01]);
        assert_eq!(encoded(300), [0xac, 0x02]);
        assert_eq!(encoded(u32::MAX), [0xff, 0xff, 0xff, 0xff, 0x0f]);
    }

    #[test]
    fn test_decode_rejects_overflow() {
        // ---
        let mut buf: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0x1f];
        assert_eq!(get_u32(&mut buf), Err(DecodeError::LengthOverflow));

        let mut buf: &[u8] = &[0x80, 0x80, 0x80, 0x80, 0x80, 0x01];
        assert_eq!(get_u32(&mut buf), Err(DecodeError::LengthOverflow));
    }

    #[test]
    fn test_decode_truncated() {
        // ---
        let mut buf: &[u8] = &[0x80];
        assert!(matches!(
            get_u32(&mut buf),
            Err(DecodeError::Truncated { .. })
        ));
    }
}
