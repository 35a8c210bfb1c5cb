//! XOR masking applied to the inner payload of live `.lq.ActionPrototype`
//! notifications.

/// Fixed key table of the mask
pub const MASK_KEYS: [u8; 9] = [132, 94, 78, 66, 57, 162, 31, 96, 28];

/// Whether an action payload still carries the live-traffic mask.
///
/// Payloads restored from server-side history (`syncGame`) are stored plain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Obfuscation {
    Masked,
    Plain,
}

/// Mask byte for position `i` of a buffer of length `len`
#[inline]
pub fn mask_byte(len: usize, i: usize) -> u8 {
    ((23 ^ len)
        .wrapping_add(5usize.wrapping_mul(i))
        .wrapping_add(MASK_KEYS[i % MASK_KEYS.len()] as usize)
        & 0xFF) as u8
}

/// XOR the buffer in place. The operation is its own inverse.
pub fn apply_mask(buf: &mut [u8]) {
    let len = buf.len();
    for (i, b) in buf.iter_mut().enumerate() {
        *b ^= mask_byte(len, i);
    }
}

/// Return an unmasked copy, or the input unchanged for plain payloads
pub fn unmask(buf: &[u8], obfuscation: Obfuscation) -> Vec<u8> {
    let mut out = buf.to_vec();
    if obfuscation == Obfuscation::Masked {
        apply_mask(&mut out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_is_self_inverse() {
        for len in [0usize, 1, 8, 9, 23, 64, 255, 300, 1024] {
            let original: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let mut buf = original.clone();
            apply_mask(&mut buf);
            apply_mask(&mut buf);
            assert_eq!(buf, original, "len {len}");
        }
    }

    #[test]
    fn test_mask_known_bytes() {
        // len 3: (23 ^ 3) = 20
        assert_eq!(mask_byte(3, 0), (20 + 132) as u8);
        assert_eq!(mask_byte(3, 1), (20 + 5 + 94) as u8);
        // wraps past 0xFF
        assert_eq!(mask_byte(3, 5), ((20 + 25 + 162) & 0xFF) as u8);
        // key index wraps after 9
        assert_eq!(mask_byte(3, 9), ((20 + 45 + 132) & 0xFF) as u8);
    }

    #[test]
    fn test_plain_payload_is_untouched() {
        let data = [1u8, 2, 3];
        assert_eq!(unmask(&data, Obfuscation::Plain), data.to_vec());
        assert_ne!(unmask(&data, Obfuscation::Masked), data.to_vec());
    }
}
