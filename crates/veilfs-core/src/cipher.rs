//! Obfuscation transform.
//!
//! A per-byte alphabetic rotation applied to data crossing the read/write
//! boundary. This is a legacy transposition, not a security boundary: it
//! keeps casual `strings`/`hexdump` inspection of the snapshot from showing
//! plaintext, nothing more.
//!
//! Decryption is encryption by the complementary shift, so both directions
//! share one rotation routine and wraparound is correct for every shift.

/// In-place alphabetic rotation cipher.
///
/// Letters rotate within their case band (A–Z, a–z); every other byte is a
/// fixed point. The shift is normalized into 0..26 at construction, so any
/// integer (negative included) is a valid input.
#[derive(Debug, Clone, Copy)]
pub struct RotateCipher {
    shift: u8,
}

impl RotateCipher {
    /// Create a cipher with the given rotation shift.
    pub fn new(shift: i32) -> Self {
        Self {
            shift: shift.rem_euclid(26) as u8,
        }
    }

    /// The normalized shift in 0..26.
    pub fn shift(&self) -> u8 {
        self.shift
    }

    /// Rotate letters forward by the shift.
    pub fn encrypt(&self, buf: &mut [u8]) {
        rotate(buf, self.shift);
    }

    /// Rotate letters back by the shift.
    pub fn decrypt(&self, buf: &mut [u8]) {
        rotate(buf, (26 - self.shift) % 26);
    }
}

fn rotate(buf: &mut [u8], by: u8) {
    for b in buf.iter_mut() {
        *b = match *b {
            b'A'..=b'Z' => (*b - b'A' + by) % 26 + b'A',
            b'a'..=b'z' => (*b - b'a' + by) % 26 + b'a',
            other => other,
        };
    }
}
