//! SHA-1 digest type and hexadecimal codec.
//!
//! Digests are stored and compared as raw big-endian bytes; lexicographic
//! order over the bytes is identical to numeric order over the digest, so
//! `[u8; 20]` arrays compare correctly with the derived `Ord`.
//!
//! The text form is 40 hexadecimal characters. Parsing is case-insensitive;
//! formatting always produces uppercase, matching the corpus files the
//! preparer consumes.

use eyre::{bail, ensure, Result};

/// Length of a binary SHA-1 digest in bytes.
pub const SHA1_BINARY_LENGTH: usize = 20;

/// Length of a SHA-1 digest in hexadecimal text form.
pub const SHA1_TEXT_LENGTH: usize = 40;

/// A binary SHA-1 digest.
pub type Sha1 = [u8; SHA1_BINARY_LENGTH];

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

#[inline]
fn hex_value(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => bail!("invalid hexadecimal character '{}'", c as char),
    }
}

/// Parses a 40-character hexadecimal string into a binary digest.
pub fn text_to_sha1(text: &str) -> Result<Sha1> {
    let bytes = text.as_bytes();
    ensure!(
        bytes.len() == SHA1_TEXT_LENGTH,
        "expected {} hexadecimal characters, got {}",
        SHA1_TEXT_LENGTH,
        bytes.len()
    );

    let mut sha1 = [0u8; SHA1_BINARY_LENGTH];
    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        sha1[i] = (hex_value(pair[0])? << 4) | hex_value(pair[1])?;
    }

    Ok(sha1)
}

/// Formats a binary digest as 40 uppercase hexadecimal characters.
pub fn sha1_to_text(sha1: &Sha1) -> String {
    let mut text = String::with_capacity(SHA1_TEXT_LENGTH);

    for byte in sha1 {
        text.push(HEX_CHARS[(byte >> 4) as usize] as char);
        text.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
    }

    text
}
