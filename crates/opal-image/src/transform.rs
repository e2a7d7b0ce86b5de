//! Whole-image transforms: gzip and the host-keyed stream cipher.
//!
//! Write order is compress-then-encipher; load order is the inverse,
//! decipher-then-inflate. The cipher is ChaCha20 run as a plain synchronous
//! keystream: the 16-byte host key is widened by hashing and the nonce is
//! fixed, so the transform is deterministic per host. It exists to make an
//! off-host image opaque, nothing more.

use std::io::{Read, Write};

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use opal_digest::DIGEST_LEN;

use crate::Result;

/// Gzip `data` into a fresh buffer.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a complete gzip stream.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

fn keystream(key: &[u8; DIGEST_LEN]) -> ChaCha20 {
    // Widen the 16-byte host key to the cipher's native width.
    let wide = *blake3::hash(key).as_bytes();
    let nonce = [0u8; 12];
    ChaCha20::new(&wide.into(), &nonce.into())
}

/// Cipher `data` in place with the keystream derived from `key`.
pub fn encipher_stream(data: &mut [u8], key: &[u8; DIGEST_LEN]) {
    keystream(key).apply_keystream(data);
}

/// Inverse of [`encipher_stream`]. A stream cipher is its own inverse.
pub fn decipher_stream(data: &mut [u8], key: &[u8; DIGEST_LEN]) {
    keystream(key).apply_keystream(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let data = b"some payload that gzip will happily shrink shrink shrink";
        let packed = gzip(data).unwrap();
        assert_eq!(gunzip(&packed).unwrap(), data);
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        assert!(gunzip(b"definitely not gzip").is_err());
    }

    #[test]
    fn test_cipher_inverts_itself() {
        let key = opal_digest::fs_key();
        let mut data = b"raw image bytes".to_vec();
        encipher_stream(&mut data, &key);
        assert_ne!(data, b"raw image bytes");
        decipher_stream(&mut data, &key);
        assert_eq!(data, b"raw image bytes");
    }

    #[test]
    fn test_cipher_key_sensitivity() {
        let mut a = b"raw image bytes".to_vec();
        let mut b = a.clone();
        encipher_stream(&mut a, &[1u8; DIGEST_LEN]);
        encipher_stream(&mut b, &[2u8; DIGEST_LEN]);
        assert_ne!(a, b);
    }
}
