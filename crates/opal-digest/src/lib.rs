//! # opal-digest
//!
//! Path keying and host identity for the Opal virtual filesystem.
//!
//! Every path in the namespace is addressed by a salted 128-bit digest, so a
//! lookup costs the same regardless of how deep the path nests. The same
//! salted digest doubles as the content sum stored beside each payload and
//! re-verified when an image is loaded.
//!
//! The digest is the first 16 bytes of BLAKE3. Nothing here is a security
//! claim: the stream key binds an image to the host it was written on, which
//! is a compatibility boundary, not an encryption scheme.

/// Signature embedded in every image header and mixed into the stream key.
pub const FS_SIGNATURE: &str = "opal_fs_header";

// The signature is encoded into a fixed-width field in some consumers.
const _: () = assert!(FS_SIGNATURE.len() <= 64);

/// Salt appended to every keyed digest input.
const PATH_SALT: &str = "opal_magic";

/// Width of the truncated digest in bytes.
pub const DIGEST_LEN: usize = 16;

/// First 16 bytes of the BLAKE3 hash of `data`.
#[inline]
pub fn digest128(data: &[u8]) -> [u8; DIGEST_LEN] {
    let full = blake3::hash(data);
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full.as_bytes()[..DIGEST_LEN]);
    out
}

/// Hex representation of a digest (32 lowercase characters).
#[inline]
pub fn to_hex(digest: &[u8; DIGEST_LEN]) -> String {
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Salted digest of arbitrary bytes, hex-encoded.
pub fn salted_hex(data: &[u8]) -> String {
    let mut seeded = Vec::with_capacity(data.len() + PATH_SALT.len());
    seeded.extend_from_slice(data);
    seeded.extend_from_slice(PATH_SALT.as_bytes());
    to_hex(&digest128(&seeded))
}

/// Namespace key for a path. This is the sole index into the namespace map.
#[inline]
pub fn path_key(path: &str) -> String {
    salted_hex(path.as_bytes())
}

/// Content sum for a payload, verified on image load.
#[inline]
pub fn content_sum(data: &[u8]) -> String {
    salted_hex(data)
}

/// Host-bound key used to cipher the raw image stream.
///
/// Derived from `hostname || FS_SIGNATURE`; an unavailable hostname degrades
/// to the empty string, so the key is still deterministic per host. Callers
/// cannot override it: an image moved off-host is opaque by construction.
pub fn fs_key() -> [u8; DIGEST_LEN] {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut seeded = Vec::with_capacity(host.len() + FS_SIGNATURE.len());
    seeded.extend_from_slice(host.as_bytes());
    seeded.extend_from_slice(FS_SIGNATURE.as_bytes());
    digest128(&seeded)
}
