//! v3 onion address derivation and ADD_ONION key expansion
//!
//! Pure functions, no IO. The address is a function of the public key
//! alone, so it is recomputed on demand rather than stored.

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::Sha512;
use sha3::{Digest, Sha3_256};

/// Onion address version byte for v3 services
pub const ONION_VERSION: u8 = 0x03;

/// Length of a v3 service ID (base32 of 35 bytes)
pub const SERVICE_ID_LEN: usize = 56;

const CHECKSUM_PREFIX: &[u8] = b".onion checksum";

/// Checksum = H(".onion checksum" || pubkey || version)[:2]
pub fn checksum(pubkey: &[u8; 32]) -> [u8; 2] {
    let mut hasher = Sha3_256::new();
    hasher.update(CHECKSUM_PREFIX);
    hasher.update(pubkey);
    hasher.update([ONION_VERSION]);
    let digest = hasher.finalize();
    [digest[0], digest[1]]
}

/// Derive the v3 service ID (without `.onion`) from an Ed25519 public key
///
/// `base32(pubkey || checksum || version)`, lowercased.
pub fn service_id(pubkey: &[u8; 32]) -> String {
    let mut addr_bytes = [0u8; 35];
    addr_bytes[..32].copy_from_slice(pubkey);
    addr_bytes[32..34].copy_from_slice(&checksum(pubkey));
    addr_bytes[34] = ONION_VERSION;

    // 35 bytes is exactly 56 base32 digits, so there is never padding
    data_encoding::BASE32_NOPAD
        .encode(&addr_bytes)
        .to_lowercase()
}

/// Expand a 32-byte seed into Tor's 64-byte `ED25519-V3` key blob
///
/// `h = SHA-512(seed)` with the scalar half clamped; the second half is the
/// signing nonce prefix and is left as is.
pub fn expand_private_key(seed: &[u8; 32]) -> [u8; 64] {
    let digest = Sha512::digest(seed);

    let mut expanded = [0u8; 64];
    expanded.copy_from_slice(&digest);
    expanded[0] &= 248;
    expanded[31] &= 127;
    expanded[31] |= 64;
    expanded
}

/// Base64 form of [`expand_private_key`], as sent after `ED25519-V3:`
pub fn expanded_key_base64(seed: &[u8; 32]) -> String {
    STANDARD.encode(expand_private_key(seed))
}
