//! Conversions for the hex-encoded signature stored in manifest metadata.

use sha2::{Digest, Sha256};

use crate::error::SpoofError;

/// Decode a spoofed signature hex string into raw bytes.
///
/// Each pair of characters becomes one byte, so `"1A2B"` yields
/// `[0x1A, 0x2B]`. Both cases are accepted.
pub fn decode_signature(package: &str, hex_sig: &str) -> Result<Vec<u8>, SpoofError> {
    hex::decode(hex_sig).map_err(|e| SpoofError::MalformedSignature {
        package: package.to_string(),
        reason: e.to_string(),
    })
}

/// SHA-256 of a signature, as compared by certificate-digest allow-lists.
pub fn signature_digest(signature: &[u8]) -> Vec<u8> {
    Sha256::digest(signature).to_vec()
}
