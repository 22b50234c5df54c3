//! Random secret generation over an unambiguous alphabet.

use rand::rngs::OsRng;
use rand::RngCore;

/// Base58-style alphabet: alphanumeric characters minus the visually
/// confusing 0, O, I and l.
pub const SECRET_ALPHABET: &[u8; 58] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Generates a random string of exactly `length` characters drawn uniformly
/// from [`SECRET_ALPHABET`].
///
/// Raw bytes whose value falls in the top `256 % 58` slots of the byte range
/// are rejected rather than wrapped, which keeps the modulo mapping uniform.
/// Full-length draws are repeated until enough bytes survive rejection.
pub fn generate_secret(length: usize) -> String {
    let mask = 256 - (256 % SECRET_ALPHABET.len());

    let mut secret = String::with_capacity(length);
    while secret.len() < length {
        let mut raw = vec![0u8; length];
        OsRng.fill_bytes(&mut raw);
        for byte in raw {
            if (byte as usize) >= mask {
                continue;
            }
            secret.push(SECRET_ALPHABET[byte as usize % SECRET_ALPHABET.len()] as char);
        }
    }
    secret.truncate(length);
    secret
}
