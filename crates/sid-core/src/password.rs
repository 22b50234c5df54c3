//! Password hashing and serialization for SimpleID identity files.
//!
//! Derives a PBKDF2 hash from an operator-supplied password and renders it
//! in one of the two on-disk formats understood by the host application.
//! Both formats are persisted and later parsed by SimpleID's own
//! authentication code, so delimiters, field order and encodings are
//! load-bearing and must not drift.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};
use thiserror::Error;

/// Salt size drawn for every encode, before any format-specific encoding.
pub const SALT_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("invalid algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("number of iterations too small (at least {minimum}): {requested}")]
    IterationsBelowFloor { requested: u32, minimum: u32 },
    #[error("key derivation failed: {0}")]
    Derivation(String),
}

/// HMAC hash functions accepted as the PBKDF2 core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    /// Native digest length in bytes, used when the key length is 0.
    pub fn digest_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = PasswordError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "sha1" => Ok(Self::Sha1),
            "sha224" => Ok(Self::Sha224),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            other => Err(PasswordError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Wire format version for the serialized credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFormat {
    /// `$pbkdf2$f=<algo>&c=<n>[&dk=<len>]$<base64 digest>$<base64 salt>`
    Current,
    /// `<hex digest>:pbkdf2:<algo>:<n>:<salt text>`, as stored by the 1.x
    /// host application.
    Legacy,
}

impl HashFormat {
    /// Lowest iteration count accepted for this format version.
    pub fn min_iterations(&self) -> u32 {
        match self {
            Self::Current => 100_000,
            Self::Legacy => 4_096,
        }
    }

    /// Iteration count used when the operator does not supply one.
    pub fn default_iterations(&self) -> u32 {
        match self {
            Self::Current => 600_000,
            Self::Legacy => 100_000,
        }
    }
}

/// A freshly derived credential. Constructed by [`PasswordEncoder::encode`]
/// and rendered once via `Display`; never parsed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPassword {
    pub algorithm: HashAlgorithm,
    pub iterations: u32,
    pub key_length: usize,
    pub format: HashFormat,
    pub salt: Vec<u8>,
    pub digest: Vec<u8>,
}

impl fmt::Display for EncodedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format {
            HashFormat::Current => {
                let mut params =
                    format!("f={}&c={}", self.algorithm.as_str(), self.iterations);
                if self.key_length > 0 {
                    params.push_str(&format!("&dk={}", self.key_length));
                }
                write!(
                    f,
                    "$pbkdf2${params}${}${}",
                    BASE64.encode(&self.digest),
                    BASE64.encode(&self.salt)
                )
            }
            HashFormat::Legacy => write!(
                f,
                "{}:pbkdf2:{}:{}:{}",
                encode_hex(&self.digest),
                self.algorithm.as_str(),
                self.iterations,
                // Legacy salts are hex text by construction.
                String::from_utf8_lossy(&self.salt)
            ),
        }
    }
}

/// Validated encoding parameters. Validation happens here, before any
/// randomness is drawn, so a rejected request has no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordEncoder {
    algorithm: HashAlgorithm,
    iterations: u32,
    key_length: usize,
    format: HashFormat,
}

impl PasswordEncoder {
    pub fn new(
        algorithm: HashAlgorithm,
        iterations: u32,
        key_length: usize,
        format: HashFormat,
    ) -> Result<Self, PasswordError> {
        let minimum = format.min_iterations();
        if iterations < minimum {
            return Err(PasswordError::IterationsBelowFloor {
                requested: iterations,
                minimum,
            });
        }

        // The legacy identity-file parser expects the full digest; a caller
        // supplied key length is not representable there.
        let key_length = match format {
            HashFormat::Current => key_length,
            HashFormat::Legacy => 0,
        };

        Ok(Self {
            algorithm,
            iterations,
            key_length,
            format,
        })
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn format(&self) -> HashFormat {
        self.format
    }

    /// Draws a fresh salt and derives the credential.
    ///
    /// The legacy format stores the salt as plain text inside the identity
    /// file, so the raw salt bytes are hex-encoded first and the resulting
    /// ASCII string is what both the KDF and the serializer see. The current
    /// format feeds the raw bytes to the KDF and base64-encodes them only at
    /// serialization time.
    pub fn encode(&self, password: &str) -> Result<EncodedPassword, PasswordError> {
        let mut raw_salt = [0u8; SALT_BYTES];
        OsRng.fill_bytes(&mut raw_salt);

        let salt = match self.format {
            HashFormat::Current => raw_salt.to_vec(),
            HashFormat::Legacy => encode_hex(&raw_salt).into_bytes(),
        };
        self.encode_with_salt(password, salt)
    }

    fn encode_with_salt(
        &self,
        password: &str,
        salt: Vec<u8>,
    ) -> Result<EncodedPassword, PasswordError> {
        let digest_len = if self.key_length == 0 {
            self.algorithm.digest_len()
        } else {
            self.key_length
        };

        let mut digest = vec![0u8; digest_len];
        derive_key(
            self.algorithm,
            password.as_bytes(),
            &salt,
            self.iterations,
            &mut digest,
        )?;

        Ok(EncodedPassword {
            algorithm: self.algorithm,
            iterations: self.iterations,
            key_length: self.key_length,
            format: self.format,
            salt,
            digest,
        })
    }
}

fn derive_key(
    algorithm: HashAlgorithm,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    out: &mut [u8],
) -> Result<(), PasswordError> {
    let derived = match algorithm {
        HashAlgorithm::Sha1 => pbkdf2::pbkdf2::<Hmac<Sha1>>(password, salt, iterations, out),
        HashAlgorithm::Sha224 => pbkdf2::pbkdf2::<Hmac<Sha224>>(password, salt, iterations, out),
        HashAlgorithm::Sha256 => pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out),
        HashAlgorithm::Sha384 => pbkdf2::pbkdf2::<Hmac<Sha384>>(password, salt, iterations, out),
        HashAlgorithm::Sha512 => pbkdf2::pbkdf2::<Hmac<Sha512>>(password, salt, iterations, out),
    };
    derived.map_err(|error| PasswordError::Derivation(error.to_string()))
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use regex::Regex;

    use super::*;

    fn current_encoder(iterations: u32, key_length: usize) -> PasswordEncoder {
        PasswordEncoder::new(
            HashAlgorithm::Sha256,
            iterations,
            key_length,
            HashFormat::Current,
        )
        .unwrap()
    }

    #[test]
    fn derive_key_matches_rfc_6070_sha1_vector() {
        let mut out = [0u8; 20];
        derive_key(HashAlgorithm::Sha1, b"password", b"salt", 4096, &mut out).unwrap();
        assert_eq!(encode_hex(&out), "4b007901b765489abead49d926f721d065a429c1");
    }

    #[test]
    fn derive_key_matches_known_sha256_vector() {
        let mut out = [0u8; 32];
        derive_key(HashAlgorithm::Sha256, b"password", b"salt", 4096, &mut out).unwrap();
        assert_eq!(
            encode_hex(&out),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn current_format_matches_grammar() {
        let encoded = current_encoder(100_000, 0).encode("hunter2").unwrap();
        let grammar = Regex::new(r"^\$pbkdf2\$[^$]*\$[A-Za-z0-9+/=]*\$[A-Za-z0-9+/=]*$").unwrap();
        assert!(grammar.is_match(&encoded.to_string()));
    }

    #[test]
    fn current_format_carries_dk_only_when_key_length_set() {
        let plain = current_encoder(100_000, 0).encode("pw").unwrap().to_string();
        assert!(plain.starts_with("$pbkdf2$f=sha256&c=100000$"));

        let truncated = current_encoder(100_000, 24).encode("pw").unwrap();
        assert!(truncated
            .to_string()
            .starts_with("$pbkdf2$f=sha256&c=100000&dk=24$"));
        assert_eq!(truncated.digest.len(), 24);
    }

    #[test]
    fn legacy_format_matches_grammar() {
        let encoder = PasswordEncoder::new(
            HashAlgorithm::Sha256,
            100_000,
            0,
            HashFormat::Legacy,
        )
        .unwrap();
        let encoded = encoder.encode("hunter2").unwrap();
        let grammar = Regex::new(r"^[0-9a-f]+:pbkdf2:[a-z0-9]+:\d+:[0-9a-f]+$").unwrap();
        let rendered = encoded.to_string();
        assert!(grammar.is_match(&rendered), "bad legacy output: {rendered}");

        // Full digest hex plus a 64-character hex salt.
        assert_eq!(encoded.digest.len(), 32);
        assert_eq!(encoded.salt.len(), 64);
    }

    #[test]
    fn legacy_format_forces_full_digest_length() {
        let encoder =
            PasswordEncoder::new(HashAlgorithm::Sha1, 4_096, 24, HashFormat::Legacy).unwrap();
        assert_eq!(encoder.key_length(), 0);
        assert_eq!(encoder.encode("pw").unwrap().digest.len(), 20);
    }

    #[test]
    fn repeated_encodes_differ_but_describe_the_same_parameters() {
        let encoder = current_encoder(100_000, 24);
        let first = encoder.encode("correct horse").unwrap().to_string();
        let second = encoder.encode("correct horse").unwrap().to_string();
        assert_ne!(first, second);

        let params = |rendered: &str| {
            rendered
                .split('$')
                .nth(2)
                .map(str::to_string)
                .unwrap_or_default()
        };
        assert_eq!(params(&first), params(&second));
        assert_eq!(params(&first), "f=sha256&c=100000&dk=24");
    }

    #[test]
    fn same_salt_same_digest() {
        let encoder = current_encoder(100_000, 0);
        let salt = vec![7u8; SALT_BYTES];
        let first = encoder.encode_with_salt("pw", salt.clone()).unwrap();
        let second = encoder.encode_with_salt("pw", salt).unwrap();
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn iteration_floor_is_enforced_per_format() {
        let below_current = PasswordEncoder::new(
            HashAlgorithm::Sha256,
            99_999,
            0,
            HashFormat::Current,
        );
        assert!(matches!(
            below_current,
            Err(PasswordError::IterationsBelowFloor {
                minimum: 100_000,
                ..
            })
        ));

        // 5 000 iterations clears the legacy floor but not the current one.
        assert!(
            PasswordEncoder::new(HashAlgorithm::Sha256, 5_000, 0, HashFormat::Legacy).is_ok()
        );
        assert!(
            PasswordEncoder::new(HashAlgorithm::Sha256, 5_000, 0, HashFormat::Current).is_err()
        );
    }

    #[test]
    fn unknown_algorithm_names_are_rejected() {
        assert!(matches!(
            "md5".parse::<HashAlgorithm>(),
            Err(PasswordError::UnsupportedAlgorithm(_))
        ));
        assert_eq!("sha512".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha512);
    }
}
