//! Core components of the SimpleID administration tool.
//!
//! Hosts the credential encoder, the secret generator, the installation
//! locator, and the out-of-process API bridge used by the `simpleid-tool`
//! binary. Everything here is synchronous and value-oriented: each command
//! invocation constructs what it needs, uses it once, and drops it.

pub mod bridge;
pub mod install;
pub mod password;
pub mod secret;

pub use bridge::{ApiResult, BridgeError, ErrorDetail, Interpreter};
pub use install::HostInstallation;
pub use password::{EncodedPassword, HashAlgorithm, HashFormat, PasswordEncoder, PasswordError};
pub use secret::generate_secret;
