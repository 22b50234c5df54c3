//! Out-of-process bridge to the host application's CLI entry point.
//!
//! The bridge resolves a PHP interpreter and a SimpleID installation, derives
//! an authentication token from the installation's configuration file, runs
//! the entry point synchronously with the requested route, and decodes the
//! semi-structured error convention the host application prints on failure.
//! It never interprets the route or parameters itself.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::install::{locate_installation, HostInstallation, ENTRY_POINT_FILE};

/// Marker variable signalling a tool-initiated invocation to the host
/// application. Part of the stable contract with SimpleID.
pub const TOOL_MARKER_ENV: &str = "SIMPLEID_TOOL";

/// Variable carrying the derived authentication token.
pub const TOOL_TOKEN_ENV: &str = "SIMPLEID_TOOL_TOKEN";

const ERROR_DIVIDER: &str = "===================================";
const ERROR_LINE_PREFIX: &str = "ERROR ";
const MAX_ERROR_SEGMENTS: usize = 6;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("cannot find a PHP executable; use --php-bin to specify the location of PHP")]
    InterpreterNotFound,
    #[error("invalid interpreter command line '{command}': {reason}")]
    InvalidInterpreter { command: String, reason: String },
    #[error(
        "cannot find a SimpleID installation (index.php and config.php) under '{}'",
        .0.display()
    )]
    InstallationNotFound(PathBuf),
    #[error("failed to read configuration file '{}': {source}", .path.display())]
    ConfigUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to run '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// A resolved language runtime: the program to execute plus any arguments
/// that must precede the entry-point script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Structured view of the host application's error block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub status: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// Outcome of one bridge invocation. A non-zero exit code is a decoded
/// result, not a bridge failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResult {
    pub exit_code: i32,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

/// Resolves the interpreter to launch the entry point with.
///
/// An explicit command line is split into program and arguments with shell
/// quoting rules, so values such as `"php -d memory_limit=-1"` work. Without
/// one, `PATH` is probed for `php`.
pub fn resolve_interpreter(explicit: Option<&str>) -> Result<Interpreter, BridgeError> {
    match explicit {
        Some(command) => {
            let mut tokens =
                shell_words::split(command).map_err(|error| BridgeError::InvalidInterpreter {
                    command: command.to_string(),
                    reason: error.to_string(),
                })?;
            if tokens.is_empty() {
                return Err(BridgeError::InvalidInterpreter {
                    command: command.to_string(),
                    reason: "empty command line".to_string(),
                });
            }
            let program = PathBuf::from(tokens.remove(0));
            Ok(Interpreter {
                program,
                args: tokens,
            })
        }
        None => which::which("php")
            .map(|program| Interpreter {
                program,
                args: Vec::new(),
            })
            .map_err(|_| BridgeError::InterpreterNotFound),
    }
}

/// Derives the authentication token binding an invocation to a configuration
/// snapshot: URL-safe unpadded base64 of the SHA-256 digest of the file's
/// raw bytes. The host application recomputes and compares it on its side.
pub fn derive_auth_token(config_bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(config_bytes))
}

/// Executes one API route against the installation under `root_dir`.
///
/// Interpreter and installation resolution failures are fatal and reported
/// before any subprocess exists.
pub fn invoke(
    route: &str,
    params: &[String],
    root_dir: &Path,
    php_bin: Option<&str>,
) -> Result<ApiResult, BridgeError> {
    let interpreter = resolve_interpreter(php_bin)?;
    let installation = locate_installation(root_dir)
        .ok_or_else(|| BridgeError::InstallationNotFound(root_dir.to_path_buf()))?;
    invoke_with(&interpreter, &installation, route, params)
}

/// Same as [`invoke`], with both collaborators already resolved.
pub fn invoke_with(
    interpreter: &Interpreter,
    installation: &HostInstallation,
    route: &str,
    params: &[String],
) -> Result<ApiResult, BridgeError> {
    let config_bytes =
        std::fs::read(&installation.config_file).map_err(|source| BridgeError::ConfigUnreadable {
            path: installation.config_file.clone(),
            source,
        })?;
    let token = derive_auth_token(&config_bytes);

    debug!(
        route,
        interpreter = %interpreter.program.display(),
        root = %installation.root_dir.display(),
        "invoking SimpleID entry point"
    );

    // Structured argument vector: route and parameters are separate argv
    // entries, never interpolated through a shell.
    let output = Command::new(&interpreter.program)
        .args(&interpreter.args)
        .arg(ENTRY_POINT_FILE)
        .arg(route)
        .args(params)
        .current_dir(&installation.root_dir)
        .env(TOOL_MARKER_ENV, "TRUE")
        .env(TOOL_TOKEN_ENV, &token)
        .stdin(Stdio::null())
        .output()
        .map_err(|source| BridgeError::Launch {
            program: interpreter.program.display().to_string(),
            source,
        })?;

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(decode_output(exit_code, stdout))
}

/// Decodes the captured exit code and standard output into an [`ApiResult`].
pub fn decode_output(exit_code: i32, output: String) -> ApiResult {
    if exit_code == 0 {
        return ApiResult {
            exit_code,
            output,
            error: None,
        };
    }
    let error = decode_error_block(&output);
    ApiResult {
        exit_code,
        output,
        error,
    }
}

/// Recognizes the fixed error block the host application's framework prints
/// on fatal errors:
///
/// ```text
/// <header>
/// ===================================
/// ERROR <code> - <status>
/// <description>
/// <ignored>
/// <trace>
/// ```
///
/// The status field keeps only its first space-delimited token. Any other
/// shape yields `None` and the raw output stands on its own.
fn decode_error_block(output: &str) -> Option<ErrorDetail> {
    let segments: Vec<&str> = output.splitn(MAX_ERROR_SEGMENTS, '\n').collect();
    if *segments.get(1)? != ERROR_DIVIDER {
        return None;
    }
    let error_line = *segments.get(2)?;
    if !error_line.starts_with(ERROR_LINE_PREFIX) {
        return None;
    }

    let tokens: Vec<&str> = error_line.split(' ').collect();
    let code = (*tokens.get(1)?).to_string();
    let status = (*tokens.get(3)?).to_string();
    let description = (*segments.get(3)?).to_string();
    let trace = segments.get(5).map(|segment| (*segment).to_string());

    Some(ErrorDetail {
        code,
        status,
        description,
        trace,
    })
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::install::CONFIG_FILE_NAME;

    #[test]
    fn token_is_a_pure_function_of_file_bytes() {
        assert_eq!(derive_auth_token(b"config"), derive_auth_token(b"config"));
        assert_ne!(derive_auth_token(b"config"), derive_auth_token(b"confih"));
    }

    #[test]
    fn token_is_url_safe_and_unpadded() {
        let token = derive_auth_token(b"anything at all");
        assert_eq!(token.len(), 43);
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
    }

    #[test]
    fn explicit_interpreter_is_split_with_shell_rules() {
        let interpreter = resolve_interpreter(Some("php -d memory_limit=-1")).unwrap();
        assert_eq!(interpreter.program, PathBuf::from("php"));
        assert_eq!(interpreter.args, vec!["-d", "memory_limit=-1"]);
    }

    #[test]
    fn empty_interpreter_command_is_rejected() {
        assert!(matches!(
            resolve_interpreter(Some("  ")),
            Err(BridgeError::InvalidInterpreter { .. })
        ));
    }

    #[test]
    fn success_output_is_passed_through_verbatim() {
        let result = decode_output(0, "all good\n".to_string());
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, "all good\n");
        assert_eq!(result.error, None);
    }

    #[test]
    fn recognized_error_block_is_decoded() {
        let output = "header line\n\
                      ===================================\n\
                      ERROR 42 - Not Found\n\
                      The resource does not exist\n\
                      X\n\
                      stack trace here";
        let result = decode_output(3, output.to_string());
        assert_eq!(result.exit_code, 3);

        let error = result.error.unwrap();
        assert_eq!(error.code, "42");
        // First token of the status only.
        assert_eq!(error.status, "Not");
        assert_eq!(error.description, "The resource does not exist");
        assert_eq!(error.trace.as_deref(), Some("stack trace here"));
    }

    #[test]
    fn error_block_without_trace_decodes_without_one() {
        let output = "header\n\
                      ===================================\n\
                      ERROR 500 - Internal\n\
                      Something broke";
        let error = decode_output(1, output.to_string()).error.unwrap();
        assert_eq!(error.code, "500");
        assert_eq!(error.status, "Internal");
        assert_eq!(error.trace, None);
    }

    #[test]
    fn trace_segment_keeps_embedded_newlines() {
        let output = "header\n\
                      ===================================\n\
                      ERROR 500 - Internal\n\
                      Something broke\n\
                      \n\
                      frame one\nframe two\nframe three";
        let error = decode_output(1, output.to_string()).error.unwrap();
        assert_eq!(
            error.trace.as_deref(),
            Some("frame one\nframe two\nframe three")
        );
    }

    #[test]
    fn unrecognized_shapes_leave_error_absent() {
        for output in [
            "",
            "plain failure message",
            "header\n--- not the divider ---\nERROR 1 - X\ndesc",
            "header\n===================================\nWARNING 1 - X\ndesc",
            "header\n===================================\nERROR 1\ndesc",
        ] {
            let result = decode_output(2, output.to_string());
            assert_eq!(result.error, None, "unexpected decode for {output:?}");
            assert_eq!(result.output, output);
        }
    }

    #[cfg(unix)]
    fn fake_installation(entry_point_body: &str) -> (tempfile::TempDir, HostInstallation) {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(ENTRY_POINT_FILE), entry_point_body).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "<?php $config = [];\n").unwrap();
        let installation = locate_installation(dir.path()).unwrap();
        (dir, installation)
    }

    #[cfg(unix)]
    fn sh_interpreter() -> Interpreter {
        Interpreter {
            program: PathBuf::from("sh"),
            args: Vec::new(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn invoke_passes_route_params_and_environment() {
        let (_dir, installation) =
            fake_installation("printf '%s|%s|%s|%s' \"$1\" \"$2\" \"$SIMPLEID_TOOL\" \"$SIMPLEID_TOOL_TOKEN\"\n");
        let result = invoke_with(
            &sh_interpreter(),
            &installation,
            "user/create",
            &["alice".to_string()],
        )
        .unwrap();

        assert_eq!(result.exit_code, 0);
        let expected_token =
            derive_auth_token(&std::fs::read(&installation.config_file).unwrap());
        assert_eq!(
            result.output,
            format!("user/create|alice|TRUE|{expected_token}")
        );
    }

    #[cfg(unix)]
    #[test]
    fn invoke_decodes_an_error_block_from_the_subprocess() {
        let (_dir, installation) = fake_installation(
            "printf 'header line\\n===================================\\nERROR 42 - Not Found\\nThe resource does not exist\\nX\\nstack trace here'\nexit 3\n",
        );
        let result =
            invoke_with(&sh_interpreter(), &installation, "nope", &[]).unwrap();

        assert_eq!(result.exit_code, 3);
        let error = result.error.unwrap();
        assert_eq!(error.code, "42");
        assert_eq!(error.status, "Not");
        assert_eq!(error.description, "The resource does not exist");
        assert_eq!(error.trace.as_deref(), Some("stack trace here"));
    }

    #[test]
    fn invoke_fails_fast_without_an_installation() {
        let dir = tempdir().unwrap();
        let result = invoke("route", &[], dir.path(), Some("sh"));
        assert!(matches!(
            result,
            Err(BridgeError::InstallationNotFound(_))
        ));
    }
}
