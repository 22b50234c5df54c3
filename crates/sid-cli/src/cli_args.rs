//! clap-backed argument models for the `simpleid-tool` binary.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "simpleid-tool",
    about = "Administration tool for SimpleID installations",
    version
)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase output verbosity (shows diagnostic traces from failed API calls)"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: ToolCommand,
}

#[derive(Debug, Subcommand)]
pub enum ToolCommand {
    #[command(about = "Encodes a password for use in an identity file")]
    Passwd(PasswdArgs),
    #[command(about = "Generates a random secret string")]
    Secret(SecretArgs),
    #[command(about = "Calls the SimpleID API through the installation's entry point")]
    Api(ApiArgs),
    #[command(
        name = "migrate-config",
        about = "Converts a SimpleID 1 configuration file to SimpleID 2"
    )]
    MigrateConfig(MigrateConfigArgs),
}

#[derive(Debug, Args)]
pub struct PasswdArgs {
    #[arg(help = "Password to encode (prompts if missing)")]
    pub password: Option<String>,

    #[arg(
        short = 'f',
        long,
        default_value = "sha256",
        help = "HMAC algorithm (sha1, sha224, sha256, sha384, sha512)"
    )]
    pub algorithm: String,

    #[arg(
        short = 'c',
        long,
        help = "Number of iterations (default 600000, or 100000 with --legacy)"
    )]
    pub iterations: Option<u32>,

    #[arg(
        short = 'd',
        long = "key-length",
        default_value_t = 0,
        allow_hyphen_values = true,
        help = "Length of the derived key in bytes, with 0 being the full digest length"
    )]
    pub key_length: i64,

    #[arg(
        long,
        help = "Output the encoded password in the legacy SimpleID 1.x format"
    )]
    pub legacy: bool,

    #[arg(
        long = "no-interaction",
        help = "Never prompt; fail if no password argument is given"
    )]
    pub no_interaction: bool,
}

#[derive(Debug, Args)]
pub struct SecretArgs {
    #[arg(
        short = 'l',
        long,
        default_value_t = 64,
        allow_hyphen_values = true,
        help = "Length of the secret to be generated"
    )]
    pub length: i64,
}

#[derive(Debug, Args)]
pub struct ApiArgs {
    #[arg(help = "The API endpoint")]
    pub route: String,

    #[arg(help = "Parameters for the API endpoint")]
    pub params: Vec<String>,

    #[arg(
        short = 'd',
        long = "simpleid-dir",
        env = "SIMPLEID_DIR",
        default_value = ".",
        help = "Directory containing the SimpleID installation (index.php)"
    )]
    pub simpleid_dir: PathBuf,

    #[arg(
        long = "php-bin",
        env = "SIMPLEID_PHP_BIN",
        help = "Path to the PHP executable, optionally with extra arguments"
    )]
    pub php_bin: Option<String>,

    #[arg(long, help = "Render the full invocation result as JSON")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct MigrateConfigArgs {
    #[arg(help = "SimpleID 1 config.php, or a directory to search with the usual lookup")]
    pub input: PathBuf,

    #[arg(help = "Output file name, or STDOUT if missing")]
    pub output: Option<PathBuf>,
}
