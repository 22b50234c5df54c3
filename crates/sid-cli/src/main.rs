//! `simpleid-tool`: companion administration CLI for SimpleID.
//!
//! Local tasks (password encoding, secret generation, configuration
//! migration) run entirely in-process; the `api` command launches the host
//! application's own entry point out-of-process and relays its result.

mod cli_args;
mod migrate_config;
mod prompt;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use sid_core::bridge;
use sid_core::password::{HashAlgorithm, HashFormat, PasswordEncoder};
use sid_core::secret::generate_secret;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::cli_args::{ApiArgs, Cli, MigrateConfigArgs, PasswdArgs, SecretArgs, ToolCommand};
use crate::prompt::{PasswordPrompt, TerminalPrompt};

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        ToolCommand::Passwd(args) => run_passwd(args, &TerminalPrompt),
        ToolCommand::Secret(args) => run_secret(args),
        ToolCommand::Api(args) => run_api(args, cli.verbose),
        ToolCommand::MigrateConfig(args) => run_migrate_config(args),
    }
}

fn run_passwd(args: &PasswdArgs, prompt: &dyn PasswordPrompt) -> Result<i32> {
    let algorithm: HashAlgorithm = args.algorithm.parse()?;
    let format = if args.legacy {
        HashFormat::Legacy
    } else {
        HashFormat::Current
    };
    let iterations = args
        .iterations
        .unwrap_or_else(|| format.default_iterations());
    let key_length = validate_length(args.key_length, "key length")?;
    if args.legacy && key_length != 0 {
        warn!("the legacy format always derives the full digest; ignoring --key-length");
    }

    // All parameters validated before the password is read or any salt drawn.
    let encoder = PasswordEncoder::new(algorithm, iterations, key_length, format)?;
    let password = resolve_password(args, prompt)?;
    println!("{}", encoder.encode(&password)?);
    Ok(0)
}

fn resolve_password(args: &PasswdArgs, prompt: &dyn PasswordPrompt) -> Result<String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }
    if args.no_interaction {
        bail!("password required");
    }

    let password = prompt.prompt_hidden("Password: ")?;
    if password.trim().is_empty() {
        bail!("the password cannot be blank");
    }
    let verify = prompt.prompt_hidden("Re-type password: ")?;
    if password != verify {
        bail!("passwords do not match");
    }
    Ok(password)
}

fn run_secret(args: &SecretArgs) -> Result<i32> {
    let length = validate_length(args.length, "length")?;
    println!("{}", generate_secret(length));
    Ok(0)
}

fn run_api(args: &ApiArgs, verbose: u8) -> Result<i32> {
    let result = bridge::invoke(
        &args.route,
        &args.params,
        &args.simpleid_dir,
        args.php_bin.as_deref(),
    )?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(result.exit_code);
    }

    if result.exit_code == 0 {
        println!("{}", result.output);
    } else if let Some(error) = &result.error {
        eprintln!("{} ({})", error.status, error.code);
        eprintln!("{}", error.description);
        if verbose > 0 {
            if let Some(trace) = &error.trace {
                eprintln!("{trace}");
            }
        }
    } else {
        // The subprocess failed in a shape the decoder does not recognize;
        // show its output as-is rather than dropping it.
        eprintln!("{}", result.output);
    }
    Ok(result.exit_code)
}

fn run_migrate_config(args: &MigrateConfigArgs) -> Result<i32> {
    migrate_config::run_migrate_config(&args.input, args.output.as_deref())
}

fn validate_length(value: i64, label: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| anyhow!("invalid {label}: {value}"))
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    // Command output owns stdout; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
