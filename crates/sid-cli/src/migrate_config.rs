//! Converts a SimpleID 1 `config.php` into the SimpleID 2 layout.
//!
//! The 1.x file is a sequence of `define('SIMPLEID_...', value);` statements.
//! Values are extracted textually (string, boolean and integer literals only;
//! the tool does not execute PHP), mapped onto the 2.x option names, and
//! rendered back as a generated `config.php`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use sid_core::install::find_config_file;

/// One-to-one renames from 1.x defines to 2.x options.
const OPTION_MAP: &[(&str, &str)] = &[
    ("SIMPLEID_BASE_URL", "canonical_base_path"),
    ("SIMPLEID_IDENTITIES_DIR", "identities_dir"),
    ("SIMPLEID_STORE_DIR", "store_dir"),
    ("SIMPLEID_ALLOW_PLAINTEXT", "allow_plaintext"),
    ("SIMPLEID_ALLOW_AUTOCOMPLETE", "allow_autocomplete"),
    ("SIMPLEID_VERIFY_RETURN_URL_USING_REALM", "openid_verify_return_url"),
    ("SIMPLEID_LOCALE", "locale"),
    ("SIMPLEID_DATE_TIME_FORMAT", "date_time_format"),
    ("SIMPLEID_LOGFILE", "log_file"),
];

/// 1.x numeric log levels in ascending verbosity.
const LOG_LEVEL_NAMES: &[&str] = &["critical", "error", "warning", "notice", "info", "debug"];

/// Configuration every 2.x installation needs regardless of the 1.x input.
const DEFAULT_MODULES: &[&str] = &[
    "SimpleID\\Base\\MyModule",
    "SimpleID\\Auth\\PasswordAuthSchemeModule",
    "SimpleID\\Auth\\RememberMeAuthSchemeModule",
    "SimpleID\\Auth\\OTPAuthSchemeModule",
    "SimpleID\\Protocols\\OpenID\\OpenIDModule",
    "SimpleID\\Protocols\\OpenID\\Extensions\\SRegOpenIDExtensionModule",
    "SimpleID\\Protocols\\OpenID\\Extensions\\PAPEOpenIDExtensionModule",
    "SimpleID\\Protocols\\WebFinger\\WebFingerModule",
    "SimpleID\\Protocols\\Connect\\ConnectModule",
    "SimpleID\\Protocols\\Connect\\ConnectClientRegistrationModule",
];

#[derive(Debug, Clone, PartialEq)]
enum PhpValue {
    Str(String),
    Bool(bool),
    Int(i64),
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigValue {
    Str(String),
    Bool(bool),
    Int(i64),
    List(Vec<String>),
}

#[derive(Debug)]
pub struct MigrationOutcome {
    pub rendered: String,
    pub warnings: Vec<String>,
}

/// Runs the migration against `input` (a file, or a directory searched with
/// the usual configuration lookup), writing to `output` or stdout.
pub fn run_migrate_config(input: &Path, output: Option<&Path>) -> Result<i32> {
    let source_path = resolve_input(input)?;
    let source = std::fs::read_to_string(&source_path)
        .with_context(|| format!("failed to read {}", source_path.display()))?;

    let outcome = migrate_config_text(&source);
    for warning in &outcome.warnings {
        eprintln!("{warning}");
    }

    match output {
        Some(path) => std::fs::write(path, &outcome.rendered)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => print!("{}", outcome.rendered),
    }
    Ok(0)
}

fn resolve_input(input: &Path) -> Result<PathBuf> {
    if input.is_dir() {
        return find_config_file(input)
            .ok_or_else(|| anyhow!("no config.php found under '{}'", input.display()));
    }
    Ok(input.to_path_buf())
}

/// Pure text-to-text transform, separated out for testing.
pub fn migrate_config_text(source: &str) -> MigrationOutcome {
    let mut warnings = Vec::new();
    let defines = parse_defines(source, &mut warnings);
    let entries = build_config(&defines, &mut warnings);
    MigrationOutcome {
        rendered: render_config(&entries),
        warnings,
    }
}

fn parse_defines(source: &str, warnings: &mut Vec<String>) -> Vec<(String, PhpValue)> {
    let pattern = Regex::new(r"define\s*\(\s*'([A-Za-z0-9_]+)'\s*,\s*(.+?)\s*\)\s*;")
        .expect("define pattern is valid");

    let mut defines = Vec::new();
    for capture in pattern.captures_iter(source) {
        let name = capture[1].to_string();
        match parse_php_literal(&capture[2]) {
            Some(value) => defines.push((name, value)),
            None => warnings.push(format!(
                "Warning: cannot interpret the value of {name}; it was skipped."
            )),
        }
    }
    defines
}

fn parse_php_literal(raw: &str) -> Option<PhpValue> {
    let raw = raw.trim();
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            let inner = &raw[1..raw.len() - 1];
            let unescaped = inner
                .replace(&format!("\\{quote}"), &quote.to_string())
                .replace("\\\\", "\\");
            return Some(PhpValue::Str(unescaped));
        }
    }
    match raw.to_ascii_lowercase().as_str() {
        "true" => return Some(PhpValue::Bool(true)),
        "false" => return Some(PhpValue::Bool(false)),
        _ => {}
    }
    raw.parse::<i64>().ok().map(PhpValue::Int)
}

fn build_config(
    defines: &[(String, PhpValue)],
    warnings: &mut Vec<String>,
) -> Vec<(String, ConfigValue)> {
    let lookup = |name: &str| {
        defines
            .iter()
            .find(|(define, _)| define == name)
            .map(|(_, value)| value)
    };

    let mut entries: Vec<(String, ConfigValue)> = Vec::new();

    for (old, new) in OPTION_MAP {
        if let Some(value) = lookup(old) {
            entries.push(((*new).to_string(), config_value(value)));
        }
    }

    if matches!(
        lookup("SIMPLEID_CLEAN_URL"),
        Some(PhpValue::Bool(false)) | Some(PhpValue::Int(0))
    ) {
        warnings
            .push("SIMPLEID_CLEAN_URL is set to false. This is not supported by SimpleID 2.".to_string());
    }

    if let Some(PhpValue::Str(store)) = lookup("SIMPLEID_STORE") {
        if store.as_str() != "filesystem" {
            warnings.push(
                "Warning: Custom SIMPLEID_STORE. This will need to be migrated manually."
                    .to_string(),
            );
        }
    }

    if let Some(PhpValue::Str(cache_dir)) = lookup("SIMPLEID_CACHE_DIR") {
        entries.push(("cache".to_string(), ConfigValue::Str(format!("folder={cache_dir}"))));
    }

    if let Some(PhpValue::Int(level)) = lookup("SIMPLEID_LOGLEVEL") {
        match usize::try_from(*level).ok().and_then(|index| LOG_LEVEL_NAMES.get(index)) {
            Some(name) => {
                entries.push(("log_level".to_string(), ConfigValue::Str((*name).to_string())))
            }
            None => warnings.push(format!(
                "Warning: SIMPLEID_LOGLEVEL {level} is out of range; it was skipped."
            )),
        }
    }

    entries.push(("temp_dir".to_string(), ConfigValue::Str("/tmp".to_string())));
    entries.push((
        "webfinger_access_control_allow_origin".to_string(),
        ConfigValue::Str("*".to_string()),
    ));
    entries.push(("acr".to_string(), ConfigValue::Int(1)));
    entries.push((
        "logger".to_string(),
        ConfigValue::Str("SimpleID\\Util\\DefaultLogger".to_string()),
    ));
    entries.push((
        "modules".to_string(),
        ConfigValue::List(DEFAULT_MODULES.iter().map(|module| (*module).to_string()).collect()),
    ));

    entries
}

fn render_config(entries: &[(String, ConfigValue)]) -> String {
    let mut rendered = String::from(
        "<?php\n\
         #\n\
         # SimpleID configuration file.\n\
         #\n\
         # ** Generated by simpleid-tool **\n\
         #\n\
         # ** Review this file against config.php.dist and make additional manual\n\
         # changes **\n\
         #\n\
         $config =\n\
         array (\n",
    );

    for (key, value) in entries {
        match value {
            ConfigValue::Str(text) => {
                let _ = writeln!(rendered, "  '{key}' => {},", quote_php_string(text));
            }
            ConfigValue::Bool(flag) => {
                let _ = writeln!(rendered, "  '{key}' => {flag},");
            }
            ConfigValue::Int(number) => {
                let _ = writeln!(rendered, "  '{key}' => {number},");
            }
            ConfigValue::List(items) => {
                let _ = writeln!(rendered, "  '{key}' => \n  array (");
                for (index, item) in items.iter().enumerate() {
                    let _ = writeln!(rendered, "    {index} => {},", quote_php_string(item));
                }
                rendered.push_str("  ),\n");
            }
        }
    }

    rendered.push_str(
        ");\n\
         \n\
         #\n\
         # Insert additional PHP code here as required.\n\
         #\n\
         \n\
         return $config;\n\
         \n\
         ?>\n",
    );
    rendered
}

fn quote_php_string(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn config_value(value: &PhpValue) -> ConfigValue {
    match value {
        PhpValue::Str(text) => ConfigValue::Str(text.clone()),
        PhpValue::Bool(flag) => ConfigValue::Bool(*flag),
        PhpValue::Int(number) => ConfigValue::Int(*number),
    }
}
