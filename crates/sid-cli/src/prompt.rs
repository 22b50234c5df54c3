//! Hidden-input prompting, kept behind a capability trait so command logic
//! stays interaction-free and tests can inject canned answers.

use anyhow::Result;

pub trait PasswordPrompt {
    fn prompt_hidden(&self, label: &str) -> Result<String>;
}

/// Prompts on the controlling terminal without echoing the input.
pub struct TerminalPrompt;

impl PasswordPrompt for TerminalPrompt {
    fn prompt_hidden(&self, label: &str) -> Result<String> {
        Ok(rpassword::prompt_password(label)?)
    }
}
