// UI layer: colored status lines, spinners around network calls and the
// interactive template picker. Everything here is presentation; the command
// logic lives in the library modules.

use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::scaffold::ExtensionTemplate;

/// Green line on stdout.
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Plain progress line on stdout.
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Yellow line on stderr for things that went wrong but did not stop the command.
pub fn warning(msg: &str) {
    eprintln!("{}", msg.yellow());
}

/// Red line on stderr.
pub fn failure(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Spinner shown while a blocking call runs. Call `finish_and_clear` when done.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()));
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Ask which template to scaffold. `Select::interact()` is keyboard-driven:
/// arrow keys and Enter.
pub fn select_template() -> Result<ExtensionTemplate> {
    let items: Vec<&str> = ExtensionTemplate::ALL.iter().map(|t| t.description()).collect();
    let selection = Select::new()
        .with_prompt("Which kind of extension?")
        .items(&items)
        .default(0)
        .interact()?;
    Ok(ExtensionTemplate::ALL[selection])
}
