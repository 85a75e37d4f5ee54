//! Restic repository password acquisition.
//!
//! The password comes from `--password`/`RESTIC_PASSWORD` when set, otherwise it
//! is typed on the terminal with echo disabled. An empty or unreadable password
//! is an error, the run never starts without one.

use crate::backup::function_path;
use crate::backup::redacted::RedactedString;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use function_name::named;
use std::io::Write;
use zeroize::Zeroize;

static PROMPT: &str = "Restic password: ";

pub fn resolve_password(given: Option<String>) -> Result<RedactedString> {
    match given {
        Some(password) => non_empty(password.into()),
        None => prompt_password(),
    }
}

/// Prompts on standard error and reads keys in raw mode so nothing is echoed.
#[named]
pub fn prompt_password() -> Result<RedactedString> {
    eprint!("{PROMPT}");
    std::io::stderr().flush()?;

    terminal::enable_raw_mode()
        .map_err(Error::from)
        .add_msg("No terminal to read the restic password from")
        .add_fn_name(function_path!())?;
    let password = read_hidden_line(std::iter::from_fn(|| Some(event::read())));
    let restored = terminal::disable_raw_mode();
    eprintln!();

    restored.map_err(Error::from).add_fn_name(function_path!())?;
    password.add_fn_name(function_path!())
}

/// Collects key presses up to `Enter`.
///
/// `Ctrl-C`, `Ctrl-D` or the end of `events` abort the read.
pub fn read_hidden_line<I: IntoIterator<Item = std::io::Result<Event>>>(
    events: I,
) -> Result<RedactedString> {
    let mut line = String::new();
    for event in events {
        let key = match event {
            Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => key,
            Ok(_) => continue,
            Err(e) => {
                line.zeroize();
                return Err(e.into());
            }
        };
        match key.code {
            KeyCode::Enter => return non_empty(line.into()),
            KeyCode::Char('c' | 'd') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                line.zeroize();
                return Err(Error::password_unavailable("input aborted"));
            }
            KeyCode::Char(c) => line.push(c),
            KeyCode::Backspace => {
                line.pop();
            }
            _ => {}
        }
    }
    line.zeroize();
    Err(Error::password_unavailable("end of input"))
}

fn non_empty(password: RedactedString) -> Result<RedactedString> {
    if password.inner().is_empty() {
        Err(Error::password_unavailable("password is empty"))
    } else {
        Ok(password)
    }
}
