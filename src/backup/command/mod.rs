pub mod shell;

#[cfg(test)]
pub(crate) mod scripted;

use crate::backup::result_error::result::Result;

/// Exit code and merged stdout/stderr of one finished command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn new<S: Into<String>>(exit_code: i32, output: S) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Synchronous subprocess execution.
///
/// A nonzero exit code is not an error: it comes back inside [`CommandOutput`].
/// `Err` is reserved for commands that could not be started at all.
pub trait CommandRunner {
    fn execute(&self, command_line: &str, envs: &[(&str, &str)]) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn execute(&self, command_line: &str, envs: &[(&str, &str)]) -> Result<CommandOutput> {
        (**self).execute(command_line, envs)
    }
}
