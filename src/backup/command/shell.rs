use crate::backup::command::{CommandOutput, CommandRunner};
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use std::process::{Command, Stdio};

/// Runs command lines through `sh -c` with stderr redirected onto stdout.
///
/// Both streams share one pipe, so the captured text keeps the order in which
/// the child wrote it. Single-quoted arguments are honoured by the shell.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    #[named]
    fn execute(&self, command_line: &str, envs: &[(&str, &str)]) -> Result<CommandOutput> {
        let command_line = command_line.trim();
        let output = Command::new("sh")
            .arg("-c")
            .arg(format!("{{ {command_line}\n}} 2>&1"))
            .envs(envs.iter().copied())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .map_err(Error::from)
            .add_msg(format!("Cannot start {:?}", command_line))
            .add_fn_name(function_path!())?;

        let exit_code = output.status.code().unwrap_or(-1);
        tracing::trace!("{:?} exited with {}", command_line, exit_code);
        Ok(CommandOutput::new(
            exit_code,
            String::from_utf8_lossy(&output.stdout),
        ))
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_and_output() {
        let out = ShellCommandRunner.execute("echo hello", &[]).unwrap();
        assert_eq!(out, CommandOutput::new(0, "hello\n"));

        let out = ShellCommandRunner.execute("exit 3", &[]).unwrap();
        assert_eq!(out.exit_code, 3);
        assert!(!out.is_success());
    }

    #[test]
    fn test_streams_are_merged_in_order() {
        let out = ShellCommandRunner
            .execute("echo one; echo two 1>&2; echo three", &[])
            .unwrap();
        assert_eq!(out.output, "one\ntwo\nthree\n");
    }

    #[test]
    fn test_env_overrides() {
        let out = ShellCommandRunner
            .execute("printf %s \"$RESTIC_PASSWORD\"", &[("RESTIC_PASSWORD", "s3cret")])
            .unwrap();
        assert_eq!(out.output, "s3cret");
    }

    #[test]
    fn test_quoted_path_with_space() {
        let out = ShellCommandRunner
            .execute("printf '[%s]' '/srv/my data'", &[])
            .unwrap();
        assert_eq!(out.output, "[/srv/my data]");
    }
}
