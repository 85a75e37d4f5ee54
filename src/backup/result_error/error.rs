use crate::backup::result_error::{AddFunctionName, AddMsg};
use itertools::Itertools;
use std::fmt::Debug;
use thiserror::Error;
use thiserror_ext::Construct;

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    LettreEmail(#[from] lettre::error::Error),
    #[error(transparent)]
    LettreSmtp(#[from] lettre::transport::smtp::Error),
    #[error("Some fields are required in the configuration:\n{}", .0.iter().map(|f| format!("- {f}")).join("\n"))]
    MissingRequiredFields(Vec<String>),
    #[error("Cannot find restic version in output: {output:?}")]
    ResticVersionNotFound { output: String },
    #[error("Email host must be set when email is enabled")]
    EmailHostMissing,
    #[error("Invalid email configuration: {0}")]
    InvalidEmailConfig(String),
    #[error("Cannot read the restic password: {0}")]
    PasswordUnavailable(String),
    #[error("Command {command:?} exited with code {exit_code}:\n{}", indent::indent_all_with("  ", output.to_string()))]
    CommandFailed {
        command: String,
        exit_code: i32,
        output: String,
    },
    #[error("{0}")]
    SmtpSendError(String),
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFunctionName { fn_name: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Error::WithFunctionName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}
