pub mod backup_config;
pub mod command;
pub mod metrics;
pub mod notifications;
pub mod password;
pub mod pipeline;
pub mod redacted;
pub mod report;
pub mod restic;
pub mod result_error;
pub mod run_config;
pub mod step;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
