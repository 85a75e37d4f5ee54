use chrono::Local;
use clap::{Parser, Subcommand};
use restic_backup::backup::backup_config::BackupConfig;
use restic_backup::backup::command::shell::ShellCommandRunner;
use restic_backup::backup::metrics::export_metrics_to_file;
use restic_backup::backup::notifications::retry::{NotificationDispatcher, RetryPolicy};
use restic_backup::backup::notifications::smtp::SmtpNotification;
use restic_backup::backup::password::resolve_password;
use restic_backup::backup::pipeline::BackupRun;
use restic_backup::backup::redacted::RedactedString;
use restic_backup::backup::result_error::error::Error;
use restic_backup::backup::result_error::result::Result;
use restic_backup::backup::result_error::AddMsg;
use restic_backup::backup::run_config::RunConfig;
use restic_backup::backup::validate::validate_paths_exist;
use std::path::{Path, PathBuf};
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use validator::ValidationErrors;

/// Back up folders with restic to an rclone remote, then report by metrics and email
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Location of config file
    #[arg(short, long, default_value = "config.yml")]
    config: PathBuf,
    /// Restic repository password, prompted for when not set
    #[arg(long, env = "RESTIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full backup lifecycle on the given folders
    Backup {
        /// Repository label, last segment of the remote path
        #[arg(short, long, default_value = "")]
        repo: String,
        /// Prometheus textfile to write, empty to disable
        #[arg(long, default_value = "backup.prom")]
        metrics_file: PathBuf,
        #[arg(required = true)]
        folders: Vec<String>,
    },
    /// Run any restic command against the configured repository
    Restic {
        #[arg(short, long, default_value = "")]
        repo: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn init_logging() {
    let filter = if std::env::var("ENV").is_ok_and(|env| env == "dev") {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(path: &Path) -> Result<BackupConfig> {
    let config = BackupConfig::load(path)?;
    let version = config.check_restic_version(&ShellCommandRunner)?;
    info!("Using restic {}", version);
    Ok(config)
}

fn backup(
    config: BackupConfig,
    password: RedactedString,
    repo: String,
    metrics_file: PathBuf,
    folders: Vec<String>,
) -> Result<()> {
    validate_paths_exist(&folders).map_err(|e| {
        let mut errors = ValidationErrors::new();
        errors.add("folders", e);
        Error::from(errors)
    })?;

    let run_config = RunConfig::from_backup_config(&config, repo, folders, password);
    let dispatcher = if *run_config.email().enabled() {
        let channel = SmtpNotification::new(run_config.email())
            .add_msg("Cannot set up email notification")?;
        Some(NotificationDispatcher::new(
            channel,
            RetryPolicy::from(run_config.email()),
        ))
    } else {
        None
    };

    let started_at = Local::now();
    let mut run = BackupRun::new(run_config, ShellCommandRunner);

    if let Err(e) = run.execute_pre_command() {
        warn!("{}", e);
    }
    let status = run.run_lifecycle();
    if let Err(e) = run.execute_post_command() {
        warn!("{}", e);
    }
    info!("Backup status: {}", status);

    if !metrics_file.as_os_str().is_empty() {
        if let Err(e) = export_metrics_to_file(&metrics_file, &run.metrics()) {
            warn!("{}", e);
        }
    }

    if let Some(dispatcher) = dispatcher {
        let report = run.report(&started_at);
        if let Err(e) = dispatcher.dispatch(report.subject(), report.body()) {
            warn!("Cannot send backup report: {}", e);
        }
    }
    Ok(())
}

fn restic(config: BackupConfig, password: RedactedString, repo: String, args: Vec<String>) -> Result<i32> {
    let run_config = RunConfig::from_backup_config(&config, repo, Vec::new(), password);
    let run = BackupRun::new(run_config, ShellCommandRunner);
    let output = run.execute_raw(&args.join(" "))?;
    if output.is_success() {
        print!("{}", output.output);
    } else {
        eprint!("{}", output.output);
    }
    Ok(output.exit_code)
}

fn main() {
    init_logging();
    let args = Args::parse();

    let res = load_config(&args.config)
        .add_msg(format!("Config check failed: {:?}", &args.config))
        .and_then(|config| resolve_password(args.password).map(|p| (config, p)))
        .and_then(|(config, password)| match args.command {
            Command::Backup {
                repo,
                metrics_file,
                folders,
            } => backup(config, password, repo, metrics_file, folders).map(|_| 0),
            Command::Restic { repo, args } => restic(config, password, repo, args),
        });

    match res {
        Ok(code) => exit(code),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    }
}
