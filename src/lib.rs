//! # restic_backup
//!
//! Drives [restic](https://restic.net) against an rclone remote, then reports what happened.
//!
//! ## Features
//!
//! - **Step Pipeline**: init, backup, forget/prune and check, stopping at the first failed step
//! - **Pre/Post Hooks**: arbitrary shell commands around the pipeline
//! - **Metrics**: restic console output scraped into a Prometheus textfile
//! - **Email Report**: SMTP delivery with bounded retry and exponential backoff
//! - **Helper Mode**: run any restic command against the configured repository
//!
//! ## Quick Start
//!
//! ```no_run
//! use restic_backup::backup::backup_config::BackupConfig;
//! use restic_backup::backup::command::shell::ShellCommandRunner;
//! use restic_backup::backup::pipeline::BackupRun;
//! use restic_backup::backup::run_config::RunConfig;
//!
//! let config: BackupConfig = serde_yml::from_reader(std::fs::File::open("config.yml")?)?;
//! let run_config = RunConfig::from_backup_config(&config, "daily", vec!["/srv".into()], "secret");
//!
//! let mut run = BackupRun::new(run_config, ShellCommandRunner);
//! run.run_lifecycle();
//! println!("{}", run.status());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
