//! The restic step pipeline.
//!
//! [`BackupRun`] owns everything one invocation needs: the [`RunConfig`], the
//! [`CommandRunner`] and the [`RunHistory`] it fills. Steps run strictly one
//! after the other and a failed step stops the lifecycle: later steps are not
//! executed and leave no trace in the history.

use crate::backup::command::{CommandOutput, CommandRunner};
use crate::backup::function_path;
use crate::backup::metrics::{build_metrics, MetricContext, MetricRecord};
use crate::backup::report::Report;
use crate::backup::restic::{parse_snapshot_id, ResticStats};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::run_config::RunConfig;
use crate::backup::step::{AggregateStatus, RunHistory, Step, StepResult, StepStatus};
use chrono::{DateTime, TimeZone};
use function_name::named;
use itertools::Itertools;
use std::fmt::Display;
use std::time::Instant;
use tracing::{debug, info, warn};

static RESTIC_PASSWORD_ENV: &str = "RESTIC_PASSWORD";

pub struct BackupRun<R> {
    config: RunConfig,
    runner: R,
    history: RunHistory,
}

impl<R: CommandRunner> BackupRun<R> {
    pub fn new(config: RunConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            history: RunHistory::default(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn status(&self) -> AggregateStatus {
        self.history.status()
    }

    /// InitRepo, StartBackup, Cleanup then CheckRepoIntegrity.
    pub fn run_lifecycle(&mut self) -> AggregateStatus {
        self.init_repo();
        self.start_backup();
        self.cleanup();
        self.check_repo_integrity();
        self.status()
    }

    /// Runs `restic init`. An already initialized repository is not an error.
    pub fn init_repo(&mut self) {
        self.run_step(Step::InitRepo, "init".to_string(), |out| {
            out.exit_code == 0 || (out.exit_code == 1 && out.output.contains("already exists"))
        });
    }

    /// Runs `restic backup`. Succeeds only when restic reports a saved snapshot.
    pub fn start_backup(&mut self) {
        let exclusion = self
            .config
            .exclusion_file()
            .as_ref()
            .map(|f| format!("--exclude-file={}", f.display()));
        let paths = self.config.paths().iter().map(|p| {
            if p.contains(' ') {
                format!("'{p}'")
            } else {
                p.clone()
            }
        });
        let operation = std::iter::once("backup".to_string())
            .chain(exclusion)
            .chain(std::iter::once(self.tag_flag()))
            .chain(paths)
            .join(" ");

        self.run_step(Step::StartBackup, operation, |out| {
            out.is_success() && parse_snapshot_id(&out.output).is_some()
        });
    }

    /// Runs `restic forget --prune` with the retention flags of the run.
    pub fn cleanup(&mut self) {
        let operation = std::iter::once("forget".to_string())
            .chain(self.config.retention_flags())
            .chain([self.tag_flag(), "--prune".to_string(), "-c".to_string()])
            .join(" ");

        self.run_step(Step::Cleanup, operation, CommandOutput::is_success);
    }

    /// Runs `restic check`.
    ///
    /// "no errors were found" in the output counts as success whatever the exit code.
    pub fn check_repo_integrity(&mut self) {
        self.run_step(Step::CheckRepoIntegrity, "check".to_string(), |out| {
            out.is_success() || out.output.contains("no errors were found")
        });
    }

    fn tag_flag(&self) -> String {
        format!("--tag={}", self.config.tag())
    }

    fn run_step<F: FnOnce(&CommandOutput) -> bool>(
        &mut self,
        step: Step,
        operation: String,
        is_success: F,
    ) {
        info!("{}", step.name());
        if self.history.is_halted() {
            let failed = self.history.last().map(StepResult::name).unwrap_or_default();
            warn!("Error in the step: {}, bypassing current step.", failed);
            return;
        }

        let start = Instant::now();
        let (status, output) = match self.execute_raw(&operation) {
            Ok(out) => (StepStatus::from_success(is_success(&out)), out.output),
            Err(e) => {
                warn!("{} could not run: {}", step.short_name(), e);
                (StepStatus::Failed, e.to_string())
            }
        };
        if status == StepStatus::Failed {
            warn!("{} failed", step.short_name());
        }
        self.history
            .push(StepResult::new(step, status, output, start.elapsed()));
    }

    /// Runs `restic -r <repository> <operation>` with the repository password set.
    ///
    /// The output comes back untouched and nothing is recorded in the history.
    #[named]
    pub fn execute_raw(&self, operation: &str) -> Result<CommandOutput> {
        let command = format!(
            "{} -r {} {}",
            self.config.restic().display(),
            self.config.repository_locator(),
            operation
        );
        debug!("{}", command);
        let output = self
            .runner
            .execute(
                &command,
                &[(RESTIC_PASSWORD_ENV, self.config.password().inner())],
            )
            .add_fn_name(function_path!())?;
        if !output.output.is_empty() {
            debug!("{}", output.output);
        }
        Ok(output)
    }

    /// Runs the configured pre command, if any. Independent of the step lifecycle.
    pub fn execute_pre_command(&self) -> Result<Option<CommandOutput>> {
        self.execute_hook("Pre", self.config.pre_command().as_deref())
    }

    /// Runs the configured post command, if any. Independent of the step lifecycle.
    pub fn execute_post_command(&self) -> Result<Option<CommandOutput>> {
        self.execute_hook("Post", self.config.post_command().as_deref())
    }

    #[named]
    fn execute_hook(&self, kind: &str, command: Option<&str>) -> Result<Option<CommandOutput>> {
        let Some(command) = command else {
            return Ok(None);
        };

        info!("Executing {kind}-Command");
        let output = self
            .runner
            .execute(command, &[])
            .add_msg(format!("Error during {kind}-Command"))
            .add_fn_name(function_path!())?;
        if output.is_success() {
            Ok(Some(output))
        } else {
            Err(
                Error::command_failed(command, output.exit_code, output.output)
                    .add_msg(format!("Error during {kind}-Command")),
            )
        }
    }

    pub fn stats(&self) -> ResticStats {
        ResticStats::from_history(&self.history)
    }

    pub fn metrics(&self) -> Vec<MetricRecord> {
        let context = MetricContext::builder()
            .repository(self.config.repository())
            .client(self.config.client_name())
            .server_name(self.config.server_name())
            .build();
        build_metrics(&self.stats(), self.status(), &context)
    }

    pub fn report<Tz: TimeZone>(&self, started_at: &DateTime<Tz>) -> Report
    where
        Tz::Offset: Display,
    {
        Report::render(&self.config.backup_name(), &self.history, started_at)
    }
}
