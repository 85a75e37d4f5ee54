use derive_more::{Deref, Display};
use std::time::Duration;

/// Fixed lifecycle steps, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Step {
    InitRepo,
    StartBackup,
    Cleanup,
    CheckRepoIntegrity,
}

impl Step {
    pub const LIFECYCLE: [Step; 4] = [
        Step::InitRepo,
        Step::StartBackup,
        Step::Cleanup,
        Step::CheckRepoIntegrity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Step::InitRepo => "Initialize Repository",
            Step::StartBackup => "Backing up",
            Step::Cleanup => "Cleanup Repository",
            Step::CheckRepoIntegrity => "Check Repository Integrity",
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Step::InitRepo => "InitRepo",
            Step::StartBackup => "StartBackup",
            Step::Cleanup => "Cleanup",
            Step::CheckRepoIntegrity => "CheckRepoIntegrity",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum StepStatus {
    #[display("success")]
    Success,
    #[display("failed")]
    Failed,
}

impl StepStatus {
    pub fn from_success(success: bool) -> Self {
        if success {
            StepStatus::Success
        } else {
            StepStatus::Failed
        }
    }
}

/// Outcome of one executed step. Never modified once recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepResult {
    pub step: Step,
    pub status: StepStatus,
    pub output: String,
    pub duration: Duration,
}

impl StepResult {
    pub fn new<S: Into<String>>(step: Step, status: StepStatus, output: S, duration: Duration) -> Self {
        Self {
            step,
            status,
            output: output.into(),
            duration,
        }
    }

    pub fn name(&self) -> &'static str {
        self.step.name()
    }

    pub fn short_name(&self) -> &'static str {
        self.step.short_name()
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// Append-only record of the executed steps of one run.
///
/// Nothing is appended after a failed result: skipped steps leave no entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deref)]
pub struct RunHistory {
    results: Vec<StepResult>,
}

impl RunHistory {
    pub fn push(&mut self, result: StepResult) {
        debug_assert!(
            !self.is_halted(),
            "{} recorded after a failed step",
            result.short_name()
        );
        self.results.push(result);
    }

    /// `true` once a failed result has been recorded.
    pub fn is_halted(&self) -> bool {
        self.results.last().is_some_and(StepResult::is_failed)
    }

    pub fn total_duration(&self) -> Duration {
        self.results.iter().map(|r| r.duration).sum()
    }

    pub fn status(&self) -> AggregateStatus {
        AggregateStatus::from_history(self)
    }
}

/// Single verdict over a [`RunHistory`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum AggregateStatus {
    #[display("success")]
    Success,
    #[display("failed")]
    Failed,
    /// No step ran.
    #[display("unknown")]
    Unknown,
}

impl AggregateStatus {
    /// The first failed result decides, otherwise the last result does.
    pub fn from_history(history: &RunHistory) -> Self {
        history
            .iter()
            .find(|r| r.is_failed())
            .or_else(|| history.last())
            .map(|r| r.status.into())
            .unwrap_or(AggregateStatus::Unknown)
    }

    pub fn is_success(&self) -> bool {
        *self == AggregateStatus::Success
    }

    /// `Success`, `Failed` or `Unknown`.
    pub fn title(&self) -> &'static str {
        match self {
            AggregateStatus::Success => "Success",
            AggregateStatus::Failed => "Failed",
            AggregateStatus::Unknown => "Unknown",
        }
    }
}

impl From<StepStatus> for AggregateStatus {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Success => AggregateStatus::Success,
            StepStatus::Failed => AggregateStatus::Failed,
        }
    }
}
