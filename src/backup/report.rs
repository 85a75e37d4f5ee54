//! Plain text run report, used as the email body.

use crate::backup::step::RunHistory;
use chrono::{DateTime, TimeZone};
use getset::Getters;
use std::fmt::{Display, Formatter};
use std::time::Duration;

const SECONDS_IN_MINUTE: u64 = 60;
const SECONDS_IN_HOUR: u64 = 60 * SECONDS_IN_MINUTE;
const SECONDS_IN_DAY: u64 = 24 * SECONDS_IN_HOUR;

#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct Report {
    subject: String,
    body: String,
}

/// `Subject: <subject>`, a blank line, then the body.
impl Display for Report {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Subject: {}\n\n{}", self.subject, self.body)
    }
}

impl Report {
    /// `backup_name` is the `<client>/<server>/<repository>` path, `started_at`
    /// the wall clock time the run began.
    pub fn render<Tz: TimeZone>(
        backup_name: &str,
        history: &RunHistory,
        started_at: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: Display,
    {
        let status = history.status();
        let subject = format!(
            "[{}] Backup '{}' - {}",
            status.title(),
            backup_name,
            started_at.format("%Y-%m-%d %H:%M:%S")
        );

        let mut body = String::new();
        for result in history.iter() {
            let border = "#".repeat(result.name().len() + 6);
            body.push_str(&format!("{border}\n# {}\n{border}\n", result.name()));
            body.push_str(&result.output);
            if !result.output.is_empty() && !result.output.ends_with('\n') {
                body.push('\n');
            }
            body.push_str(&format!("Duration: {}\n\n", human_duration(result.duration)));
        }
        body.push_str(&format!(
            "Total Duration: {}\n",
            human_duration(history.total_duration())
        ));
        body.push_str(if status.is_success() {
            "Backup finished successfully !"
        } else {
            "Backup failed !"
        });

        Self { subject, body }
    }
}

/// Largest unit first, truncated to whole seconds.
///
/// At one day and above the seconds are dropped: `1d 2h 3m`.
pub fn human_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / SECONDS_IN_DAY;
    let hours = total % SECONDS_IN_DAY / SECONDS_IN_HOUR;
    let minutes = total % SECONDS_IN_HOUR / SECONDS_IN_MINUTE;
    let seconds = total % SECONDS_IN_MINUTE;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::step::{Step, StepResult, StepStatus};
    use chrono::Utc;

    fn started_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 2, 0, 0).unwrap()
    }

    #[test]
    fn test_human_duration() {
        assert_eq!(human_duration(Duration::ZERO), "0s");
        assert_eq!(human_duration(Duration::from_millis(59_999)), "59s");
        assert_eq!(human_duration(Duration::from_secs(61)), "1m 1s");
        assert_eq!(human_duration(Duration::from_secs(3600)), "1h 0m 0s");
        assert_eq!(human_duration(Duration::from_secs(3 * 3600 + 125)), "3h 2m 5s");
        assert_eq!(
            human_duration(Duration::from_secs(2 * 86400 + 3 * 3600 + 4 * 60 + 5)),
            "2d 3h 4m"
        );
    }

    #[test]
    fn test_render_success() {
        let mut history = RunHistory::default();
        history.push(StepResult::new(
            Step::InitRepo,
            StepStatus::Success,
            "created restic repository 3f1a2b4c\n",
            Duration::from_secs(2),
        ));
        history.push(StepResult::new(
            Step::StartBackup,
            StepStatus::Success,
            "snapshot 9f8e7d6c saved",
            Duration::from_secs(63),
        ));

        let report = Report::render("acme/web01/daily", &history, &started_at());

        assert_eq!(
            report.subject(),
            "[Success] Backup 'acme/web01/daily' - 2024-05-01 02:00:00"
        );
        assert_eq!(
            report.body(),
            "\
###########################
# Initialize Repository
###########################
created restic repository 3f1a2b4c
Duration: 2s

################
# Backing up
################
snapshot 9f8e7d6c saved
Duration: 1m 3s

Total Duration: 1m 5s
Backup finished successfully !"
        );
        assert!(report
            .to_string()
            .starts_with("Subject: [Success] Backup 'acme/web01/daily' - 2024-05-01 02:00:00\n\n####"));
    }

    #[test]
    fn test_render_failure() {
        let mut history = RunHistory::default();
        history.push(StepResult::new(
            Step::InitRepo,
            StepStatus::Failed,
            "Fatal: create repository failed\n",
            Duration::from_secs(1),
        ));

        let report = Report::render("web01/daily", &history, &started_at());

        assert!(report.subject().starts_with("[Failed] Backup 'web01/daily'"));
        assert!(report.body().ends_with("Total Duration: 1s\nBackup failed !"));
    }
}
