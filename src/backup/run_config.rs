//! Run-scoped settings.
//!
//! A [`RunConfig`] is assembled once per invocation from the YAML file and the
//! command line, then owned by the run for its whole duration.

use crate::backup::backup_config::BackupConfig;
use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::redacted::RedactedString;
use crate::backup::restic::DEFAULT_KEEP_DAILY;
use bon::Builder;
use getset::Getters;
use std::path::PathBuf;

#[derive(Clone, Debug, Builder, Getters)]
#[getset(get = "pub")]
pub struct RunConfig {
    #[builder(into)]
    restic: PathBuf,
    /// Repository label given on the command line, last segment of the locator.
    #[builder(into, default)]
    repository: String,
    #[builder(default)]
    paths: Vec<String>,
    #[builder(into)]
    exclusion_file: Option<PathBuf>,
    #[builder(default)]
    retention_options: Vec<String>,
    keep_daily: Option<u32>,
    /// Scopes backup and forget to this run's snapshots.
    #[builder(into)]
    tag: String,
    #[builder(into, default)]
    client_name: String,
    #[builder(into)]
    server_name: String,
    #[builder(into)]
    rclone_connection_name: String,
    #[builder(into)]
    bucket_name: String,
    #[builder(into)]
    password: RedactedString,
    #[builder(into)]
    pre_command: Option<String>,
    #[builder(into)]
    post_command: Option<String>,
    #[builder(default)]
    email: SmtpNotificationConfig,
}

impl RunConfig {
    pub fn from_backup_config<S: Into<String>, P: Into<RedactedString>>(
        config: &BackupConfig,
        repository: S,
        paths: Vec<String>,
        password: P,
    ) -> Self {
        let info = &config.information;
        RunConfig::builder()
            .restic(config.binaries.restic.clone())
            .repository(repository)
            .paths(paths)
            .maybe_exclusion_file(info.exclusion_file.clone())
            .retention_options(config.restic_options.clone())
            .maybe_keep_daily(info.keep_daily)
            .tag(info.server_name.clone())
            .client_name(info.client_name.clone())
            .server_name(info.server_name.clone())
            .rclone_connection_name(info.rclone_connection_name.clone())
            .bucket_name(info.bucket_name.clone())
            .password(password)
            .maybe_pre_command(non_empty(&config.backup.pre_exec))
            .maybe_post_command(non_empty(&config.backup.post_exec))
            .email(config.email.clone())
            .build()
    }

    /// `rclone:<connection>:<bucket>/<client>/<server>/<repository>/`
    pub fn repository_locator(&self) -> String {
        format!(
            "rclone:{}:{}",
            self.rclone_connection_name,
            create_path_name([
                self.bucket_name.as_str(),
                self.client_name.as_str(),
                self.server_name.as_str(),
                self.repository.as_str(),
            ])
        )
    }

    /// `<client>/<server>/<repository>`, used in the report subject.
    pub fn backup_name(&self) -> String {
        let path = create_path_name([
            self.client_name.as_str(),
            self.server_name.as_str(),
            self.repository.as_str(),
        ]);
        path.trim_end_matches('/').to_string()
    }

    /// Configured retention flags, or `--keep-daily` with the configured or default count.
    pub fn retention_flags(&self) -> Vec<String> {
        if self.retention_options.is_empty() {
            vec![format!(
                "--keep-daily={}",
                self.keep_daily.unwrap_or(DEFAULT_KEEP_DAILY)
            )]
        } else {
            self.retention_options.clone()
        }
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Joins segments so that each one ends with exactly one `/`. Empty segments are skipped.
pub fn create_path_name<'a, I: IntoIterator<Item = &'a str>>(segments: I) -> String {
    segments
        .into_iter()
        .map(|s| s.trim_end_matches('/'))
        .filter(|s| !s.is_empty())
        .fold(String::new(), |mut path, segment| {
            path.push_str(segment);
            path.push('/');
            path
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn run_config() -> RunConfig {
        RunConfig::builder()
            .restic("/usr/bin/restic")
            .repository("daily")
            .paths(vec!["/srv/data".to_string(), "/srv/my photos".to_string()])
            .tag("web01")
            .client_name("acme")
            .server_name("web01")
            .rclone_connection_name("s3")
            .bucket_name("backups")
            .password("s3cret")
            .build()
    }

    #[test]
    fn test_create_path_name() {
        assert_eq!(create_path_name(["a", "b", "c"]), "a/b/c/");
        assert_eq!(create_path_name(["a/", "b", "c/"]), "a/b/c/");
        assert_eq!(create_path_name(["a//", "", "c"]), "a/c/");
        assert_eq!(create_path_name(["", ""]), "");
    }

    #[test]
    fn test_repository_locator() {
        let config = run_config();
        assert_eq!(
            config.repository_locator(),
            "rclone:s3:backups/acme/web01/daily/"
        );
        assert_eq!(config.backup_name(), "acme/web01/daily");
    }

    #[test]
    fn test_repository_locator_without_client() {
        let config = RunConfig::builder()
            .restic("restic")
            .repository("daily")
            .tag("web01")
            .server_name("web01")
            .rclone_connection_name("s3")
            .bucket_name("backups/")
            .password("s3cret")
            .build();
        assert_eq!(config.repository_locator(), "rclone:s3:backups/web01/daily/");
        assert_eq!(config.backup_name(), "web01/daily");
    }

    #[test]
    fn test_retention_flags() {
        let config = run_config();
        assert_eq!(config.retention_flags(), vec!["--keep-daily=90"]);

        let config = RunConfig { keep_daily: Some(14), ..run_config() };
        assert_eq!(config.retention_flags(), vec!["--keep-daily=14"]);

        let config = RunConfig {
            retention_options: vec!["--keep-last=3".into(), "--keep-weekly=2".into()],
            keep_daily: Some(14),
            ..run_config()
        };
        assert_eq!(config.retention_flags(), vec!["--keep-last=3", "--keep-weekly=2"]);
    }

    #[test]
    fn test_from_backup_config() {
        let mut config = BackupConfig::default();
        config.information.server_name = "web01".into();
        config.information.rclone_connection_name = "s3".into();
        config.information.bucket_name = "backups".into();
        config.binaries.restic = "/usr/bin/restic".into();
        config.backup.pre_exec = Some("  ".into());
        config.backup.post_exec = Some("echo done".into());

        let run_config =
            RunConfig::from_backup_config(&config, "daily", vec!["/srv".into()], "s3cret");
        assert_eq!(run_config.tag(), "web01");
        assert_eq!(run_config.pre_command(), &None);
        assert_eq!(run_config.post_command().as_deref(), Some("echo done"));
        assert_eq!(run_config.password().inner(), "s3cret");
        assert_eq!(run_config.repository_locator(), "rclone:s3:backups/web01/daily/");
    }
}
