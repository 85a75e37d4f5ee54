use crate::backup::command::CommandRunner;
use crate::backup::function_path;
use crate::backup::notifications::smtp::SmtpNotificationConfig;
use crate::backup::restic::parse_version;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::validate::{validate_executable_file, validate_file_exist};
use function_name::named;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use validator::Validate;

/// Top level YAML configuration.
///
/// Every section defaults to empty so a missing required key is reported by
/// [`BackupConfig::check_required_fields`] together with all the others, instead
/// of stopping at the first serde error.
#[skip_serializing_none]
#[derive(Clone, Default, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    #[serde(default)]
    #[validate(nested)]
    pub information: InformationConfig,
    #[serde(default)]
    #[validate(nested)]
    pub binaries: BinariesConfig,
    #[serde(default)]
    pub restic_options: Vec<String>,
    #[serde(default)]
    #[validate(nested)]
    pub email: SmtpNotificationConfig,
    #[serde(default)]
    pub backup: HooksConfig,
}

#[skip_serializing_none]
#[derive(Clone, Default, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct InformationConfig {
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub rclone_connection_name: String,
    #[serde(default)]
    pub bucket_name: String,
    #[validate(custom(function = validate_file_exist))]
    pub exclusion_file: Option<PathBuf>,
    #[validate(range(min = 1))]
    pub keep_daily: Option<u32>,
}

#[derive(Clone, Default, Serialize, Deserialize, Debug, Validate)]
#[serde(deny_unknown_fields)]
pub struct BinariesConfig {
    #[serde(default)]
    #[validate(custom(function = validate_executable_file))]
    pub restic: PathBuf,
}

/// Shell commands run once before and after the restic steps.
#[skip_serializing_none]
#[derive(Clone, Default, Serialize, Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct HooksConfig {
    pub pre_exec: Option<String>,
    pub post_exec: Option<String>,
}

impl BackupConfig {
    /// Reads, checks required fields and validates the YAML file at `path`.
    #[named]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration {:?}", path);
        File::open(path)
            .map_err(Error::from)
            .add_msg(format!("Impossible to open file {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .add_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|bc| bc.check_required_fields().map(|_| bc))
            .and_then(|bc| {
                bc.validate()
                    .map_err(Error::from)
                    .map(|_| bc)
                    .add_msg(format!("Config validation failed: {:?}", path))
            })
            .add_fn_name(function_path!())
    }

    /// Statically enumerated `(name, yaml key, missing)` table of the mandatory settings.
    fn required_fields(&self) -> [(&'static str, &'static str, bool); 4] {
        [
            (
                "Information->ServerName",
                "information.server_name",
                self.information.server_name.is_empty(),
            ),
            (
                "Information->RCloneConnectionName",
                "information.rclone_connection_name",
                self.information.rclone_connection_name.is_empty(),
            ),
            (
                "Information->BucketName",
                "information.bucket_name",
                self.information.bucket_name.is_empty(),
            ),
            (
                "Binaries->Restic",
                "binaries.restic",
                self.binaries.restic.as_os_str().is_empty(),
            ),
        ]
    }

    pub fn missing_required_fields(&self) -> Vec<String> {
        self.required_fields()
            .into_iter()
            .filter(|(_, _, missing)| *missing)
            .map(|(name, key, _)| format!("{name} ({key})"))
            .collect()
    }

    pub fn check_required_fields(&self) -> Result<()> {
        let missing = self.missing_required_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::missing_required_fields(missing))
        }
    }

    /// Runs `restic version` and returns the version token.
    #[named]
    pub fn check_restic_version<R: CommandRunner>(&self, runner: &R) -> Result<String> {
        let command = format!("{} version", self.binaries.restic.display());
        let output = runner
            .execute(&command, &[])
            .add_msg(format!("Cannot execute {:?}", command))
            .add_fn_name(function_path!())?;
        debug!("Version: {}", output.output);

        let version = parse_version(&output.output)
            .map(str::to_owned)
            .ok_or_else(|| Error::restic_version_not_found(output.output.clone()))
            .add_fn_name(function_path!())?;
        info!("Restic version {version} found !");
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::command::scripted::ScriptedRunner;
    use crate::backup::command::CommandOutput;
    use tempfile::TempDir;

    const FULL_CONFIG: &str = r#"
information:
  client_name: acme
  server_name: web01
  rclone_connection_name: s3
  bucket_name: backups
  keep_daily: 30
binaries:
  restic: /usr/bin/restic
restic_options:
  - --keep-daily=7
  - --keep-weekly=4
email:
  enabled: true
  host: smtp.example.com
  port: 587
  smtp_mode: StartTls
  from: "Backup <backup@example.com>"
  to:
    - ops@example.com
  password: secret
  max_try: 5
  retry_base_delay: 2s
backup:
  pre_exec: systemctl stop app
  post_exec: systemctl start app
"#;

    #[test]
    fn test_parse_full_config() {
        let config: BackupConfig = serde_yml::from_str(FULL_CONFIG).unwrap();

        assert_eq!(config.information.client_name, "acme");
        assert_eq!(config.information.keep_daily, Some(30));
        assert_eq!(config.binaries.restic, PathBuf::from("/usr/bin/restic"));
        assert_eq!(config.restic_options, vec!["--keep-daily=7", "--keep-weekly=4"]);
        assert_eq!(config.email.host().as_deref(), Some("smtp.example.com"));
        assert_eq!(*config.email.max_try(), 5);
        assert_eq!(config.backup.pre_exec.as_deref(), Some("systemctl stop app"));
        assert!(config.missing_required_fields().is_empty());
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = "information:\n  server_name: web01\n  colour: blue\n";
        assert!(serde_yml::from_str::<BackupConfig>(yaml).is_err());
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let config: BackupConfig =
            serde_yml::from_str("information:\n  server_name: web01\n").unwrap();

        let missing = config.missing_required_fields();
        assert_eq!(
            missing,
            vec![
                "Information->RCloneConnectionName (information.rclone_connection_name)",
                "Information->BucketName (information.bucket_name)",
                "Binaries->Restic (binaries.restic)",
            ]
        );
        assert!(matches!(
            config.check_required_fields(),
            Err(Error::MissingRequiredFields(v)) if v.len() == 3
        ));
    }

    #[test]
    fn test_load_rejects_missing_exclusion_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yml");
        std::fs::write(
            &config_path,
            "information:\n  server_name: web01\n  rclone_connection_name: s3\n  bucket_name: b\n  exclusion_file: /definitely/not/here\nbinaries:\n  restic: /bin/sh\n",
        )
        .unwrap();

        let err = BackupConfig::load(&config_path).unwrap_err();
        assert!(err.to_string().contains("Config validation failed"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BackupConfig::load("/definitely/not/config.yml").unwrap_err();
        assert!(err.to_string().contains("Impossible to open file"));
    }

    #[test]
    fn test_check_restic_version() {
        let mut config = BackupConfig::default();
        config.binaries.restic = PathBuf::from("/usr/bin/restic");
        let runner = ScriptedRunner::new(vec![CommandOutput::new(
            0,
            "restic 0.16.4 compiled with go1.21.6 on linux/amd64\n",
        )]);

        assert_eq!(config.check_restic_version(&runner).unwrap(), "0.16.4");
        assert_eq!(runner.commands(), vec!["/usr/bin/restic version"]);
    }

    #[test]
    fn test_check_restic_version_garbage_output() {
        let config = BackupConfig::default();
        let runner = ScriptedRunner::new(vec![CommandOutput::new(127, "sh: restic: not found\n")]);

        assert!(config.check_restic_version(&runner).is_err());
    }
}
