//! Prometheus textfile export of a run.

use crate::backup::function_path;
use crate::backup::restic::ResticStats;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use crate::backup::step::AggregateStatus;
use bon::Builder;
use function_name::named;
use getset::Getters;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Prefix of every exported metric name.
pub static METRIC_NAMESPACE: &str = "backup";
static METRIC_HELP: &str = "Backup script collected metric";

/// Lower-cased label key to lower-cased label value, rendered in key order.
pub type PrometheusLabels = BTreeMap<String, String>;

/// One gauge with one value per label set.
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[getset(get = "pub")]
pub struct MetricRecord {
    name: String,
    label_sets: Vec<PrometheusLabels>,
    values: Vec<u64>,
}

impl MetricRecord {
    pub fn new<S: AsRef<str>, I: IntoIterator<Item = (PrometheusLabels, u64)>>(
        name: S,
        rows: I,
    ) -> Self {
        let (label_sets, values) = rows
            .into_iter()
            .map(|(labels, value)| (lower_case_labels(labels), value))
            .unzip();
        Self {
            name: metric_name(name),
            label_sets,
            values,
        }
    }
}

fn lower_case_labels(labels: PrometheusLabels) -> PrometheusLabels {
    labels
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v.to_lowercase()))
        .collect()
}

/// `Files Stats` -> `backup_files_stats`
pub fn metric_name<S: AsRef<str>>(name: S) -> String {
    format!(
        "{}_{}",
        METRIC_NAMESPACE,
        name.as_ref().replace(['-', ' '], "_").to_lowercase()
    )
}

impl Display for MetricRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "# HELP {} {}", self.name, METRIC_HELP)?;
        writeln!(f, "# TYPE {} gauge", self.name)?;
        for (labels, value) in self.label_sets.iter().zip(&self.values) {
            let labels = labels
                .iter()
                .map(|(k, v)| format!("{}=\"{}\"", k, v))
                .join(", ");
            writeln!(f, "{}{{{}}} {}", self.name, labels, value)?;
        }
        Ok(())
    }
}

/// Labels shared by every exported row.
#[derive(Clone, Debug, Builder)]
pub struct MetricContext {
    #[builder(into)]
    repository: String,
    #[builder(into)]
    client: String,
    #[builder(into)]
    server_name: String,
}

impl MetricContext {
    /// Row specific `pairs` merged over the shared labels.
    fn labels<const N: usize>(&self, pairs: [(&str, &str); N]) -> PrometheusLabels {
        [
            ("repository", self.repository.as_str()),
            ("client", self.client.as_str()),
            ("name", self.server_name.as_str()),
        ]
        .into_iter()
        .chain(pairs)
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }
}

/// Builds `files_stats`, `bytes_processed`, `bytes_added`, `snapshots` and `status`.
pub fn build_metrics(
    stats: &ResticStats,
    status: AggregateStatus,
    context: &MetricContext,
) -> Vec<MetricRecord> {
    let files_stats = [
        ("files", &stats.files),
        ("directories", &stats.dirs),
    ]
    .into_iter()
    .flat_map(|(kind, counts)| {
        [
            ("new", counts.new),
            ("changed", counts.changed),
            ("unmodified", counts.unmodified),
        ]
        .map(|(action, value)| (context.labels([("type", kind), ("action", action)]), value))
    });

    vec![
        MetricRecord::new("files_stats", files_stats),
        MetricRecord::new(
            "bytes_processed",
            [(context.labels([]), stats.bytes_processed)],
        ),
        MetricRecord::new("bytes_added", [(context.labels([]), stats.bytes_added)]),
        MetricRecord::new(
            "snapshots",
            [
                (context.labels([("action", "keep")]), stats.kept_snapshots),
                (context.labels([("action", "removed")]), stats.removed_snapshots),
            ],
        ),
        MetricRecord::new(
            "status",
            [(
                context.labels([("status", status.to_string().as_str())]),
                u64::from(status.is_success()),
            )],
        ),
    ]
}

/// Writes `metrics` next to `path` in a temporary file, then renames it into place.
#[named]
pub fn export_metrics_to_file<P: AsRef<Path>>(path: P, metrics: &[MetricRecord]) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix("backup-metric-")
        .tempfile_in(dir)
        .map_err(Error::from)
        .add_msg(format!("Cannot create temporary metric file in {:?}", dir))
        .add_fn_name(function_path!())?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        for metric in metrics {
            writeln!(writer, "{}", metric)?;
        }
        writer.flush()?;
    }

    tmp.persist(path)
        .map_err(|e| Error::from(e.error))
        .add_msg(format!("Cannot move metric file to {:?}", path))
        .add_fn_name(function_path!())?;
    tracing::info!("Exported {} metrics to {:?}", metrics.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::restic::ChangeCounts;
    use tempfile::TempDir;

    fn context() -> MetricContext {
        MetricContext::builder()
            .repository("Daily")
            .client("acme")
            .server_name("web01")
            .build()
    }

    fn stats() -> ResticStats {
        ResticStats {
            files: ChangeCounts { new: 3, changed: 1, unmodified: 7 },
            dirs: ChangeCounts { new: 0, changed: 0, unmodified: 2 },
            files_processed: 11,
            bytes_added: 2048,
            bytes_processed: 4096,
            kept_snapshots: 3,
            removed_snapshots: 1,
        }
    }

    #[test]
    fn test_single_metric_exposition() {
        let labels: PrometheusLabels = [("a".to_string(), "x".to_string())].into();
        let metric = MetricRecord::new("name", [(labels, 5)]);

        assert_eq!(
            metric.to_string(),
            "# HELP backup_name Backup script collected metric\n# TYPE backup_name gauge\nbackup_name{a=\"x\"} 5\n"
        );
    }

    #[test]
    fn test_labels_are_lower_cased() {
        let labels: PrometheusLabels = [("Type".to_string(), "Files".to_string())].into();
        let metric = MetricRecord::new("name", [(labels, 1)]);

        assert_eq!(metric.label_sets()[0]["type"], "files");
        assert!(metric.to_string().contains("backup_name{type=\"files\"} 1\n"));
    }

    #[test]
    fn test_metric_name_normalization() {
        assert_eq!(metric_name("Files Stats"), "backup_files_stats");
        assert_eq!(metric_name("bytes-added"), "backup_bytes_added");
    }

    #[test]
    fn test_files_stats_rows() {
        let metrics = build_metrics(&stats(), AggregateStatus::Success, &context());
        let files_stats = &metrics[0];

        assert_eq!(files_stats.name(), "backup_files_stats");
        assert_eq!(files_stats.values(), &vec![3, 1, 7, 0, 0, 2]);
        let kinds_actions: Vec<_> = files_stats
            .label_sets()
            .iter()
            .map(|l| (l["type"].as_str(), l["action"].as_str()))
            .collect();
        assert_eq!(
            kinds_actions,
            vec![
                ("files", "new"),
                ("files", "changed"),
                ("files", "unmodified"),
                ("directories", "new"),
                ("directories", "changed"),
                ("directories", "unmodified"),
            ]
        );
        assert!(files_stats
            .label_sets()
            .iter()
            .all(|l| l["repository"] == "daily" && l["client"] == "acme" && l["name"] == "web01"));
    }

    #[test]
    fn test_metric_order_and_status() {
        let metrics = build_metrics(&stats(), AggregateStatus::Failed, &context());
        let names: Vec<_> = metrics.iter().map(|m| m.name().as_str()).collect();
        assert_eq!(
            names,
            vec![
                "backup_files_stats",
                "backup_bytes_processed",
                "backup_bytes_added",
                "backup_snapshots",
                "backup_status",
            ]
        );
        assert_eq!(metrics[1].values(), &vec![4096]);
        assert_eq!(metrics[2].values(), &vec![2048]);
        assert_eq!(metrics[3].values(), &vec![3, 1]);
        assert_eq!(metrics[3].label_sets()[1]["action"], "removed");
        assert_eq!(metrics[4].values(), &vec![0]);
        assert_eq!(
            metrics[4].to_string().lines().last(),
            Some("backup_status{client=\"acme\", name=\"web01\", repository=\"daily\", status=\"failed\"} 0")
        );
    }

    #[test]
    fn test_success_status_value() {
        let metrics = build_metrics(&ResticStats::default(), AggregateStatus::Success, &context());
        assert_eq!(metrics[4].values(), &vec![1]);
        assert_eq!(metrics[4].label_sets()[0]["status"], "success");
    }

    #[test]
    fn test_export_metrics_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.prom");
        let metrics = build_metrics(&stats(), AggregateStatus::Success, &context());

        export_metrics_to_file(&path, &metrics).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let expected: String = metrics.iter().map(|m| format!("{m}\n")).collect();
        assert_eq!(content, expected);
        assert!(content.contains("backup_bytes_added{client=\"acme\", name=\"web01\", repository=\"daily\"} 2048\n"));
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_export_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("backup.prom");
        std::fs::write(&path, "stale").unwrap();

        export_metrics_to_file(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing").join("backup.prom");

        assert!(export_metrics_to_file(&path, &[]).is_err());
    }
}
