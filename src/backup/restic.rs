//! Scraping of restic console output.
//!
//! One pattern per extracted fact, pinned against restic 0.9 - 0.17 console output.
//! A line that does not match leaves the matching statistic at zero: pattern drift
//! across restic releases shows up as zeros in the exported metrics, never as an error.

use crate::backup::step::{RunHistory, Step};
use regex::Regex;
use std::sync::LazyLock;

/// Default `--keep-daily` count when no retention option is configured.
pub static DEFAULT_KEEP_DAILY: u32 = 90;

static RESTIC_VERSION_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"restic\s(\d+\.\d+\.\d+)\s.*").unwrap());
static RESTIC_SNAPSHOT_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"snapshot\s([0-9a-zA-Z]+)\ssaved").unwrap());
static RESTIC_FILE_STATS_REG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Files:\s*([0-9.]*) new,\s*([0-9.]*) changed,\s*([0-9.]*) unmodified").unwrap()
});
static RESTIC_DIR_STATS_REG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Dirs:\s*([0-9.]*) new,\s*([0-9.]*) changed,\s*([0-9.]*) unmodified").unwrap()
});
static RESTIC_ADDED_BYTES_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Added to the repo: ([0-9.]+) (\w+)").unwrap());
static RESTIC_PROCESSED_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"processed ([0-9.]*) files, ([0-9.]+) (\w+)").unwrap());
static RESTIC_KEPT_SNAPS_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"keep ([0-9.]*) snapshots:").unwrap());
static RESTIC_REMOVE_SNAPS_REG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"remove ([0-9.]*) snapshots:").unwrap());

/// Statistics of one run, zero where restic did not report the value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResticStats {
    pub files: ChangeCounts,
    pub dirs: ChangeCounts,
    pub files_processed: u64,
    pub bytes_added: u64,
    pub bytes_processed: u64,
    pub kept_snapshots: u64,
    pub removed_snapshots: u64,
}

/// `<N> new, <N> changed, <N> unmodified`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub new: u64,
    pub changed: u64,
    pub unmodified: u64,
}

/// `processed <N> files, <size>`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Processed {
    pub files: u64,
    pub bytes: u64,
}

impl ResticStats {
    /// Collects the statistics of the backup and forget steps of `history`.
    pub fn from_history(history: &RunHistory) -> Self {
        history
            .iter()
            .fold(ResticStats::default(), |mut stats, result| {
                match result.step {
                    Step::StartBackup => stats.absorb_backup_output(&result.output),
                    Step::Cleanup => stats.absorb_forget_output(&result.output),
                    Step::InitRepo | Step::CheckRepoIntegrity => {}
                }
                stats
            })
    }

    fn absorb_backup_output(&mut self, output: &str) {
        if let Some(files) = parse_files_stats(output) {
            self.files = files;
        }
        if let Some(dirs) = parse_dirs_stats(output) {
            self.dirs = dirs;
        }
        if let Some(added) = parse_added_bytes(output) {
            self.bytes_added = added;
        }
        if let Some(processed) = parse_processed(output) {
            self.files_processed = processed.files;
            self.bytes_processed = processed.bytes;
        }
    }

    fn absorb_forget_output(&mut self, output: &str) {
        if let Some(kept) = parse_kept_snapshots(output) {
            self.kept_snapshots = kept;
        }
        if let Some(removed) = parse_removed_snapshots(output) {
            self.removed_snapshots = removed;
        }
    }
}

/// `restic 0.16.4 compiled with ...` -> `0.16.4`
pub fn parse_version(output: &str) -> Option<&str> {
    capture(&RESTIC_VERSION_REG, output, 1)
}

/// `snapshot 9f8e7d6c saved` -> `9f8e7d6c`
pub fn parse_snapshot_id(output: &str) -> Option<&str> {
    capture(&RESTIC_SNAPSHOT_REG, output, 1)
}

pub fn parse_files_stats(output: &str) -> Option<ChangeCounts> {
    parse_change_counts(&RESTIC_FILE_STATS_REG, output)
}

pub fn parse_dirs_stats(output: &str) -> Option<ChangeCounts> {
    parse_change_counts(&RESTIC_DIR_STATS_REG, output)
}

pub fn parse_added_bytes(output: &str) -> Option<u64> {
    let caps = RESTIC_ADDED_BYTES_REG.captures(output)?;
    Some(scaled_bytes(&caps[1], &caps[2]))
}

pub fn parse_processed(output: &str) -> Option<Processed> {
    let caps = RESTIC_PROCESSED_REG.captures(output)?;
    Some(Processed {
        files: parse_count(&caps[1]),
        bytes: scaled_bytes(&caps[2], &caps[3]),
    })
}

pub fn parse_kept_snapshots(output: &str) -> Option<u64> {
    capture(&RESTIC_KEPT_SNAPS_REG, output, 1).map(parse_count)
}

pub fn parse_removed_snapshots(output: &str) -> Option<u64> {
    capture(&RESTIC_REMOVE_SNAPS_REG, output, 1).map(parse_count)
}

/// Multiplies `amount` by the size of a binary `unit`. Unknown units yield 0.
pub fn unit_convert(amount: u64, unit: &str) -> u64 {
    let factor: u64 = match unit {
        "TiB" => 1 << 40,
        "GiB" => 1 << 30,
        "MiB" => 1 << 20,
        "KiB" => 1 << 10,
        _ => 0,
    };
    amount.saturating_mul(factor)
}

/// restic prints sizes with a fractional part, the float is scaled by 1000
/// and truncated before the unit is applied.
fn scaled_bytes(amount: &str, unit: &str) -> u64 {
    amount
        .parse::<f64>()
        .map(|v| unit_convert((v * 1000.0) as u64, unit))
        .unwrap_or(0)
}

fn parse_change_counts(reg: &Regex, output: &str) -> Option<ChangeCounts> {
    let caps = reg.captures(output)?;
    Some(ChangeCounts {
        new: parse_count(&caps[1]),
        changed: parse_count(&caps[2]),
        unmodified: parse_count(&caps[3]),
    })
}

fn parse_count(s: &str) -> u64 {
    s.parse().unwrap_or(0)
}

fn capture<'a>(reg: &Regex, output: &'a str, group: usize) -> Option<&'a str> {
    reg.captures(output)
        .and_then(|caps| caps.get(group))
        .map(|m| m.as_str())
}
