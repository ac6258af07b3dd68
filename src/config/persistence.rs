use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Snapshot schedule presets mapped onto the engine `save` directive.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotCadence {
    #[default]
    Low,
    Medium,
    High,
}

impl SnapshotCadence {
    /// `save` arguments as `<seconds> <changes>` pairs.
    pub fn save_schedule(self) -> &'static str {
        match self {
            SnapshotCadence::Low => "86400 1 21600 100 3600 10000",
            SnapshotCadence::Medium => "21600 1 3600 100 300 10000",
            SnapshotCadence::High => "3600 1 300 100 60 10000",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FsyncPolicy {
    Always,
    #[default]
    Everysec,
    No,
}

impl FsyncPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            FsyncPolicy::Always => "always",
            FsyncPolicy::Everysec => "everysec",
            FsyncPolicy::No => "no",
        }
    }
}

/// Steady-state durability and memory settings applied once the engine runs.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PersistenceConfig {
    /// Cloud instance type used to look up the memory ceiling
    #[serde(default)]
    pub instance_type: Option<String>,

    /// Explicit `maxmemory` value (e.g. `2GB`); wins over the lookup table
    #[serde(default)]
    pub memory_limit: Option<String>,

    #[serde(default)]
    pub snapshot_cadence: SnapshotCadence,

    #[serde(default)]
    pub fsync: FsyncPolicy,
}

impl PersistenceConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = &self.memory_limit {
            if parse_memory_size(limit).is_none() {
                return Err(invalid(format!(
                    "persistence.memory_limit {limit} is not a size such as 512MB or 2GB"
                )));
            }
        }
        Ok(())
    }
}

/// Instance type => engine memory ceiling.
const INSTANCE_MEMORY_TABLE: &[(&str, &str)] = &[
    ("e2-custom-small-1024", "100MB"),
    ("e2-medium", "2GB"),
    ("e2-custom-4-8192", "6GB"),
    ("e2-custom-8-16384", "13GB"),
    ("e2-custom-16-32768", "30GB"),
    ("e2-custom-32-65536", "62GB"),
    ("e2-standard-2", "6GB"),
    ("e2-standard-4", "13GB"),
    ("e2-highmem-2", "13GB"),
    ("e2-highmem-4", "26GB"),
    ("t2.medium", "2GB"),
    ("m6i.large", "6GB"),
    ("m6i.xlarge", "13GB"),
    ("m6i.2xlarge", "30GB"),
    ("m6i.4xlarge", "62GB"),
    ("m6i.8xlarge", "124GB"),
    ("r6i.large", "13GB"),
    ("r6i.xlarge", "26GB"),
];

pub fn memory_for_instance_type(instance_type: &str) -> Option<&'static str> {
    INSTANCE_MEMORY_TABLE
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(instance_type))
        .map(|(_, limit)| *limit)
}

/// Share of total system memory handed to the engine when nothing else is known.
pub const FALLBACK_MEMORY_PERCENT: u64 = 80;

/// Engine-format size for the fallback ceiling, in whole megabytes.
pub fn fallback_memory_limit(total_bytes: u64) -> String {
    let limit = total_bytes / 100 * FALLBACK_MEMORY_PERCENT;
    format!("{}MB", (limit / (1024 * 1024)).max(1))
}

/// `512MB` => 536870912; bare numbers are bytes.
pub fn parse_memory_size(value: &str) -> Option<u64> {
    let v = value.trim();
    let digits_end = v.find(|c: char| !c.is_ascii_digit()).unwrap_or(v.len());
    let (number, unit) = v.split_at(digits_end);
    let number: u64 = number.parse().ok()?;
    let factor: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1024,
        "m" | "mb" => 1024 * 1024,
        "g" | "gb" => 1024 * 1024 * 1024,
        _ => return None,
    };
    number.checked_mul(factor)
}
