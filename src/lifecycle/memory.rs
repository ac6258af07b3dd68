use sysinfo::System;

use crate::config::fallback_memory_limit;
use crate::config::memory_for_instance_type;
use crate::PersistenceConfig;

/// Engine memory ceiling: explicit limit, then the instance table, then a
/// share of total system memory.
pub fn memory_ceiling(
    persistence: &PersistenceConfig,
    total_memory: impl FnOnce() -> u64,
) -> String {
    if let Some(limit) = &persistence.memory_limit {
        return limit.clone();
    }
    if let Some(limit) = persistence
        .instance_type
        .as_deref()
        .and_then(memory_for_instance_type)
    {
        return limit.to_string();
    }
    fallback_memory_limit(total_memory())
}

/// Bytes of physical memory on this host.
pub fn system_total_memory() -> u64 {
    let mut system = System::new();
    system.refresh_memory();
    system.total_memory()
}

/// Steady-state `CONFIG SET` pairs applied once the engine runs.
pub fn persistence_settings(
    persistence: &PersistenceConfig,
    total_memory: impl FnOnce() -> u64,
) -> Vec<(&'static str, String)> {
    vec![
        ("maxmemory", memory_ceiling(persistence, total_memory)),
        ("save", persistence.snapshot_cadence.save_schedule().to_string()),
        ("appendfsync", persistence.fsync.as_str().to_string()),
    ]
}
