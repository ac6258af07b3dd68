use std::collections::HashMap;

/// Parsed `INFO` / `CLUSTER INFO` reply: `key:value` lines, `#` section
/// headers ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoReport {
    fields: HashMap<String, String>,
}

/// Role as the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedRole {
    Primary,
    Replica,
}

impl InfoReport {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();
        Self { fields }
    }

    pub fn get(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    fn number(
        &self,
        key: &str,
    ) -> Option<u64> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn flag(
        &self,
        key: &str,
    ) -> bool {
        self.get(key) == Some("1")
    }

    pub fn role(&self) -> Option<ReportedRole> {
        match self.get("role")? {
            "master" => Some(ReportedRole::Primary),
            "slave" | "replica" => Some(ReportedRole::Replica),
            _ => None,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.role() == Some(ReportedRole::Primary)
    }

    /// Upstream `(host, port)` when replicating.
    pub fn upstream(&self) -> Option<(String, u16)> {
        let host = self.get("master_host")?;
        let port = self.number("master_port")?;
        Some((host.to_string(), u16::try_from(port).ok()?))
    }

    pub fn link_up(&self) -> bool {
        self.get("master_link_status") == Some("up")
    }

    /// A full resynchronization with the primary is running.
    pub fn sync_in_progress(&self) -> bool {
        self.flag("master_sync_in_progress")
    }

    /// Rewrite running or queued behind a snapshot.
    pub fn aof_rewrite_active(&self) -> bool {
        self.flag("aof_rewrite_in_progress") || self.flag("aof_rewrite_scheduled")
    }

    pub fn aof_enabled(&self) -> bool {
        self.flag("aof_enabled")
    }

    pub fn aof_current_size(&self) -> Option<u64> {
        self.number("aof_current_size")
    }

    pub fn cluster_state_ok(&self) -> bool {
        self.get("cluster_state") == Some("ok")
    }

    pub fn cluster_known_nodes(&self) -> u64 {
        self.number("cluster_known_nodes").unwrap_or(0)
    }

    pub fn cluster_slots_assigned(&self) -> u64 {
        self.number("cluster_slots_assigned").unwrap_or(0)
    }

    pub fn cluster_enabled(&self) -> bool {
        self.flag("cluster_enabled")
    }
}
