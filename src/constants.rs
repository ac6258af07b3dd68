// -
// Log targets

/// Tracing target for lines tailed from the engine process
pub(crate) const ENGINE_LOG_TARGET: &str = "engine";
/// Tracing target for lines tailed from a co-located monitor process
pub(crate) const MONITOR_LOG_TARGET: &str = "monitor";

pub const COORDINATOR_LOG_FILE: &str = "coordinator.log";

// -
// Engine and monitor replies

pub(crate) const PONG: &str = "PONG";

/// Monitor reply when the group is already registered
pub(crate) const DUPLICATE_GROUP_REPLY: &str = "Duplicated master name";

/// Engine reply when a rewrite was already running
pub(crate) const REWRITE_IN_PROGRESS_REPLY: &str = "already in progress";

// -
// Access control

pub(crate) const DEFAULT_USER: &str = "default";

/// Rules for the default user, which carries the admin password
pub(crate) const ADMIN_ACL_RULES: &[&str] = &["on", "~*", "&*", "+@all"];

/// Commands granted to the maintenance user; everything else is denied.
pub(crate) const MAINTENANCE_ACL_RULES: &[&str] = &[
    "on",
    "~*",
    "&*",
    "+INFO",
    "+CLIENT",
    "+DBSIZE",
    "+PING",
    "+HELLO",
    "+AUTH",
    "+RESTORE",
    "+DUMP",
    "+DEL",
    "+EXISTS",
    "+UNLINK",
    "+TYPE",
    "+FLUSHALL",
    "+TOUCH",
    "+EXPIRE",
    "+PEXPIREAT",
    "+TTL",
    "+PTTL",
    "+EXPIRETIME",
    "+RENAME",
    "+RENAMENX",
    "+SCAN",
    "+DISCARD",
    "+MULTI",
    "+EXEC",
    "+SLOWLOG",
    "+WAIT",
    "+REPLICAOF",
    "+GRAPH.INFO",
    "+GRAPH.LIST",
    "+GRAPH.QUERY",
    "+GRAPH.RO_QUERY",
    "+GRAPH.EXPLAIN",
    "+GRAPH.PROFILE",
    "+GRAPH.DELETE",
    "+GRAPH.CONSTRAINT",
    "+GRAPH.SLOWLOG",
    "+GRAPH.BULK",
    "+GRAPH.CONFIG",
    "+CLUSTER",
    "+COMMAND",
];

// -
// Topology record flags

pub(crate) const FLAG_SELF: &str = "myself";
pub(crate) const FLAG_PRIMARY: &str = "master";
pub(crate) const FLAG_REPLICA: &str = "slave";
/// Flags marking a peer whose bus address may be stale
pub(crate) const STALE_FLAGS: &[&str] = &["fail", "fail?", "noaddr", "handshake"];
pub(crate) const LINK_DISCONNECTED: &str = "disconnected";
