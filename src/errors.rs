//! Coordinator Error Hierarchy
//!
//! Defines the error types raised while bringing a graph engine node up,
//! keeping it in a cluster, and draining it, categorized by layer:
//! infrastructure (network, storage, engine protocol), configuration, and
//! coordination decisions.
//!
//! Every fatal condition travels up the call chain as an [`Error`]; only the
//! binary entry point turns one into a process exit via [`ErrorKind::exit_code`].

use std::path::PathBuf;
use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Infrastructure-level failures (network, storage, engine protocol)
    #[error(transparent)]
    System(#[from] SystemError),

    /// Node configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Lifecycle decisions that could not be carried out safely
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SystemError {
    // Network layer
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Local files: topology record, engine config, formation marker
    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),

    // Engine / monitor admin protocol
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    // Child processes
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Peer never became resolvable and live before the deadline
    #[error("Peer {peer} unreachable after {elapsed:?}")]
    PeerUnreachable { peer: String, elapsed: Duration },

    /// Name lookup failed
    #[error("Failed to resolve {host}: {reason}")]
    ResolveFailed { host: String, reason: String },

    /// Retry policy exhaustion
    #[error("{operation} gave up after {attempts} attempts ({elapsed:?})")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        elapsed: Duration,
    },

    /// Liveness probe answered with something other than the expected reply
    #[error("Unexpected liveness reply from {endpoint}: {reply}")]
    UnexpectedProbeReply { endpoint: String, reply: String },

    /// Malformed host:port strings
    #[error("Invalid endpoint format: {0}")]
    InvalidEndpoint(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    #[error("{0}")]
    SignalSendFailed(String),

    #[error("Health server error: {0}")]
    HealthServer(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure bound to a concrete path
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Topology record could not be parsed
    #[error("Topology record malformed at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Topology record carries zero or several self entries
    #[error("Topology record must contain exactly one self entry, found {0}")]
    SelfEntryCount(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Command rejected or transport failure talking to engine or monitor
    #[error("Command {command} failed: {source}")]
    Command {
        command: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// Connection could not be established
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Response did not have the expected shape
    #[error("Unexpected response to {command}: {detail}")]
    UnexpectedResponse {
        command: &'static str,
        detail: String,
    },

    /// External cluster tool exited unsuccessfully
    #[error("Cluster tool {action} exited with {status}: {stderr}")]
    ToolFailed {
        action: &'static str,
        status: String,
        stderr: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} exited unexpectedly with {status}")]
    UnexpectedExit { name: String, status: String },

    #[error("{name} did not stop within {waited:?}")]
    StopTimeout { name: String, waited: Duration },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    /// Monitor refused registration of the group
    #[error("Quorum monitor rejected registration of {group}: {reason}")]
    RegistrationRejected { group: String, reason: String },

    /// Cluster create/join failures
    #[error(transparent)]
    Formation(#[from] FormationError),

    /// The final durability checkpoint did not finish before shutdown
    #[error("Durability checkpoint still running after {waited:?}")]
    CheckpointIncomplete { waited: Duration },

    /// Template referenced a parameter that was not provided
    #[error("Missing value for template placeholder ${{{0}}}")]
    MissingPlaceholder(String),

    /// Role could not be derived
    #[error("Role undetermined: {0}")]
    RoleUndetermined(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FormationError {
    /// Some members of the peer set never became reachable for creation
    #[error("Cannot create cluster, peers not reachable: {missing:?}")]
    PeersNotReachable { missing: Vec<String> },

    /// Irreversible create command failed; operator intervention required
    #[error("Cluster creation failed: {0}")]
    CreateFailed(String),

    /// Join attempts exhausted
    #[error("Joining cluster via {via} failed after {attempts} attempts: {reason}")]
    JoinFailed {
        via: String,
        attempts: u32,
        reason: String,
    },

    /// No probed witness belongs to a formed topology yet
    #[error("No formed topology among {probed} probed peers")]
    NoFormedPeer { probed: usize },

    /// The creator never formed the topology within the wait policy
    #[error("Topology still not formed after waiting {waited:?} for the creator")]
    CreatorMissing { waited: Duration },

    /// Peer set is too small for the configured replica fan-out
    #[error("Host count {host_count} cannot form shards of {group_size} nodes")]
    InvalidShape { host_count: u32, group_size: u32 },
}

/// Closed set of failure kinds the process can exit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    PeerTimeout,
    MonitorUnavailable,
    Formation,
    CheckpointIncomplete,
    Engine,
    Storage,
    Process,
    Internal,
}

impl ErrorKind {
    /// Process exit status reported to the orchestrator.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Config => 2,
            ErrorKind::PeerTimeout => 3,
            ErrorKind::MonitorUnavailable => 4,
            ErrorKind::Formation => 5,
            ErrorKind::CheckpointIncomplete => 6,
            ErrorKind::Engine => 7,
            ErrorKind::Storage => 8,
            ErrorKind::Process => 9,
            ErrorKind::Internal => 1,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Fatal(_) => ErrorKind::Internal,
            Error::System(SystemError::Network(NetworkError::PeerUnreachable { .. }))
            | Error::System(SystemError::Network(NetworkError::RetryExhausted { .. })) => {
                ErrorKind::PeerTimeout
            }
            Error::System(SystemError::Network(_)) => ErrorKind::Internal,
            Error::System(SystemError::Storage(_)) => ErrorKind::Storage,
            Error::System(SystemError::Engine(_)) => ErrorKind::Engine,
            Error::System(SystemError::Process(_)) => ErrorKind::Process,
            Error::Coordination(CoordinationError::RegistrationRejected { .. }) => ErrorKind::MonitorUnavailable,
            Error::Coordination(CoordinationError::Formation(_)) => ErrorKind::Formation,
            Error::Coordination(CoordinationError::CheckpointIncomplete { .. }) => {
                ErrorKind::CheckpointIncomplete
            }
            Error::Coordination(CoordinationError::MissingPlaceholder(_)) => ErrorKind::Config,
            Error::Coordination(CoordinationError::RoleUndetermined(_)) => ErrorKind::Internal,
        }
    }
}

// ============== Conversion Implementations ============== //
impl From<NetworkError> for Error {
    fn from(e: NetworkError) -> Self {
        Error::System(SystemError::Network(e))
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Error::System(SystemError::Storage(e))
    }
}

impl From<EngineError> for Error {
    fn from(e: EngineError) -> Self {
        Error::System(SystemError::Engine(e))
    }
}

impl From<ProcessError> for Error {
    fn from(e: ProcessError) -> Self {
        Error::System(SystemError::Process(e))
    }
}

impl From<FormationError> for Error {
    fn from(e: FormationError) -> Self {
        Error::Coordination(CoordinationError::Formation(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        StorageError::IoError(e).into()
    }
}

impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        EngineError::Redis(e).into()
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        NetworkError::TaskFailed(err).into()
    }
}
