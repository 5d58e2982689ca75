use std::fmt;

/// Machine-readable error codes shared by the store, the engine and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    SnapshotNotFound,
    RecordNotFound,
    DuplicateRecord,
    SelfDependency,
    CycleDetected,
    RelationshipNotFound,
    InvalidEnumValue,
    InvalidSnapshot,
    SnapshotWriteFailed,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::SnapshotNotFound => "E1002",
            Self::RecordNotFound => "E2001",
            Self::DuplicateRecord => "E2002",
            Self::SelfDependency => "E2003",
            Self::CycleDetected => "E2004",
            Self::RelationshipNotFound => "E2005",
            Self::InvalidEnumValue => "E2006",
            Self::InvalidSnapshot => "E3001",
            Self::SnapshotWriteFailed => "E5001",
            Self::LockContention => "E5002",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::SnapshotNotFound => "Snapshot file not found",
            Self::RecordNotFound => "Record not found",
            Self::DuplicateRecord => "Record already exists",
            Self::SelfDependency => "Record cannot depend on itself",
            Self::CycleDetected => "Cycle would be created",
            Self::RelationshipNotFound => "Relationship not found",
            Self::InvalidEnumValue => "Invalid status/priority/kind value",
            Self::InvalidSnapshot => "Invalid snapshot contents",
            Self::SnapshotWriteFailed => "Snapshot write failed",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in .defer/config.toml and retry."),
            Self::SnapshotNotFound => Some("Pass --snapshot with the path of an existing snapshot."),
            Self::RecordNotFound | Self::RelationshipNotFound => None,
            Self::DuplicateRecord => Some("Record ids must be unique within a snapshot."),
            Self::SelfDependency => Some("Pick a different target record."),
            Self::CycleDetected => {
                Some("Remove or adjust an existing link so the dependency graph stays acyclic.")
            }
            Self::InvalidEnumValue => Some("Use one of the documented status/priority/kind values."),
            Self::InvalidSnapshot => Some("Record ids must be positive and unique."),
            Self::SnapshotWriteFailed => Some("Check disk space and write permissions."),
            Self::LockContention => Some("Retry after the other writer releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
