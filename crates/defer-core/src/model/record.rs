use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Positive integer identifier of a deferred record.
///
/// Ordering is numeric; the graph engine relies on it for every
/// deterministic tie-break.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl RecordId {
    /// Return the raw integer value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Identifiers are positive integers; zero is reserved.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 > 0
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('#');
        match trimmed.parse::<u64>() {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(ParseEnumError {
                expected: "record id",
                got: s.to_string(),
            }),
        }
    }
}

/// The four completion states of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Pending,
    InProgress,
    Done,
    Archived,
}

impl Default for Status {
    fn default() -> Self {
        Self::Pending
    }
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Done => "done",
            Self::Archived => "archived",
        }
    }

    /// Done and archived records no longer block anything.
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Done | Self::Archived)
    }
}

/// Record priority. Declaration order gives `Low < Medium < High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl Priority {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Kind of a relationship between two records.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    /// Source cannot complete until target completes.
    Blocks,
    /// Hierarchical containment; ordered exactly like `Blocks`.
    ParentOf,
    /// Informational link.
    RelatesTo,
    /// Informational link marking a duplicate.
    Duplicates,
}

impl RelationKind {
    pub const ALL: [Self; 4] = [
        Self::Blocks,
        Self::ParentOf,
        Self::RelatesTo,
        Self::Duplicates,
    ];

    const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::ParentOf => "parent-of",
            Self::RelatesTo => "relates-to",
            Self::Duplicates => "duplicates",
        }
    }

    /// `true` for kinds that take part in cycle detection and ordering.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Blocks | Self::ParentOf)
    }
}

/// A deferred record as reported by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Record {
    /// A pending, medium-priority record with no title.
    #[must_use]
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            status: Status::default(),
            priority: Priority::default(),
            title: String::new(),
            tags: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// A directed relationship `source → target` of a given kind.
///
/// For blocking kinds the source depends on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: RecordId,
    pub target: RecordId,
    pub kind: RelationKind,
}

impl Relationship {
    #[must_use]
    pub fn new(source: impl Into<RecordId>, target: impl Into<RecordId>, kind: RelationKind) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    #[must_use]
    pub fn blocks(source: impl Into<RecordId>, target: impl Into<RecordId>) -> Self {
        Self::new(source, target, RelationKind::Blocks)
    }

    /// `true` if either endpoint is `id`.
    #[must_use]
    pub fn touches(&self, id: RecordId) -> bool {
        self.source == id || self.target == id
    }

    #[must_use]
    pub const fn is_blocking(&self) -> bool {
        self.kind.is_blocking()
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.kind, self.target)
    }
}

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize(input: &str) -> String {
    input.trim().to_ascii_lowercase().replace('_', "-")
}

impl FromStr for Status {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "pending" => Ok(Self::Pending),
            "in-progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "archived" => Ok(Self::Archived),
            _ => Err(ParseEnumError {
                expected: "status",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError {
                expected: "priority",
                got: s.to_string(),
            }),
        }
    }
}

impl FromStr for RelationKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = normalize(s);
        match normalized.as_str() {
            "blocks" => Ok(Self::Blocks),
            "parent-of" => Ok(Self::ParentOf),
            "relates-to" => Ok(Self::RelatesTo),
            "duplicates" => Ok(Self::Duplicates),
            _ => Err(ParseEnumError {
                expected: "relationship kind",
                got: s.to_string(),
            }),
        }
    }
}
