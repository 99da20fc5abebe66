//! Shared identifier and classification types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique task identifier, assigned at submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Dispatch priority. Ordering follows urgency: `Urgent > High > Medium > Low`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Background work.
    Low,
    /// Default priority.
    #[default]
    Medium,
    /// Interactive work.
    High,
    /// Dispatched before everything else.
    Urgent,
}

impl Priority {
    /// All levels, most urgent first. This is the dispatch scan order.
    pub const DESCENDING: [Self; 4] = [Self::Urgent, Self::High, Self::Medium, Self::Low];

    /// Stable slot index (0 = most urgent).
    #[must_use]
    pub const fn slot(self) -> usize {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    /// Upper-case name used in statistics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag selecting which work executor handles a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Analyse a single repository.
    RepositoryAnalysis,
    /// Analyse many repositories in one task.
    BatchAnalysis,
    /// Classify a piece of text.
    TextClassification,
    /// Produce an embedding vector.
    EmbeddingGeneration,
    /// Rank documents against a query.
    SemanticSearch,
    /// Application-defined work kind.
    Custom(String),
}

impl TaskType {
    /// Convenience constructor for [`TaskType::Custom`].
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepositoryAnalysis => f.write_str("repository_analysis"),
            Self::BatchAnalysis => f.write_str("batch_analysis"),
            Self::TextClassification => f.write_str("text_classification"),
            Self::EmbeddingGeneration => f.write_str("embedding_generation"),
            Self::SemanticSearch => f.write_str("semantic_search"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}
