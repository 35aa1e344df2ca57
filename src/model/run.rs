use super::{GraphHash, RunId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

/// Lifecycle state of a [`ComputationRun`] (spec §4.F).
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    CompletedWithWarnings,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::CompletedWithWarnings | RunStatus::Failed
        )
    }

    pub fn is_successful(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::CompletedWithWarnings)
    }
}

/// The kind of invariant an [`InvariantViolation`] reports (spec §4.E / §8).
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Conservation,
    Amplification,
    NonNegativity,
}

/// A recorded breach of one of the conservation invariants, attached to a run for the
/// reconciliation endpoint. Not fatal to the run except `Amplification`, which demotes the
/// run to `completed_with_warnings`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvariantViolation {
    pub kind: ViolationKind,
    pub date: Date,
    pub dimension: super::Dimension,
    pub description: String,
    pub expected: Decimal,
    pub actual: Decimal,
}

/// A non-fatal condition recorded on a run, e.g. a `MissingUsage` fallback to `equal`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunWarning {
    pub date: Date,
    pub dimension: super::Dimension,
    pub message: String,
}

/// An immutable, versioned computation over a window of dates.
///
/// A completed run never changes; re-running the same window produces a new run id with its
/// own results (spec §4.F).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComputationRun {
    pub id: RunId,
    pub window_start: Date,
    pub window_end: Date,
    pub graph_hash: GraphHash,
    pub status: RunStatus,
    pub notes: Vec<String>,
    pub warnings: Vec<RunWarning>,
    pub violations: Vec<InvariantViolation>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ComputationRun {
    pub fn window_contains(&self, date: Date) -> bool {
        self.window_start <= date && date <= self.window_end
    }

    pub fn window_intersects(&self, start: Date, end: Date) -> bool {
        self.window_start <= end && start <= self.window_end
    }
}
