use crate::model::{Dimension, NodeId, RunId};
use time::Date;

/// A single deterministic or transient failure kind the engine can produce.
///
/// These are "kinds, not types": callers match on the variant to decide whether to retry,
/// fail the run, or demote to a warning. See `EngineError` for the wrapper that attaches
/// run/date/dimension context.
#[derive(Debug, thiserror::Error)]
pub enum EngineErrorKind {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("graph contains a cycle among nodes {0:?}")]
    GraphCycle(Vec<NodeId>),

    #[error("unknown allocation strategy: {0:?}")]
    UnknownStrategy(String),

    #[error("negative raw cost amount for node {node:?} on dimension {dimension:?}")]
    NegativeInput { node: NodeId, dimension: Dimension },

    #[error("decimal overflow while allocating")]
    ArithmeticOverflow,

    #[error("a run for graph hash {graph_hash} and window [{start}, {end}] is already in progress")]
    RunAlreadyInProgress {
        graph_hash: crate::model::GraphHash,
        start: Date,
        end: Date,
    },

    #[error("missing usage metric {metric:?} for proportional allocation")]
    MissingUsage { metric: String },

    #[error("dimension/date observed in more than one currency with no FX port configured")]
    MixedCurrency,

    #[error("run was cancelled")]
    Cancelled,

    #[error("run exceeded its deadline")]
    DeadlineExceeded,

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// The error type returned by every fallible public operation in this crate.
///
/// Wraps a [`EngineErrorKind`] with the run/date/dimension context it occurred under, so a
/// caller can tell *which* run and unit of work an error belongs to without parsing the message.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct EngineError {
    #[source]
    pub kind: EngineErrorKind,
    pub run_id: Option<RunId>,
    pub date: Option<Date>,
    pub dimension: Option<Dimension>,
}

impl EngineError {
    pub fn new(kind: EngineErrorKind) -> Self {
        Self {
            kind,
            run_id: None,
            date: None,
            dimension: None,
        }
    }

    pub fn with_run(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    pub fn with_date(mut self, date: Date) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Whether the Run Coordinator should retry this failure with backoff.
    pub fn is_retriable(&self) -> bool {
        matches!(self.kind, EngineErrorKind::StorageUnavailable(_))
    }
}

impl From<EngineErrorKind> for EngineError {
    fn from(kind: EngineErrorKind) -> Self {
        EngineError::new(kind)
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
