use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stable opaque identifier for a [`super::Node`].
///
/// Wraps an interned string rather than a bare `String` so that identity comparisons are
/// cheap clones and call sites can't accidentally pass an unrelated string where a node id
/// is expected.
#[derive(Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value.as_str()))
    }
}

/// Identifier of a [`super::DependencyEdge`], stable across edits to its validity window.
#[derive(Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Arc<str>);

impl EdgeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EdgeId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// Identifier of a [`super::ComputationRun`].
#[derive(Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Arc<str>);

impl RunId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// A cost dimension, e.g. `instance_hours`, `egress_gb`, `api_requests`.
///
/// Dimensions are open-ended (driven by whatever raw data ingestion observes), so this is a
/// newtype over an interned string rather than a fixed enum.
#[derive(Clone, Debug, Display, From, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dimension(Arc<str>);

impl Dimension {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Dimension {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// A fingerprint over the active graph (node set + active edges + strategies) at a point in
/// time. Two graphs with the same hash must produce identical allocation results for
/// identical inputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphHash(pub u64);

impl std::fmt::Display for GraphHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
