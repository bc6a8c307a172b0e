//! Error taxonomy for the DAG builder and optimization passes.

use thiserror::Error;

use crate::graph::{EdgeId, VertexId};

/// Errors surfaced by [`crate::builder::DagBuilder`], the annotating pass
/// framework, and the runtime skew pass.
///
/// Each variant is a distinct, testable failure condition (see SPEC_FULL.md
/// §7); nothing in this crate retries internally, and builder/pass failures
/// never leave behind a partially-mutated `Dag` or `PhysicalPlan`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizationError {
    /// `connect` was given an edge whose source or destination (or both)
    /// is not present in the builder.
    #[error("illegal vertex operation: source={src}, destination={dst}")]
    IllegalVertexOperation { src: String, dst: String },

    /// The acyclicity check found a directed cycle.
    #[error("DAG contains a cycle")]
    CycleDetected,

    /// An IR vertex with no incoming edges is not a `Source`.
    #[error("source violation: vertices with no incoming edges must be sources: {0:?}")]
    SourceViolation(Vec<VertexId>),

    /// An IR vertex with no outgoing edges is neither a `Loop` nor an
    /// `Operator` wrapping a `DoTransform`.
    #[error("sink violation: vertices with no outgoing edges must be loops or DoTransform operators: {0:?}")]
    SinkViolation(Vec<VertexId>),

    /// Two `OneToOne`-connected vertices disagree on `Parallelism`.
    #[error("parallelism mismatch on edge {0}")]
    ParallelismMismatch(EdgeId),

    /// The runtime skew pass found no stage edges matching the supplied
    /// block ids.
    #[error("no stage edges matched the reported block ids")]
    EmptyOptimizationEdges,

    /// An algorithmic precondition of `calculate_key_ranges` was violated
    /// (currently: an empty `key_sizes` map).
    #[error("dynamic optimization precondition violated: {0}")]
    DynamicOptimization(String),

    /// Fewer keys were supplied than the configured skewed-key count.
    #[error("insufficient keys: need at least {needed}, got {available}")]
    InsufficientKeys { needed: usize, available: usize },
}

pub type Result<T> = std::result::Result<T, OptimizationError>;

/// Render an optional vertex id the way the source representation does:
/// present ids verbatim, absent ones as the literal `null`.
pub(crate) fn render_vertex_id(id: Option<&VertexId>) -> String {
    match id {
        Some(id) => id.as_str().to_string(),
        None => "null".to_string(),
    }
}
