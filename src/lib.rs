//! # Dynamic Optimization Core
//!
//! A generic, attributed directed-acyclic-graph intermediate representation
//! plus the two optimization passes layered on top of it: a compile-time
//! annotating pass that tags large shuffle edges with a bytes-only decoder,
//! and a runtime pass that rebalances per-task key ranges to mitigate data
//! skew observed during execution.
//!
//! ## Pipeline position
//!
//! ```text
//! DagBuilder::build()            → Dag (validated, immutable)
//!     │
//!     ├── LargeShuffleDecoderPass (compile-time, AnnotatingPass)
//!     │
//!     ▼
//! PhysicalPlan (stage DAG, derived from the compiled Dag by an external
//! scheduler — out of scope for this crate)
//!     │
//!     ▼
//! RuntimeSkewPass::apply()       → PhysicalPlan' (rebalanced key ranges)
//! ```
//!
//! This crate defines the graph primitives, the validated builder, the two
//! passes, and the collaborator seams (decoder, message-listener contract)
//! an embedding compiler/runtime wires up. It does not implement a pass
//! scheduler, an executor, or message dispatch — those are the embedding
//! driver's responsibility.
//!
//! ## Module map
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `error` | `OptimizationError`, the crate-wide failure enum |
//! | `config` | `DynamicOptimizationConfig`, layered via `figment` |
//! | `graph` | `Vertex`, `Edge`, `AttributeMap`, the immutable `Dag` |
//! | `builder` | `DagBuilder`, the validated mutable accumulator |
//! | `pass` | `AnnotatingPass` trait and `LargeShuffleDecoderPass` |
//! | `physical` | `PhysicalPlan`, `Stage`, `StageEdge`, `HashRange` |
//! | `skew` | `RuntimeSkewPass`, `calculate_key_ranges`, `identify_skewed_keys` |
//! | `listener` | Documentation-only message-listener contract |

pub mod builder;
pub mod config;
pub mod error;
pub mod graph;
pub mod listener;
pub mod pass;
pub mod physical;
pub mod skew;

pub use builder::DagBuilder;
pub use config::DynamicOptimizationConfig;
pub use error::{OptimizationError, Result};
pub use graph::{
    AttributeKey, AttributeMap, AttributeValue, CommunicationPattern, Dag, Decoder, Edge, EdgeId,
    EdgeType, TransformKind, Vertex, VertexId, VertexKind,
};
pub use listener::{MessageListener, OneShotReply};
pub use pass::{AnnotatingPass, LargeShuffleDecoderPass};
pub use physical::{HashRange, PhysicalPlan, PlanId, Stage, StageEdge};
pub use skew::{
    calculate_key_ranges, identify_skewed_keys, FnRuntimeEdgeIdDecoder, RuntimeEdgeIdDecoder,
    RuntimeSkewPass,
};
