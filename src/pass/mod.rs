//! Compile-time annotating passes: pure functions over a [`Dag`] that each
//! declare the attribute keys they read and the single key they write.

pub mod large_shuffle_decoder;

pub use large_shuffle_decoder::LargeShuffleDecoderPass;

use crate::graph::{AttributeKey, Dag};

/// A pure, structure-preserving rewrite of one attribute across a [`Dag`].
///
/// `apply` must never add or remove a vertex or edge; it may only mutate the
/// attribute named by [`AnnotatingPass::write_attribute`] on existing
/// vertices/edges, reading only the keys named by
/// [`AnnotatingPass::read_set`]. Composing passes into a dependency-ordered
/// pipeline is a driver concern this crate does not implement.
pub trait AnnotatingPass {
    /// Attribute keys this pass reads.
    fn read_set(&self) -> &[AttributeKey];

    /// The single attribute key this pass writes.
    fn write_attribute(&self) -> AttributeKey;

    /// Apply the pass, returning the rewritten DAG.
    fn apply(&self, dag: Dag) -> Dag;
}
