//! The immutable, validated DAG container.
//!
//! Produced only by [`crate::builder::DagBuilder::build`] or
//! `build_without_source_sink_check`; passes mutate attributes in place but
//! never add or remove a vertex or edge once built.

use indexmap::{IndexMap, IndexSet};

use crate::graph::edge::{Edge, EdgeId};
use crate::graph::vertex::{Vertex, VertexId};

/// An immutable, acyclic, attributed graph. Edges live once in an owning
/// arena keyed by [`EdgeId`]; per-vertex adjacency sets hold `EdgeId`s.
#[derive(Debug, Clone, PartialEq)]
pub struct Dag {
    pub(crate) vertices: IndexMap<VertexId, Vertex>,
    pub(crate) edges: IndexMap<EdgeId, Edge>,
    pub(crate) incoming: IndexMap<VertexId, IndexSet<EdgeId>>,
    pub(crate) outgoing: IndexMap<VertexId, IndexSet<EdgeId>>,
    pub(crate) loop_assignment: IndexMap<VertexId, VertexId>,
    pub(crate) loop_depth: IndexMap<VertexId, u32>,
}

impl Dag {
    pub(crate) fn empty() -> Self {
        Dag {
            vertices: IndexMap::new(),
            edges: IndexMap::new(),
            incoming: IndexMap::new(),
            outgoing: IndexMap::new(),
            loop_assignment: IndexMap::new(),
            loop_depth: IndexMap::new(),
        }
    }

    /// All vertices, in insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.vertices.values()
    }

    pub fn vertex(&self, id: &VertexId) -> Option<&Vertex> {
        self.vertices.get(id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.get(id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Incoming edges of `v`, in insertion order. Empty (not missing) for a
    /// known vertex with no in-edges.
    pub fn incoming_edges_of(&self, v: &VertexId) -> Vec<&Edge> {
        self.incoming
            .get(v)
            .into_iter()
            .flatten()
            .filter_map(|eid| self.edges.get(eid))
            .collect()
    }

    /// Outgoing edges of `v`, in insertion order.
    pub fn outgoing_edges_of(&self, v: &VertexId) -> Vec<&Edge> {
        self.outgoing
            .get(v)
            .into_iter()
            .flatten()
            .filter_map(|eid| self.edges.get(eid))
            .collect()
    }

    /// The `Loop` vertex `v` is assigned to, if any.
    pub fn assigned_loop_of(&self, v: &VertexId) -> Option<&VertexId> {
        self.loop_assignment.get(v)
    }

    /// Loop-nesting depth of `v`; 0 when not inside a loop or unknown.
    pub fn loop_depth_of(&self, v: &VertexId) -> u32 {
        self.loop_depth.get(v).copied().unwrap_or(0)
    }

    /// Whether `v` is itself a composite (`Loop`) container.
    pub fn is_composite(&self, v: &VertexId) -> bool {
        self.vertices.get(v).map(|vx| vx.is_loop()).unwrap_or(false)
    }

    /// Topological order over all vertices, deterministic for a given
    /// construction order: a standard iterative DFS post-order reversal,
    /// visiting unvisited vertices in insertion order and each vertex's
    /// children in outgoing-edge insertion order.
    pub fn topological_order(&self) -> Vec<VertexId> {
        let mut visited: IndexSet<VertexId> = IndexSet::new();
        let mut finished: Vec<VertexId> = Vec::with_capacity(self.vertices.len());

        for start in self.vertices.keys() {
            if visited.contains(start) {
                continue;
            }
            self.dfs_post_order(start, &mut visited, &mut finished);
        }

        finished.reverse();
        finished
    }

    /// Reverse of [`Dag::topological_order`].
    pub fn reverse_topological_order(&self) -> Vec<VertexId> {
        let mut order = self.topological_order();
        order.reverse();
        order
    }

    fn dfs_post_order(
        &self,
        v: &VertexId,
        visited: &mut IndexSet<VertexId>,
        finished: &mut Vec<VertexId>,
    ) {
        if !visited.insert(v.clone()) {
            return;
        }
        for edge in self.outgoing_edges_of(v) {
            if !visited.contains(&edge.destination) {
                self.dfs_post_order(&edge.destination, visited, finished);
            }
        }
        finished.push(v.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DagBuilder;
    use crate::graph::edge::EdgeType;
    use crate::graph::vertex::{TransformKind, Vertex};

    fn linear_dag() -> Dag {
        let mut builder = DagBuilder::new();
        builder.add_vertex(Vertex::source("a"));
        builder.add_vertex(Vertex::operator("b", TransformKind::Other));
        builder.add_vertex(Vertex::operator("c", TransformKind::DoTransform));
        builder
            .connect(Edge::new("a->b", "a", "b", EdgeType::OneToOne))
            .unwrap();
        builder
            .connect(Edge::new("b->c", "b", "c", EdgeType::OneToOne))
            .unwrap();
        builder.build().unwrap()
    }

    use crate::graph::edge::Edge;

    #[test]
    fn topological_order_respects_edges() {
        let dag = linear_dag();
        let order = dag.topological_order();
        let pos = |id: &str| order.iter().position(|v| v.as_str() == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn reverse_topological_order_is_exact_reverse() {
        let dag = linear_dag();
        let mut reversed = dag.topological_order();
        reversed.reverse();
        assert_eq!(reversed, dag.reverse_topological_order());
    }

    #[test]
    fn adjacency_queries_on_unknown_vertex_are_empty() {
        let dag = linear_dag();
        let unknown = VertexId::new("does-not-exist");
        assert!(dag.incoming_edges_of(&unknown).is_empty());
        assert!(dag.outgoing_edges_of(&unknown).is_empty());
        assert_eq!(dag.loop_depth_of(&unknown), 0);
        assert_eq!(dag.assigned_loop_of(&unknown), None);
    }
}
