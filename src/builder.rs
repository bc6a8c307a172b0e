//! Mutable DAG accumulator.
//!
//! `DagBuilder` is the only way to produce a [`Dag`]. It owns the adjacency
//! tables and edge arena until [`DagBuilder::build`] transfers them into a
//! frozen `Dag`; it is not thread-safe and is meant to be used from a single
//! compiler-driver thread (see SPEC_FULL.md §5).

use indexmap::{IndexMap, IndexSet};

use crate::error::{render_vertex_id, OptimizationError, Result};
use crate::graph::{AttributeKey, AttributeValue, Dag, Edge, EdgeId, EdgeType, Vertex, VertexId};

#[derive(Debug, Clone)]
struct VertexState {
    vertex: Vertex,
    incoming: IndexSet<EdgeId>,
    outgoing: IndexSet<EdgeId>,
    loop_assignment: Option<VertexId>,
    loop_depth: Option<u32>,
}

impl VertexState {
    fn new(vertex: Vertex) -> Self {
        VertexState {
            vertex,
            incoming: IndexSet::new(),
            outgoing: IndexSet::new(),
            loop_assignment: None,
            loop_depth: None,
        }
    }
}

/// Mutable accumulator that produces an immutable [`Dag`].
#[derive(Debug, Clone, Default)]
pub struct DagBuilder {
    vertices: IndexMap<VertexId, VertexState>,
    edges: IndexMap<EdgeId, Edge>,
}

impl DagBuilder {
    pub fn new() -> Self {
        DagBuilder {
            vertices: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    /// Insert `v` with empty adjacency sets. Idempotent: re-adding a vertex
    /// with an id already present is a no-op (the existing vertex, along
    /// with any edges already connected to it, is left untouched).
    pub fn add_vertex(&mut self, v: Vertex) -> &mut Self {
        self.vertices
            .entry(v.id.clone())
            .or_insert_with(|| VertexState::new(v));
        self
    }

    /// Insert `v`, additionally recording its loop assignment and nesting
    /// depth. `depth` must equal the number of loops enclosing `v`.
    pub fn add_vertex_with_loop(
        &mut self,
        v: Vertex,
        loop_vertex: VertexId,
        depth: u32,
    ) -> &mut Self {
        let id = v.id.clone();
        let state = self
            .vertices
            .entry(id)
            .or_insert_with(|| VertexState::new(v));
        state.loop_assignment = Some(loop_vertex);
        state.loop_depth = Some(depth);
        self
    }

    /// Convenience over [`DagBuilder::add_vertex_with_loop`]: if `loop_stack`
    /// is non-empty, the top of the stack becomes the assigned loop and the
    /// stack's length becomes the depth; otherwise behaves like
    /// [`DagBuilder::add_vertex`].
    pub fn add_vertex_with_loop_stack(
        &mut self,
        v: Vertex,
        loop_stack: &[VertexId],
    ) -> &mut Self {
        match loop_stack.last() {
            Some(top) => self.add_vertex_with_loop(v, top.clone(), loop_stack.len() as u32),
            None => self.add_vertex(v),
        }
    }

    /// Insert `v`, copying its loop assignment and depth from `source_dag`
    /// if `source_dag.is_composite(&v.id)`; otherwise a plain insert.
    pub fn add_vertex_copying_from(&mut self, v: Vertex, source_dag: &Dag) -> &mut Self {
        let id = v.id.clone();
        if source_dag.is_composite(&id) {
            let assigned = source_dag.assigned_loop_of(&id).cloned();
            let depth = source_dag.loop_depth_of(&id);
            self.add_vertex(v);
            if let Some(state) = self.vertices.get_mut(&id) {
                state.loop_assignment = assigned;
                state.loop_depth = Some(depth);
            }
        } else {
            self.add_vertex(v);
        }
        self
    }

    /// Remove `v` and every edge incident on it, from both endpoints'
    /// adjacency sets, from the edge arena, and from the vertex-keyed maps.
    pub fn remove_vertex(&mut self, v: &VertexId) {
        let Some(state) = self.vertices.shift_remove(v) else {
            return;
        };

        for edge_id in state.incoming.iter().chain(state.outgoing.iter()) {
            if let Some(edge) = self.edges.shift_remove(edge_id) {
                if &edge.source != v {
                    if let Some(src) = self.vertices.get_mut(&edge.source) {
                        src.outgoing.shift_remove(edge_id);
                    }
                }
                if &edge.destination != v {
                    if let Some(dst) = self.vertices.get_mut(&edge.destination) {
                        dst.incoming.shift_remove(edge_id);
                    }
                }
            }
        }
    }

    /// Connect an edge. Both endpoints must already be present, otherwise
    /// fails with [`OptimizationError::IllegalVertexOperation`] (message
    /// renders missing endpoints as `null`).
    pub fn connect(&mut self, edge: Edge) -> Result<&mut Self> {
        let src_present = self.vertices.contains_key(&edge.source);
        let dst_present = self.vertices.contains_key(&edge.destination);
        if !src_present || !dst_present {
            return Err(OptimizationError::IllegalVertexOperation {
                src: render_vertex_id(src_present.then_some(&edge.source)),
                dst: render_vertex_id(dst_present.then_some(&edge.destination)),
            });
        }

        let id = edge.id.clone();
        let (source, destination) = (edge.source.clone(), edge.destination.clone());
        self.edges.insert(id.clone(), edge);
        self.vertices
            .get_mut(&destination)
            .expect("destination checked present above")
            .incoming
            .insert(id.clone());
        self.vertices
            .get_mut(&source)
            .expect("source checked present above")
            .outgoing
            .insert(id);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn contains(&self, v: &VertexId) -> bool {
        self.vertices.contains_key(v)
    }

    pub fn contains_matching(&self, predicate: impl Fn(&Vertex) -> bool) -> bool {
        self.vertices.values().any(|state| predicate(&state.vertex))
    }

    /// Run {acyclicity, source, sink, attribute} checks and return a frozen
    /// `Dag`, or the first violated invariant.
    pub fn build(self) -> Result<Dag> {
        self.build_checked(true)
    }

    /// Run {acyclicity, attribute} only; used when assembling the body of a
    /// loop container in isolation (its vertices are not yet wired to the
    /// enclosing DAG's sources/sinks).
    pub fn build_without_source_sink_check(self) -> Result<Dag> {
        self.build_checked(false)
    }

    fn build_checked(self, check_source_sink: bool) -> Result<Dag> {
        if let Err(e) = check_acyclicity(&self) {
            tracing::debug!(
                vertex_count = self.vertices.len(),
                edge_count = self.edges.len(),
                check = "acyclicity",
                "DAG build failed"
            );
            return Err(e);
        }

        if check_source_sink {
            if let Err(e) = check_source_rule(&self) {
                tracing::debug!(check = "source", "DAG build failed");
                return Err(e);
            }
            if let Err(e) = check_sink_rule(&self) {
                tracing::debug!(check = "sink", "DAG build failed");
                return Err(e);
            }
        }

        if let Err(e) = check_attribute_consistency(&self) {
            tracing::debug!(check = "attribute", "DAG build failed");
            return Err(e);
        }

        let vertex_count = self.vertices.len();
        let edge_count = self.edges.len();

        let mut dag = Dag::empty();
        for (id, state) in self.vertices {
            dag.vertices.insert(id.clone(), state.vertex);
            dag.incoming.insert(id.clone(), state.incoming);
            dag.outgoing.insert(id.clone(), state.outgoing);
            if let Some(loop_vertex) = state.loop_assignment {
                dag.loop_assignment.insert(id.clone(), loop_vertex);
            }
            if let Some(depth) = state.loop_depth {
                dag.loop_depth.insert(id, depth);
            }
        }
        dag.edges = self.edges;

        tracing::info!(vertex_count, edge_count, "DAG built");
        Ok(dag)
    }

    fn outgoing_of(&self, v: &VertexId) -> impl Iterator<Item = &Edge> {
        self.vertices
            .get(v)
            .into_iter()
            .flat_map(|s| s.outgoing.iter())
            .filter_map(|eid| self.edges.get(eid))
    }

    fn incoming_of(&self, v: &VertexId) -> impl Iterator<Item = &Edge> {
        self.vertices
            .get(v)
            .into_iter()
            .flat_map(|s| s.incoming.iter())
            .filter_map(|eid| self.edges.get(eid))
    }
}

fn check_acyclicity(builder: &DagBuilder) -> Result<()> {
    let mut visited: IndexSet<VertexId> = IndexSet::new();
    let mut on_path: IndexSet<VertexId> = IndexSet::new();

    let seeds: Vec<VertexId> = builder
        .vertices
        .iter()
        .filter(|(_, state)| state.incoming.is_empty())
        .map(|(id, _)| id.clone())
        .collect();

    for seed in &seeds {
        if !visited.contains(seed) {
            dfs_check_cycle(builder, seed, &mut visited, &mut on_path)?;
        }
    }

    Ok(())
}

fn dfs_check_cycle(
    builder: &DagBuilder,
    v: &VertexId,
    visited: &mut IndexSet<VertexId>,
    on_path: &mut IndexSet<VertexId>,
) -> Result<()> {
    visited.insert(v.clone());
    on_path.insert(v.clone());

    for edge in builder.outgoing_of(v) {
        let dest = edge.destination.clone();
        if on_path.contains(&dest) {
            return Err(OptimizationError::CycleDetected);
        }
        if !visited.contains(&dest) {
            dfs_check_cycle(builder, &dest, visited, on_path)?;
        }
    }

    on_path.shift_remove(v);
    Ok(())
}

fn check_source_rule(builder: &DagBuilder) -> Result<()> {
    // A `Loop` container is exempt from this rule the same way it is exempt
    // from the sink rule: its entry/exit semantics are validated when its
    // body is built in isolation via `build_without_source_sink_check`, not
    // by the enclosing DAG's source/sink checks.
    let offenders: Vec<VertexId> = builder
        .vertices
        .iter()
        .filter(|(_, state)| {
            state.incoming.is_empty() && !state.vertex.is_source() && !state.vertex.is_loop()
        })
        .map(|(id, _)| id.clone())
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(OptimizationError::SourceViolation(offenders))
    }
}

fn check_sink_rule(builder: &DagBuilder) -> Result<()> {
    let offenders: Vec<VertexId> = builder
        .vertices
        .iter()
        .filter(|(_, state)| state.outgoing.is_empty() && !state.vertex.is_legal_sink())
        .map(|(id, _)| id.clone())
        .collect();

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(OptimizationError::SinkViolation(offenders))
    }
}

fn check_attribute_consistency(builder: &DagBuilder) -> Result<()> {
    for state in builder.vertices.values() {
        let v = &state.vertex.id;
        for edge in builder.incoming_of(v) {
            if edge.edge_type != EdgeType::OneToOne || edge.attributes.has_side_input() {
                continue;
            }

            let Some(src_state) = builder.vertices.get(&edge.source) else {
                continue;
            };
            if src_state.vertex.is_loop() || state.vertex.is_loop() {
                continue;
            }

            let src_parallelism = src_state.vertex.attributes.get(AttributeKey::Parallelism);
            let dst_parallelism = state.vertex.attributes.get(AttributeKey::Parallelism);

            if let (
                Some(AttributeValue::Parallelism(src)),
                Some(AttributeValue::Parallelism(dst)),
            ) = (src_parallelism, dst_parallelism)
            {
                if src != dst {
                    return Err(OptimizationError::ParallelismMismatch(edge.id.clone()));
                }
            }
        }
    }
    Ok(())
}
