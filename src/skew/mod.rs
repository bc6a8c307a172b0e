//! Runtime data-skew mitigation: computes balanced key ranges from observed
//! per-key partition sizes and rewrites a [`PhysicalPlan`]'s stage-edge key
//! assignments accordingly.

use std::collections::{HashMap, HashSet};

use crate::config::DynamicOptimizationConfig;
use crate::error::{OptimizationError, Result};
use crate::physical::{HashRange, PhysicalPlan};

/// Decodes the runtime edge id embedded in an opaque block id. The block-id
/// wire format is owned by the embedding id-generator, not this crate; the
/// pass only ever calls through this seam.
pub trait RuntimeEdgeIdDecoder {
    fn decode(&self, block_id: &str) -> String;
}

/// Wraps any `Fn(&str) -> String` closure as a [`RuntimeEdgeIdDecoder`].
pub struct FnRuntimeEdgeIdDecoder<F>(pub F)
where
    F: Fn(&str) -> String;

impl<F> RuntimeEdgeIdDecoder for FnRuntimeEdgeIdDecoder<F>
where
    F: Fn(&str) -> String,
{
    fn decode(&self, block_id: &str) -> String {
        (self.0)(block_id)
    }
}

/// The id the embedding driver registers this pass's runtime messages under.
/// This crate does not implement dispatch (see [`crate::listener`]); the
/// constant exists so a driver's `EventHandlerRegistry` can look this pass up
/// by name.
pub const EVENT_HANDLER_ID: &str = "DynamicOptimization";

/// Top-*k* keys by descending partition size, ascending key as tie-break.
/// Fails with [`OptimizationError::InsufficientKeys`] if fewer than `k` keys
/// were observed.
pub fn identify_skewed_keys(key_sizes: &HashMap<u64, u64>, k: usize) -> Result<Vec<u64>> {
    if key_sizes.len() < k {
        return Err(OptimizationError::InsufficientKeys {
            needed: k,
            available: key_sizes.len(),
        });
    }

    let mut entries: Vec<(u64, u64)> = key_sizes.iter().map(|(&key, &size)| (key, size)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    Ok(entries.into_iter().take(k).map(|(key, _)| key).collect())
}

/// Partitions `[0, max_key + 1)` into exactly `n` half-open ranges whose
/// boundaries track an even split of `total size / n`, flagging each range
/// that contains one of the top-`k` skewed keys.
///
/// Fails with [`OptimizationError::DynamicOptimization`] if `key_sizes` is
/// empty or `n` is zero, and propagates
/// [`OptimizationError::InsufficientKeys`] from [`identify_skewed_keys`].
pub fn calculate_key_ranges(
    key_sizes: &HashMap<u64, u64>,
    n: usize,
    k: usize,
) -> Result<Vec<HashRange>> {
    let max_key = key_sizes
        .keys()
        .copied()
        .max()
        .ok_or_else(|| OptimizationError::DynamicOptimization("key_sizes must not be empty".to_string()))?;

    if n == 0 {
        return Err(OptimizationError::DynamicOptimization(
            "task count must be at least 1".to_string(),
        ));
    }

    let size_of = |key: u64| key_sizes.get(&key).copied().unwrap_or(0);

    let total: u64 = key_sizes.values().sum();
    let ideal = total / n as u64;

    let skewed: HashSet<u64> = identify_skewed_keys(key_sizes, k)?.into_iter().collect();

    let mut ranges = Vec::with_capacity(n);
    let mut start: u64 = 0;
    let mut finish: u64 = 1;
    let mut acc: u64 = size_of(0);

    for i in 1..=n {
        if i < n {
            let target = ideal * i as u64;
            while acc < target {
                acc += size_of(finish);
                finish += 1;
            }

            // `acc == size_of([0, finish))` always, so `size_of(finish - 1)` is
            // one of its summands and this subtraction never underflows.
            let before_last = acc - size_of(finish - 1);
            if before_last < target {
                let overshoot = acc - target;
                let undershoot = target - before_last;
                if overshoot > undershoot {
                    finish -= 1;
                    acc -= size_of(finish);
                }
            }

            let skewed_flag = (start..finish).any(|key| skewed.contains(&key));
            ranges.push(HashRange::new(start, finish, skewed_flag));
            start = finish;
            // Advance `finish` by exactly one, re-syncing `acc` to
            // `size_of([0, finish))` so the next iteration's target check
            // starts from a correct accumulator.
            acc += size_of(finish);
            finish += 1;
        } else {
            let end = max_key + 1;
            let skewed_flag = (start..end).any(|key| skewed.contains(&key));
            ranges.push(HashRange::new(start, end, skewed_flag));
        }
    }

    Ok(ranges)
}

/// Holds the one tunable the runtime skew pass needs (see
/// [`DynamicOptimizationConfig`]) and rewrites [`PhysicalPlan`] stage-edge
/// key assignments from observed metric data.
#[derive(Debug, Clone)]
pub struct RuntimeSkewPass {
    config: DynamicOptimizationConfig,
}

impl RuntimeSkewPass {
    pub fn new(config: DynamicOptimizationConfig) -> Self {
        RuntimeSkewPass { config }
    }

    pub fn identify_skewed_keys(&self, key_sizes: &HashMap<u64, u64>) -> Result<Vec<u64>> {
        identify_skewed_keys(key_sizes, self.config.skewed_key_count)
    }

    pub fn calculate_key_ranges(
        &self,
        key_sizes: &HashMap<u64, u64>,
        n: usize,
    ) -> Result<Vec<HashRange>> {
        calculate_key_ranges(key_sizes, n, self.config.skewed_key_count)
    }

    /// Runs the full runtime procedure (SPEC_FULL.md §4.4 steps 1-6):
    /// decode `block_ids` into runtime edge ids, find the stage edges they
    /// name, determine their shared downstream task count, recompute key
    /// ranges, and return a fresh plan with those stage edges' key
    /// assignments overwritten. The stage DAG itself is reused unchanged.
    pub fn apply(
        &self,
        plan: &PhysicalPlan,
        decoder: &dyn RuntimeEdgeIdDecoder,
        block_ids: &[String],
        key_sizes: &HashMap<u64, u64>,
    ) -> Result<PhysicalPlan> {
        let runtime_edge_ids: HashSet<String> =
            block_ids.iter().map(|block_id| decoder.decode(block_id)).collect();

        let matched: Vec<_> = plan
            .stage_edges
            .values()
            .filter(|edge| runtime_edge_ids.contains(edge.id.as_str()))
            .collect();

        if matched.is_empty() {
            tracing::debug!(plan_id = plan.id.as_str(), "no stage edges matched reported block ids");
            return Err(OptimizationError::EmptyOptimizationEdges);
        }

        let destination = matched[0].destination.clone();
        let task_count = plan.stage(&destination).map(|stage| stage.task_count()).unwrap_or(0);

        let ranges = self.calculate_key_ranges(key_sizes, task_count)?;

        let mut stage_edges = plan.stage_edges.clone();
        for edge in matched {
            let id = edge.id.clone();
            let map = ranges
                .iter()
                .enumerate()
                .map(|(task_index, range)| (task_index as u32, *range))
                .collect();
            if let Some(entry) = stage_edges.get_mut(&id) {
                entry.task_index_to_key_range = map;
            }
        }

        tracing::info!(
            plan_id = plan.id.as_str(),
            task_count,
            edges_rewritten = runtime_edge_ids.len(),
            "runtime skew pass applied"
        );

        Ok(PhysicalPlan::new(
            plan.id.clone(),
            plan.dag.clone(),
            plan.stages.clone(),
            stage_edges,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skew_partition_even_split() {
        let sizes = HashMap::from([(0, 10), (1, 10), (2, 10), (3, 10)]);
        let ranges = calculate_key_ranges(&sizes, 2, 1).unwrap();
        assert_eq!(ranges, vec![HashRange::new(0, 2, true), HashRange::new(2, 4, false)]);
    }

    #[test]
    fn skew_partition_with_overshoot_correction() {
        let sizes = HashMap::from([(0, 1), (1, 100), (2, 1), (3, 1)]);
        let ranges = calculate_key_ranges(&sizes, 2, 1).unwrap();
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges[0].end, 2);
        assert_eq!(ranges[1].start, 2);
        assert_eq!(ranges[1].end, 4);
    }

    #[test]
    fn insufficient_keys_fails() {
        let sizes = HashMap::from([(0, 5)]);
        let err = calculate_key_ranges(&sizes, 1, 3).unwrap_err();
        assert_eq!(err, OptimizationError::InsufficientKeys { needed: 3, available: 1 });
    }

    #[test]
    fn identify_skewed_keys_ties_break_ascending() {
        let sizes = HashMap::from([(0, 10), (1, 10), (2, 10), (3, 10)]);
        assert_eq!(identify_skewed_keys(&sizes, 1).unwrap(), vec![0]);
    }

    #[test]
    fn ranges_form_a_gapless_nonoverlapping_partition() {
        let sizes = HashMap::from([(0, 4), (1, 9), (2, 1), (3, 6), (4, 2)]);
        let ranges = calculate_key_ranges(&sizes, 3, 2).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].start, 0);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn key_range_final_range_covers_max_key() {
        let sizes = HashMap::from([(0, 1), (1, 1), (5, 1)]);
        let ranges = calculate_key_ranges(&sizes, 2, 1).unwrap();
        let last = ranges.last().unwrap();
        assert_eq!(last.end, 6);
        assert!(last.contains(5));
        assert!(!last.contains(6));
    }

    #[test]
    fn all_mass_on_one_key_lands_in_a_single_range() {
        let sizes = HashMap::from([(0, 0), (1, 1000), (2, 0), (3, 0)]);
        let ranges = calculate_key_ranges(&sizes, 4, 1).unwrap();
        let containing = ranges.iter().filter(|r| r.contains(1)).count();
        assert_eq!(containing, 1);
    }

    fn sample_plan() -> PhysicalPlan {
        use crate::builder::DagBuilder;
        use crate::graph::{EdgeType, Vertex};
        use crate::physical::{PlanId, Stage, StageEdge};

        let mut builder = DagBuilder::new();
        builder.add_vertex(Vertex::source("producer"));
        builder.add_vertex(Vertex::operator("consumer", crate::graph::TransformKind::DoTransform));
        builder
            .connect(crate::graph::Edge::new("shuffle-edge", "producer", "consumer", EdgeType::Shuffle))
            .unwrap();
        let dag = builder.build().unwrap();

        let mut stages = HashMap::new();
        stages.insert(
            "producer".into(),
            Stage::new("producer", vec!["t0".to_string()]),
        );
        stages.insert(
            "consumer".into(),
            Stage::new("consumer", vec!["t0".to_string(), "t1".to_string()]),
        );

        let mut stage_edges = HashMap::new();
        stage_edges.insert(
            "shuffle-edge".into(),
            StageEdge::new("shuffle-edge", "producer", "consumer"),
        );

        PhysicalPlan::new(PlanId::new("plan-1"), dag, stages, stage_edges)
    }

    #[test]
    fn apply_rewrites_matched_stage_edges() {
        let plan = sample_plan();
        let pass = RuntimeSkewPass::new(DynamicOptimizationConfig { skewed_key_count: 1 });
        let decoder = FnRuntimeEdgeIdDecoder(|block_id: &str| {
            block_id.rsplit_once('-').map(|(prefix, _)| prefix.to_string()).unwrap_or_else(|| block_id.to_string())
        });
        let block_ids = vec!["shuffle-edge-7".to_string()];
        let key_sizes = HashMap::from([(0u64, 10u64), (1, 50)]);

        let rewritten = pass.apply(&plan, &decoder, &block_ids, &key_sizes).unwrap();

        let edge = rewritten.stage_edge(&"shuffle-edge".into()).unwrap();
        assert_eq!(edge.task_index_to_key_range.len(), 2);
        assert!(edge.task_index_to_key_range.contains_key(&0));
        assert!(edge.task_index_to_key_range.contains_key(&1));
    }

    #[test]
    fn apply_fails_when_nothing_matches() {
        let plan = sample_plan();
        let pass = RuntimeSkewPass::new(DynamicOptimizationConfig::default());
        let decoder = FnRuntimeEdgeIdDecoder(|_: &str| "does-not-exist".to_string());
        let err = pass
            .apply(&plan, &decoder, &["x".to_string()], &HashMap::from([(0, 1)]))
            .unwrap_err();
        assert_eq!(err, OptimizationError::EmptyOptimizationEdges);
    }
}
