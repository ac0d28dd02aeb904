//! Tests for the move log, global rollback and the FM refiner.

use std::sync::Arc;

use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::SmallRng, seq::SliceRandom};
use rstest::rstest;
use tessera_test_support::tracing::RecordingLayer;

use super::{
    FmRefiner, GainIndex, GlobalMoveTracker, GlobalRollback,
    local_search::{LocalizedSearch, SearchOutcome},
};
use crate::{
    config::{PartitionContext, RefinementConfigBuilder, RollbackStrategy},
    gain::{GainCache, GraphCutGainCache, Km1GainCache},
    hypergraph::{Hypergraph, PartitionView, PartitionedHypergraph},
    objective,
    ownership::NodeOwnership,
    refiner::{Metrics, Refiner},
    test_utils::{RollbackExample, partition, random_blocks, random_hypergraph, suite_proptest_config},
    types::{BlockId, Gain, Move, MoveId, NodeId, NodeWeight},
};

fn initialized<G: GainCache>(mut cache: G, phg: &PartitionedHypergraph) -> G {
    cache.initialize(phg).expect("cache matches the partition");
    cache
}

fn assert_cache_is_exact<G: GainCache>(cache: &G, phg: &PartitionedHypergraph) {
    for u in phg.hypergraph().nodes() {
        let from = phg.part_id(u);
        assert_eq!(cache.penalty_term(u, from), cache.recompute_penalty_term(phg, u, from));
        for to in 0..phg.k() as BlockId {
            assert_eq!(cache.benefit_term(u, to), cache.recompute_benefit_term(phg, u, to));
        }
    }
}

/// One planned entry of a move log.
#[derive(Clone, Copy, Debug)]
struct PlannedMove {
    node: NodeId,
    to: BlockId,
    reverted: bool,
}

/// Applies `plan` to `phg` and records it in `tracker` the way committing
/// searches do; reverted entries are undone and invalidated.
fn commit_plan<G: GainCache>(
    phg: &PartitionedHypergraph,
    cache: &G,
    tracker: &GlobalMoveTracker,
    plan: &[PlannedMove],
) {
    for planned in plan {
        let from = phg.part_id(planned.node);
        let mv = Move::new(planned.node, from, planned.to, cache.gain(planned.node, from, planned.to));
        assert!(phg.change_node_part_with_gain_cache_update(mv.node, from, mv.to, NodeWeight::MAX, cache, |_| {}));
        let id = tracker.insert_move(mv);
        if planned.reverted {
            assert!(phg.change_node_part_with_gain_cache_update(mv.node, mv.to, from, NodeWeight::MAX, cache, |_| {}));
            tracker.invalidate(id);
        }
    }
}

fn random_plan(rng: &mut SmallRng, nodes: usize, k: usize, blocks: &[BlockId], len: usize) -> Vec<PlannedMove> {
    let mut order: Vec<NodeId> = (0..nodes as NodeId).collect();
    order.shuffle(rng);
    order
        .into_iter()
        .take(len)
        .map(|node| {
            let offset = rng.gen_range(1..k as BlockId);
            PlannedMove {
                node,
                to: (blocks[node as usize] + offset) % k as BlockId,
                reverted: rng.gen_bool(0.15),
            }
        })
        .collect()
}

#[test]
fn tracker_hands_out_ids_in_commit_order() {
    let tracker = GlobalMoveTracker::new(4);
    assert_eq!(tracker.first_move_id(), 1);
    let first = tracker.insert_move(Move::new(3, 0, 1, 2));
    let second = tracker.insert_move(Move::new(1, 1, 0, -1));
    assert_eq!((first, second), (1, 2));
    assert_eq!(tracker.move_of_node(3), first);
    assert_eq!(tracker.move_of_node(0), 0);
    assert_eq!(tracker.moves(), vec![Move::new(3, 0, 1, 2), Move::new(1, 1, 0, -1)]);

    tracker.invalidate(first);
    assert!(!tracker.is_move_still_valid(first));
    assert!(tracker.is_move_still_valid(second));
    assert!(!tracker.is_move_still_valid(3), "ids past the running counter are not valid");
}

#[test]
fn tracker_reset_starts_a_new_phase() {
    let mut tracker = GlobalMoveTracker::new(4);
    let id = tracker.insert_move(Move::new(0, 0, 1, 1));
    assert!(!tracker.reset());
    assert!(tracker.is_move_stale(id));
    assert!(!tracker.is_move_still_valid(tracker.move_of_node(0)));
    assert_eq!(tracker.num_performed_moves(), 0);
    assert_eq!(tracker.insert_move(Move::new(1, 0, 1, 1)), id + 1);
}

#[test]
fn tracker_reset_wraps_before_the_id_space_runs_out() {
    let mut tracker = GlobalMoveTracker::new(4);
    tracker.set_running_move_id_for_test(MoveId::MAX - 6);
    tracker.insert_move(Move::new(2, 0, 1, 1));
    tracker.insert_move(Move::new(3, 0, 1, 1));
    assert!(tracker.reset());
    assert_eq!(tracker.first_move_id(), 1);
    assert_eq!(tracker.move_of_node(2), 0);
    assert_eq!(tracker.insert_move(Move::new(2, 1, 0, 1)), 1);
}

#[test]
fn gain_index_prefers_higher_gain_then_earlier_index() {
    let early = GainIndex { gain: 3, best_index: 2 };
    let late = GainIndex { gain: 3, best_index: 7 };
    let better = GainIndex { gain: 4, best_index: 9 };
    assert_eq!(early.better(late), early);
    assert_eq!(late.better(early), early);
    assert_eq!(early.better(better), better);
    assert_eq!(GainIndex::default().better(early), early);
}

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn rollback_keeps_the_best_balanced_prefix(#[case] strategy: RollbackStrategy) {
    let example = RollbackExample::new();
    let phg = &example.phg;
    let cache = initialized(GraphCutGainCache::new(6, 2), phg);
    let mut tracker = GlobalMoveTracker::new(6);
    let mut rollback = GlobalRollback::new(phg.hypergraph(), 2, strategy);
    rollback.set_remaining_original_pins(phg);
    assert_eq!(objective::cut(phg), 3);

    for mv in example.moves {
        assert!(phg.change_node_part_with_gain_cache_update(mv.node, mv.from, mv.to, NodeWeight::MAX, &cache, |_| {}));
        tracker.insert_move(mv);
    }
    assert_eq!(phg.part_weights(), vec![1, 5]);

    let gain = rollback.revert_to_best_prefix(phg, &cache, &mut tracker, &example.max_part_weights);
    assert_eq!(gain, 3);
    assert_eq!(phg.part_weights(), vec![3, 3]);
    assert_eq!(phg.assignment(), vec![1, 0, 0, 0, 1, 1]);
    assert_eq!(objective::cut(phg), 0);
    assert_eq!(tracker.num_performed_moves(), 0);
    assert!(phg.check_tracked_partition_information());
    assert_cache_is_exact(&cache, phg);
}

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn rollback_of_an_empty_log_changes_nothing(#[case] strategy: RollbackStrategy) {
    let example = RollbackExample::new();
    let phg = &example.phg;
    let cache = initialized(GraphCutGainCache::new(6, 2), phg);
    let entries: Vec<Gain> = (0..12).map(|index| cache.entry(index)).collect();
    let mut tracker = GlobalMoveTracker::new(6);
    let mut rollback = GlobalRollback::new(phg.hypergraph(), 2, strategy);

    let gain = rollback.revert_to_best_prefix(phg, &cache, &mut tracker, &example.max_part_weights);
    assert_eq!(gain, 0);
    assert_eq!(phg.assignment(), vec![0, 0, 0, 0, 1, 1]);
    assert_eq!(phg.part_weights(), vec![4, 2]);
    assert_eq!(tracker.first_move_id(), 1);
    assert_eq!((0..12).map(|index| cache.entry(index)).collect::<Vec<_>>(), entries);
}

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn equal_gains_keep_the_earliest_prefix(#[case] strategy: RollbackStrategy) {
    let example = RollbackExample::new();
    let phg = &example.phg;
    let cache = initialized(GraphCutGainCache::new(6, 2), phg);
    let mut tracker = GlobalMoveTracker::new(6);
    let mut rollback = GlobalRollback::new(phg.hypergraph(), 2, strategy);
    // Node 3 follows nodes 1 and 2 and uncuts both their edges, bringing the
    // prefix sum back to 3.
    let moves = [example.moves[0], example.moves[1], example.moves[2], Move::new(3, 0, 1, 2)];
    for mv in moves {
        assert!(phg.change_node_part_with_gain_cache_update(mv.node, mv.from, mv.to, NodeWeight::MAX, &cache, |_| {}));
        tracker.insert_move(mv);
    }
    let unlimited = PartitionContext::new(6, 2, 0.0).scaled_max_part_weights(0.0);
    let gain = rollback.revert_to_best_prefix(phg, &cache, &mut tracker, &unlimited);
    assert_eq!(gain, 3);
    assert_eq!(phg.part_weights(), vec![3, 3]);
    assert_eq!(phg.assignment(), vec![1, 0, 0, 0, 1, 1]);
}

#[test]
fn reverting_and_reapplying_a_valid_move_restores_the_cache() {
    let example = RollbackExample::new();
    let phg = &example.phg;
    let cache = initialized(GraphCutGainCache::new(6, 2), phg);
    let tracker = GlobalMoveTracker::new(6);
    let mv = example.moves[0];
    assert!(phg.change_node_part_with_gain_cache_update(mv.node, mv.from, mv.to, NodeWeight::MAX, &cache, |_| {}));
    let id = tracker.insert_move(mv);
    assert!(tracker.is_move_still_valid(id));

    let entries: Vec<Gain> = (0..12).map(|index| cache.entry(index)).collect();
    let tracked = tracker.get_move(id);
    phg.change_node_part_with_gain_cache_update(tracked.node, tracked.to, tracked.from, NodeWeight::MAX, &cache, |_| {});
    phg.change_node_part_with_gain_cache_update(tracked.node, tracked.from, tracked.to, NodeWeight::MAX, &cache, |_| {});
    assert_eq!((0..12).map(|index| cache.entry(index)).collect::<Vec<_>>(), entries);
}

/// Three unit nodes on a path, bisected as `[0, 0, 1]`. Under
/// [`CROWDED_LIMITS`] block 1 takes one more node, so publishing nodes 0 and
/// 1 together is rejected on the second move.
fn crowded_path() -> PartitionedHypergraph {
    let hg = Arc::new(Hypergraph::with_unit_weights(3, [vec![0, 1], vec![1, 2]]).expect("path is valid"));
    partition(&hg, 2, &[0, 0, 1])
}

const CROWDED_LIMITS: [NodeWeight; 2] = [2, 2];

const OVERLOADING_PREFIX: [Move; 2] = [Move::new(0, 0, 1, -1), Move::new(1, 0, 1, 2)];

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn rejected_commit_restores_the_partition_and_invalidates_its_moves(#[case] strategy: RollbackStrategy) {
    let phg = crowded_path();
    let cache = initialized(GraphCutGainCache::new(3, 2), &phg);
    let entries: Vec<Gain> = (0..6).map(|index| cache.entry(index)).collect();
    let ownership = NodeOwnership::new(3);
    let mut tracker = GlobalMoveTracker::new(3);
    let mut rollback = GlobalRollback::new(phg.hypergraph(), 2, strategy);
    rollback.set_remaining_original_pins(&phg);
    let config = RefinementConfigBuilder::new().build().expect("defaults are valid");
    let before = objective::cut(&phg);

    let outcome = LocalizedSearch {
        phg: &phg,
        gain_cache: &cache,
        ownership: &ownership,
        tracker: &tracker,
        max_part_weights: &CROWDED_LIMITS,
        config: config.fm(),
    }
    .publish(0, &[], &OVERLOADING_PREFIX, 1);

    assert_eq!(outcome, SearchOutcome { committed_moves: 0, expected_gain: 0, logged_moves: 1 });
    assert_eq!(phg.assignment(), vec![0, 0, 1]);
    assert_eq!(phg.part_weights(), vec![2, 1]);
    assert!(phg.check_tracked_partition_information());
    assert_eq!((0..6).map(|index| cache.entry(index)).collect::<Vec<_>>(), entries);
    assert_cache_is_exact(&cache, &phg);
    assert_eq!(tracker.num_performed_moves(), 1);
    assert_eq!(tracker.move_of_node(0), 1);
    assert!(!tracker.get_move(1).is_valid());
    assert!(!tracker.is_move_still_valid(1));

    let gain = rollback.revert_to_best_prefix(&phg, &cache, &mut tracker, &CROWDED_LIMITS);
    assert_eq!(gain, 0);
    assert_eq!(before - objective::cut(&phg), gain);
    assert_eq!(phg.assignment(), vec![0, 0, 1]);
    assert_eq!(tracker.num_performed_moves(), 0);
    assert_cache_is_exact(&cache, &phg);
}

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn nodes_of_a_rejected_commit_stay_claimed_for_the_round(#[case] strategy: RollbackStrategy) {
    let phg = crowded_path();
    let cache = initialized(GraphCutGainCache::new(3, 2), &phg);
    let ownership = NodeOwnership::new(3);
    let mut tracker = GlobalMoveTracker::new(3);
    let mut rollback = GlobalRollback::new(phg.hypergraph(), 2, strategy);
    rollback.set_remaining_original_pins(&phg);
    let config = RefinementConfigBuilder::new().build().expect("defaults are valid");
    let before = objective::cut(&phg);

    let (first, second) = {
        let search = LocalizedSearch {
            phg: &phg,
            gain_cache: &cache,
            ownership: &ownership,
            tracker: &tracker,
            max_part_weights: &CROWDED_LIMITS,
            config: config.fm(),
        };
        for u in [0, 1] {
            assert!(ownership.try_acquire(u, 0));
        }
        let first = search.publish(0, &[0, 1], &OVERLOADING_PREFIX, 1);
        // Node 0 holds a log slot; node 1 never reached the log.
        assert_eq!(ownership.owner(0), Some(0));
        assert_eq!(ownership.owner(1), None);

        assert!(!ownership.try_acquire(0, 1));
        for u in [1, 2] {
            assert!(ownership.try_acquire(u, 1));
        }
        let second = search.publish(1, &[1, 2], &[Move::new(1, 0, 1, 0), Move::new(2, 1, 0, -1)], -1);
        (first, second)
    };

    assert_eq!(first.logged_moves, 1);
    assert_eq!(first.committed_moves, 0);
    assert_eq!(second.committed_moves, 2);
    assert_eq!(tracker.num_performed_moves(), 3);
    assert_eq!(phg.assignment(), vec![0, 1, 0]);

    let gain = rollback.revert_to_best_prefix(&phg, &cache, &mut tracker, &CROWDED_LIMITS);
    assert_eq!(gain, 0);
    assert_eq!(before - objective::cut(&phg), gain);
    assert!(phg.check_tracked_partition_information());
    assert_cache_is_exact(&cache, &phg);
}

/// Runs both strategies on identical move logs and compares the results.
fn run_rollback_equivalence(seed: u64, k: usize, factor_percent: u32) -> Result<(), TestCaseError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let nodes = 40;
    let hg = random_hypergraph(&mut rng, nodes, 70, 5);
    let blocks = random_blocks(&mut rng, nodes, k);
    let len = rng.gen_range(0..=nodes);
    let plan = random_plan(&mut rng, nodes, k, &blocks, len);
    let context = PartitionContext::new(hg.total_weight(), k, 0.1);
    let limits = context.scaled_max_part_weights(f64::from(factor_percent) / 100.0);

    let mut results = Vec::new();
    for strategy in [RollbackStrategy::Sequential, RollbackStrategy::Parallel] {
        let phg = partition(&hg, k, &blocks);
        let cache = initialized(Km1GainCache::new(nodes, k), &phg);
        let mut tracker = GlobalMoveTracker::new(nodes);
        let mut rollback = GlobalRollback::new(&hg, k, strategy);
        rollback.set_remaining_original_pins(&phg);
        let before = objective::km1(&phg);

        commit_plan(&phg, &cache, &tracker, &plan);
        let gain = rollback.revert_to_best_prefix(&phg, &cache, &mut tracker, &limits);

        prop_assert_eq!(before - objective::km1(&phg), gain, "{:?} reports the true gain", strategy);
        prop_assert!(gain >= 0);
        prop_assert!(phg.check_tracked_partition_information());
        assert_cache_is_exact(&cache, &phg);
        results.push((gain, phg.part_weights(), phg.assignment()));
    }
    prop_assert_eq!(&results[0], &results[1]);
    Ok(())
}

proptest! {
    #![proptest_config(suite_proptest_config(64))]

    #[test]
    fn sequential_and_parallel_rollback_agree(seed in any::<u64>(), k in 2_usize..5, factor_percent in 0_u32..300) {
        run_rollback_equivalence(seed, k, factor_percent)?;
    }
}

#[test]
fn consecutive_phases_reuse_the_pin_counters() {
    let mut rng = SmallRng::seed_from_u64(17);
    let (nodes, k) = (30, 3);
    let hg = random_hypergraph(&mut rng, nodes, 50, 6);
    let blocks = random_blocks(&mut rng, nodes, k);
    let phg = partition(&hg, k, &blocks);
    let cache = initialized(Km1GainCache::new(nodes, k), &phg);
    let mut tracker = GlobalMoveTracker::new(nodes);
    let mut rollback = GlobalRollback::new(&hg, k, RollbackStrategy::Parallel);
    rollback.set_remaining_original_pins(&phg);
    let unlimited = vec![NodeWeight::MAX; k];

    for _ in 0..5 {
        let before = objective::km1(&phg);
        let current = phg.assignment();
        let plan = random_plan(&mut rng, nodes, k, &current, 12);
        commit_plan(&phg, &cache, &tracker, &plan);
        let gain = rollback.revert_to_best_prefix(&phg, &cache, &mut tracker, &unlimited);
        assert_eq!(before - objective::km1(&phg), gain);
    }
}

/// An 8x8 grid split into left and right halves, with the two top corners
/// swapped between the halves.
fn swapped_corner_grid() -> (Arc<Hypergraph>, Vec<BlockId>) {
    let width = 8_u32;
    let mut edges = Vec::new();
    for row in 0..width {
        for col in 0..width {
            let u = row * width + col;
            if col + 1 < width {
                edges.push(vec![u, u + 1]);
            }
            if row + 1 < width {
                edges.push(vec![u, u + width]);
            }
        }
    }
    let hg = Arc::new(Hypergraph::with_unit_weights(64, edges).expect("valid grid"));
    let mut blocks: Vec<BlockId> = (0..64).map(|u| u32::from(u % width >= width / 2)).collect();
    blocks.swap(0, 7);
    (hg, blocks)
}

#[rstest]
#[case::sequential(RollbackStrategy::Sequential)]
#[case::parallel(RollbackStrategy::Parallel)]
fn fm_moves_misplaced_corners_back(#[case] strategy: RollbackStrategy) {
    let (hg, blocks) = swapped_corner_grid();
    let phg = partition(&hg, 2, &blocks);
    let config = RefinementConfigBuilder::new()
        .with_epsilon(0.1)
        .with_rollback_strategy(strategy)
        .build()
        .expect("valid configuration");
    let mut cache = GraphCutGainCache::new(64, 2);
    let mut fm = FmRefiner::new(&phg, &config);
    let initial = objective::cut(&phg);
    assert_eq!(initial, 12);
    let mut metrics = Metrics {
        objective: initial,
        imbalance: 0.0,
    };

    let improved = fm.refine(&phg, &mut cache, &mut metrics).expect("refinement runs");
    assert!(improved);
    assert_eq!(objective::cut(&phg), 8);
    assert_eq!(metrics.objective, 8);
    assert!(objective::is_balanced(&phg, fm.context()));
    assert!(phg.check_tracked_partition_information());
    assert_cache_is_exact(&cache, &phg);
}

#[test]
fn fm_never_worsens_a_random_hypergraph_partition() {
    let mut rng = SmallRng::seed_from_u64(2024);
    let (nodes, k) = (120, 4);
    let hg = random_hypergraph(&mut rng, nodes, 200, 5);
    let blocks: Vec<BlockId> = (0..nodes as BlockId).map(|u| u % k as BlockId).collect();
    let phg = partition(&hg, k, &blocks);
    let config = RefinementConfigBuilder::new()
        .with_epsilon(0.2)
        .with_num_seed_nodes(8)
        .build()
        .expect("valid configuration");
    let mut cache = Km1GainCache::new(nodes, k);
    let mut fm = FmRefiner::new(&phg, &config);
    let limits = fm.context().scaled_max_part_weights(config.fm().rollback_balance_violation_factor);
    let initial = objective::km1(&phg);
    let mut metrics = Metrics {
        objective: initial,
        imbalance: 0.0,
    };

    let improved = fm.refine(&phg, &mut cache, &mut metrics).expect("refinement runs");
    let final_km1 = objective::km1(&phg);
    assert!(final_km1 <= initial);
    assert_eq!(improved, final_km1 < initial);
    assert_eq!(metrics.objective, final_km1);
    let within_limits = (0..k as BlockId).all(|b| phg.part_weight(b) <= limits[b as usize]);
    let started_within = {
        let start = partition(&hg, k, &blocks);
        (0..k as BlockId).all(|b| start.part_weight(b) <= limits[b as usize])
    };
    assert!(within_limits || !started_within);
    assert!(phg.check_tracked_partition_information());
    assert_cache_is_exact(&cache, &phg);
}

#[test]
fn fm_rejects_a_cache_sized_for_another_partition() {
    let (hg, blocks) = swapped_corner_grid();
    let phg = partition(&hg, 2, &blocks);
    let mut cache = GraphCutGainCache::new(64, 3);
    let mut fm = FmRefiner::new(&phg, &RefinementConfigBuilder::new().build().expect("valid configuration"));
    let err = fm
        .refine(&phg, &mut cache, &mut Metrics::default())
        .expect_err("cache has the wrong k");
    assert_eq!(err.code(), crate::error::RefinementErrorCode::GainCacheMismatch);
}

#[test]
fn fm_rounds_are_traced() {
    let layer = RecordingLayer::default();
    let _guard = layer.install();
    let (hg, blocks) = swapped_corner_grid();
    let phg = partition(&hg, 2, &blocks);
    let config = RefinementConfigBuilder::new()
        .with_epsilon(0.1)
        .build()
        .expect("valid configuration");
    let mut cache = GraphCutGainCache::new(64, 2);
    let mut fm = FmRefiner::new(&phg, &config);
    fm.refine(&phg, &mut cache, &mut Metrics::default()).expect("refinement runs");

    let rounds = layer.spans_named("fm.round");
    assert!(!rounds.is_empty());
    assert_eq!(rounds[0].fields.get("round").map(String::as_str), Some("0"));
    assert_eq!(layer.spans_named("fm.refine").len(), 1);
    let finished = layer.events_with_message("fm round finished");
    assert_eq!(finished.len(), rounds.len());
    assert_eq!(finished[0].int_field("gain"), Some(4));
    assert!(!layer.events_with_message("rolled back to best prefix").is_empty());
}
