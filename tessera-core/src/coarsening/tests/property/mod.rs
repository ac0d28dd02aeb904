//! Property-based tests for the concurrent union-find.
//!
//! Concurrent link sequences are checked against a sequential oracle for the
//! resulting partition into sets, set weights, special flags and the distinct
//! set counter; bounded links are checked for their weight ceiling.

mod oracle;
mod strategies;
mod types;

use proptest::prelude::*;
use rand::{SeedableRng, rngs::SmallRng};
use rayon::prelude::*;

use self::{
    oracle::SequentialUnionFind,
    strategies::{generate_fixture, link_fixture_strategy},
    types::{LinkFixture, LinkPattern},
};
use crate::{
    coarsening::{LinkOutcome, WeightedConcurrentUnionFind},
    test_utils::suite_proptest_config,
    types::NodeId,
};

fn build(fixture: &LinkFixture) -> WeightedConcurrentUnionFind {
    WeightedConcurrentUnionFind::new(&fixture.weights, &fixture.special)
}

/// Links every pair concurrently and compares the result with the oracle.
fn run_oracle_equivalence_property(fixture: &LinkFixture) -> Result<(), TestCaseError> {
    let uf = build(fixture);
    let merged = fixture
        .pairs
        .par_iter()
        .filter(|&&(u, v)| uf.link(u, v))
        .count();

    let mut oracle = SequentialUnionFind::new(&fixture.weights, &fixture.special);
    let expected_merges = fixture
        .pairs
        .iter()
        .filter(|&&(u, v)| oracle.union(u, v))
        .count();

    let n = fixture.weights.len();
    prop_assert_eq!(merged, expected_merges, "successful links ({:?})", fixture.pattern);
    prop_assert_eq!(uf.num_distinct_sets(), n - merged);
    for u in 0..n as NodeId {
        let root = uf.find(u);
        prop_assert_eq!(uf.find(root), root, "find is idempotent");
        prop_assert_eq!(uf.weight(u), oracle.weight(u), "weight of node {}", u);
        prop_assert_eq!(uf.contains_special_vertex(u), oracle.special(u), "special flag of node {}", u);
    }
    for &(u, v) in &fixture.pairs {
        prop_assert!(uf.is_same_set(u, v), "linked nodes {} and {} are apart", u, v);
    }
    for u in 0..n as NodeId {
        for v in (u + 1)..n as NodeId {
            prop_assert_eq!(uf.is_same_set(u, v), oracle.same_set(u, v));
        }
    }
    Ok(())
}

/// Sequential bounded links never produce a set heavier than the bound;
/// concurrent ones may overshoot by racing on a root but still conserve
/// weight and keep the set counter exact.
fn run_bounded_weight_property(fixture: &LinkFixture, bound: i64) -> Result<(), TestCaseError> {
    let n = fixture.weights.len();
    let sequential = build(fixture);
    for &(u, v) in &fixture.pairs {
        sequential.link_bounded(u, v, bound);
    }
    for u in 0..n as NodeId {
        let weight = sequential.weight(u);
        let singleton = fixture.weights[u as usize];
        prop_assert!(weight <= bound.max(singleton), "set of node {} weighs {}", u, weight);
    }

    let concurrent = build(fixture);
    let merged = fixture
        .pairs
        .par_iter()
        .filter(|&&(u, v)| concurrent.link_bounded(u, v, bound) == LinkOutcome::Merged)
        .count();
    prop_assert_eq!(concurrent.num_distinct_sets(), n - merged);
    let root_weights: i64 = (0..n as NodeId)
        .filter(|&u| concurrent.find(u) == u)
        .map(|u| concurrent.weight(u))
        .sum();
    prop_assert_eq!(root_weights, fixture.weights.iter().sum::<i64>(), "weight is conserved across roots");
    Ok(())
}

proptest! {
    #![proptest_config(suite_proptest_config(128))]

    #[test]
    fn concurrent_links_match_sequential_oracle(fixture in link_fixture_strategy()) {
        run_oracle_equivalence_property(&fixture)?;
    }

    #[test]
    fn bounded_links_respect_the_weight_ceiling(fixture in link_fixture_strategy(), bound in 1_i64..24) {
        run_bounded_weight_property(&fixture, bound)?;
    }
}

#[rstest::rstest]
#[case::random_7(LinkPattern::Random, 7)]
#[case::chain_42(LinkPattern::Chain, 42)]
#[case::star_42(LinkPattern::Star, 42)]
#[case::star_999(LinkPattern::Star, 999)]
#[case::redundant_42(LinkPattern::Redundant, 42)]
fn oracle_equivalence_on_named_patterns(#[case] pattern: LinkPattern, #[case] seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let fixture = generate_fixture(pattern, &mut rng);
    run_oracle_equivalence_property(&fixture).expect("union-find matches the oracle");
}

#[test]
fn oracle_merges_by_weight() {
    let mut oracle = SequentialUnionFind::new(&[1, 2, 3], &[true, false, false]);
    assert!(oracle.union(0, 1));
    assert!(!oracle.union(1, 0));
    assert!(oracle.union(2, 0));
    assert_eq!(oracle.weight(1), 6);
    assert!(oracle.special(2));
    assert!(oracle.same_set(0, 2));
}
