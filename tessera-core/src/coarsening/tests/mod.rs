//! Tests for the concurrent union-find and pair clustering.

mod property;

use rayon::prelude::*;
use rstest::rstest;

use super::{LinkOutcome, WeightedConcurrentUnionFind, cluster_pairs};
use crate::hypergraph::Hypergraph;

#[test]
fn singletons_are_their_own_roots() {
    let uf = WeightedConcurrentUnionFind::new(&[2, 3, 5], &[false; 3]);
    assert_eq!(uf.num_distinct_sets(), 3);
    for u in 0..3 {
        assert_eq!(uf.find(u), u);
    }
    assert_eq!(uf.weight(2), 5);
    assert!(!uf.is_same_set(0, 1));
}

#[rstest]
#[case::left_heavier(&[5, 2], 0)]
#[case::right_heavier(&[2, 5], 1)]
#[case::tie_keeps_left(&[3, 3], 0)]
fn heavier_root_survives(#[case] weights: &[i64], #[case] expected_root: u32) {
    let uf = WeightedConcurrentUnionFind::new(weights, &[false, false]);
    assert!(uf.link(0, 1));
    assert_eq!(uf.find(0), expected_root);
    assert_eq!(uf.find(1), expected_root);
    assert_eq!(uf.weight(1), weights.iter().sum::<i64>());
}

#[test]
fn bounded_link_reports_every_outcome() {
    let uf = WeightedConcurrentUnionFind::new(&[2, 2, 3], &[false; 3]);
    assert_eq!(uf.link_bounded(0, 1, 4), LinkOutcome::Merged);
    assert_eq!(uf.link_bounded(1, 0, 4), LinkOutcome::AlreadyLinked);
    assert_eq!(uf.link_bounded(1, 2, 6), LinkOutcome::TooHeavy);
    assert_eq!(uf.num_distinct_sets(), 2);
    assert_eq!(uf.link_bounded(1, 2, 7), LinkOutcome::Merged);
    assert_eq!(uf.weight(2), 7);
}

#[test]
fn special_flag_follows_the_merged_set() {
    let uf = WeightedConcurrentUnionFind::new(&[1, 1, 1, 1], &[false, false, false, true]);
    assert!(uf.link(0, 1));
    assert!(!uf.contains_special_vertex(0));
    assert!(uf.link(3, 2));
    assert!(uf.link(2, 1));
    assert!((0..4).all(|u| uf.contains_special_vertex(u)));
}

#[test]
fn find_compresses_long_paths() {
    let weights: Vec<i64> = (1..=6).collect();
    let uf = WeightedConcurrentUnionFind::new(&weights, &[false; 6]);
    for u in 1..6 {
        assert!(uf.link(u - 1, u));
    }
    let root = uf.find(0);
    assert_eq!(uf.find(root), root);
    assert!((0..6).all(|u| uf.find(u) == root));
    assert_eq!(uf.weight(0), 21);
    assert_eq!(uf.num_distinct_sets(), 1);
}

#[test]
fn contended_links_on_one_root_conserve_weight() {
    let n = 2_000_u32;
    let uf = WeightedConcurrentUnionFind::new(&vec![1; n as usize], &vec![false; n as usize]);
    let merged = (1..n).into_par_iter().filter(|&u| uf.link(0, u)).count();
    assert_eq!(merged, n as usize - 1);
    assert_eq!(uf.num_distinct_sets(), 1);
    assert_eq!(uf.weight(n - 1), i64::from(n));
}

#[test]
fn cluster_pairs_respects_weight_and_degree_limits() {
    // Node 0 touches four edges, every other node at most two.
    let hg = Hypergraph::new(
        vec![1, 1, 1, 1, 2, 1],
        [vec![0, 1], vec![0, 2], vec![0, 3], vec![0, 4], vec![4, 5]]
            .into_iter()
            .map(|pins| (pins, 1))
            .collect(),
    )
    .expect("valid hypergraph");
    let clustering = cluster_pairs(&hg, &[(0, 1), (2, 3), (4, 5)], 2, 3);

    assert_eq!(clustering.num_clusters(), 4);
    assert_eq!(clustering.cluster_of(0), clustering.cluster_of(1));
    assert_eq!(clustering.cluster_of(2), clustering.cluster_of(3));
    assert_ne!(clustering.cluster_of(4), clustering.cluster_of(5));
    assert!(clustering.contains_special_vertex(clustering.cluster_of(0)));
    assert!(!clustering.contains_special_vertex(clustering.cluster_of(4)));
    let weights: Vec<i64> = (0..4).map(|c| clustering.cluster_weight(c)).collect();
    assert_eq!(weights, vec![2, 2, 2, 1]);
    assert_eq!(clustering.assignment(), &[0, 0, 1, 1, 2, 3]);
}

#[test]
fn two_special_clusters_are_never_joined() {
    let hg = Hypergraph::with_unit_weights(
        4,
        [vec![0, 1], vec![0, 2], vec![1, 2], vec![1, 3], vec![0, 3]],
    )
    .expect("valid hypergraph");
    // Nodes 0 and 1 have degree three.
    let clustering = cluster_pairs(&hg, &[(0, 1)], 10, 2);
    assert_eq!(clustering.num_clusters(), 4);
}
