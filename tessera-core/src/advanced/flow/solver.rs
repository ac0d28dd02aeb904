//! Maximum-flow solvers driven one augmentation at a time.

use std::collections::VecDeque;

use super::network::{Capacity, FlowNetwork};

/// Incremental maximum-flow algorithm.
///
/// The caller drives the solver step by step so it can stop a search that
/// runs out of time between two iterations.
pub trait FlowSolver {
    /// Performs one iteration and returns the flow it added; zero once the
    /// flow is maximum.
    fn advance(&mut self, network: &mut FlowNetwork) -> Capacity;
}

/// Edmonds-Karp: one shortest augmenting path per iteration.
#[derive(Debug, Default)]
pub struct EdmondsKarpSolver {
    parent_arc: Vec<Option<usize>>,
    queue: VecDeque<usize>,
}

impl FlowSolver for EdmondsKarpSolver {
    fn advance(&mut self, network: &mut FlowNetwork) -> Capacity {
        let (source, sink) = (network.source(), network.sink());
        self.parent_arc.clear();
        self.parent_arc.resize(network.num_nodes(), None);
        self.queue.clear();
        self.queue.push_back(source);

        let mut reached = false;
        'bfs: while let Some(v) = self.queue.pop_front() {
            for &a in network.out_arcs(v) {
                let head = network.head(a);
                if head == source || self.parent_arc[head].is_some() || network.residual(a) <= 0 {
                    continue;
                }
                self.parent_arc[head] = Some(a);
                if head == sink {
                    reached = true;
                    break 'bfs;
                }
                self.queue.push_back(head);
            }
        }
        if !reached {
            return 0;
        }

        let mut bottleneck = Capacity::MAX;
        let mut v = sink;
        while let Some(a) = self.parent_arc[v] {
            bottleneck = bottleneck.min(network.residual(a));
            v = network.head(a ^ 1);
        }
        let mut v = sink;
        while let Some(a) = self.parent_arc[v] {
            network.push(a, bottleneck);
            v = network.head(a ^ 1);
        }
        bottleneck
    }
}
