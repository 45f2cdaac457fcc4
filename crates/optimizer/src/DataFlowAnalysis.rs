//! A small framework for forward dataflow analyses over the control flow
//! graph. An analysis supplies its lattice, the entry and initial-estimate
//! values, the per-block transfer function and the join; the framework finds
//! the maximum fixed point with a priority-ordered worklist.

use std::collections::BTreeSet;

use petgraph::graph::NodeIndex;

use crate::control_flow::ControlFlowGraph::ControlFlowGraph;


/// The maximum number of steps per individual CFG block before we assume the
/// analysis is divergent.
pub const MAX_STEPS_PER_NODE: usize = 20000;

pub trait DataFlowAnalysisInner {
    type Lattice: Clone + PartialEq;

    /// The incoming state of the entry block.
    fn entry_lattice(&mut self) -> Self::Lattice;

    /// The initial estimate at every other block, the bottom of the lattice.
    fn initial_estimate(&mut self) -> Self::Lattice;

    /// Computes the output state of a block from its input state.
    fn flow_through(&mut self, block: NodeIndex, input: &Self::Lattice) -> Self::Lattice;

    /// Merges `input` into `result` at a control flow join.
    fn join(&mut self, result: &mut Self::Lattice, input: &Self::Lattice);
}

/// The in and out states of a block.
#[derive(Debug)]
pub struct FlowState<L> {
    pub step_count: usize,
    pub in_: L,
    pub out: L,
}

pub struct DataFlowAnalysis<'a, I: DataFlowAnalysisInner> {
    pub inner: I,
    cfg: &'a ControlFlowGraph,
    work_queue: UniqueQueue<'a>,
    /// Block states, indexed by the block's graph index.
    pub states: Vec<FlowState<I::Lattice>>,
}

impl<'a, I: DataFlowAnalysisInner> DataFlowAnalysis<'a, I> {
    pub fn new(
        cfg: &'a ControlFlowGraph,
        node_priorities: &'a [usize],
        inner: I,
    ) -> DataFlowAnalysis<'a, I> {
        DataFlowAnalysis {
            inner,
            cfg,
            work_queue: UniqueQueue::new(node_priorities),
            states: Vec::new(),
        }
    }

    /// Finds the fixed point solution, leaving the per-block states in
    /// `states`.
    pub fn analyze(&mut self) {
        self.analyze_inner()
            .expect("dataflow analysis appears to diverge");
    }

    // Split from analyze so tests can verify that divergence is caught.
    fn analyze_inner(&mut self) -> Result<(), NodeIndex> {
        self.initialize();
        while let Some(block) = self.work_queue.pop() {
            let state = &mut self.states[block.index()];
            if state.step_count > MAX_STEPS_PER_NODE {
                return Err(block);
            }
            state.step_count += 1;

            self.join_inputs(block);
            if self.flow(block) {
                // The output changed; everything it flows into must be
                // recomputed.
                let exit = self.cfg.exit;
                for succ in self.cfg.successors(block) {
                    if succ != exit {
                        self.work_queue.push(succ);
                    }
                }
            }
        }
        self.join_inputs(self.cfg.exit);
        Ok(())
    }

    fn initialize(&mut self) {
        self.work_queue.clear();
        self.states.clear();
        for index in 0..self.cfg.num_blocks() {
            let state = FlowState {
                step_count: 0,
                in_: self.inner.initial_estimate(),
                out: self.inner.initial_estimate(),
            };
            self.states.push(state);
            let node = NodeIndex::new(index);
            if node != self.cfg.exit {
                self.work_queue.push(node);
            }
        }
    }

    /// Performs a single flow through a block. Returns whether the output
    /// state changed.
    fn flow(&mut self, block: NodeIndex) -> bool {
        let input = self.states[block.index()].in_.clone();
        let out = self.inner.flow_through(block, &input);
        let state = &mut self.states[block.index()];
        let changed = state.out != out;
        state.out = out;
        changed
    }

    /// Recomputes a block's input state by joining its predecessors'
    /// outputs.
    fn join_inputs(&mut self, block: NodeIndex) {
        if block == self.cfg.entry {
            self.states[block.index()].in_ = self.inner.entry_lattice();
            return;
        }

        let mut preds = self.cfg.predecessors(block);
        let first = match preds.next() {
            Some(p) => p,
            // No predecessors: the block is unreachable, leave the initial
            // estimate in place.
            None => return,
        };

        let mut result = self.states[first.index()].out.clone();
        for pred in preds {
            self.inner.join(&mut result, &self.states[pred.index()].out);
        }
        self.states[block.index()].in_ = result;
    }
}

#[derive(Debug, PartialEq, Eq)]
struct PrioritizedNode(usize, NodeIndex);

impl Ord for PrioritizedNode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

impl PartialOrd for PrioritizedNode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// The blocks awaiting recomputation, ordered by priority so that earlier
/// blocks flow before the blocks they feed.
#[derive(Debug)]
struct UniqueQueue<'a> {
    inner: BTreeSet<PrioritizedNode>,
    priorities: &'a [usize],
}

impl<'a> UniqueQueue<'a> {
    fn new(priorities: &'a [usize]) -> UniqueQueue<'a> {
        UniqueQueue {
            inner: BTreeSet::new(),
            priorities,
        }
    }

    fn pop(&mut self) -> Option<NodeIndex> {
        self.inner.pop_first().map(|p| p.1)
    }

    fn push(&mut self, node: NodeIndex) {
        self.inner
            .insert(PrioritizedNode(self.priorities[node.index()], node));
    }

    fn clear(&mut self) {
        self.inner.clear()
    }
}
