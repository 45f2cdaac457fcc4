//! The control flow graph: basic blocks of expressions in execution order,
//! connected by branch edges, with a distinguished entry and exit. The exit
//! represents control having left the function.

use ir::ExprId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::EdgeDirection::{Incoming, Outgoing};

/// The edge object for the control flow graph.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Branch {
    /// Edge is taken if the condition is true.
    OnTrue,
    /// Edge is taken if the condition is false.
    OnFalse,
    /// Unconditional branch.
    Uncond,
}

/// The expressions executed in a basic block, children before parents.
#[derive(Debug, Default)]
pub struct BasicBlock {
    pub exprs: Vec<ExprId>,
}

#[derive(Debug)]
pub struct ControlFlowGraph {
    pub graph: DiGraph<BasicBlock, Branch>,
    pub entry: NodeIndex,
    pub exit: NodeIndex,
}

impl ControlFlowGraph {
    pub fn new() -> ControlFlowGraph {
        let mut graph = DiGraph::new();
        let exit = graph.add_node(BasicBlock::default());
        let entry = graph.add_node(BasicBlock::default());
        ControlFlowGraph { graph, entry, exit }
    }

    pub fn add_block(&mut self) -> NodeIndex {
        self.graph.add_node(BasicBlock::default())
    }

    pub fn block(&self, node: NodeIndex) -> &BasicBlock {
        &self.graph[node]
    }

    fn is_connected(&self, from: NodeIndex, branch: Branch, to: NodeIndex) -> bool {
        self.graph
            .edges_connecting(from, to)
            .any(|e| *e.weight() == branch)
    }

    /// Connects two blocks, unless an identical edge already exists.
    pub fn connect(&mut self, from: NodeIndex, branch: Branch, to: NodeIndex) {
        if !self.is_connected(from, branch, to) {
            self.graph.add_edge(from, to, branch);
        }
    }

    pub fn successors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Outgoing)
    }

    pub fn predecessors(&self, node: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(node, Incoming)
    }

    pub fn num_blocks(&self) -> usize {
        self.graph.node_count()
    }
}
