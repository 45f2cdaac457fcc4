//! Decomposes a function body into a control flow graph by a linear walk of
//! the structured control flow. Expressions are streamed into the current
//! basic block in execution order; control constructs fork, join and retire
//! blocks as they go.

use ir::{ExprKind, Function, Name};
use petgraph::graph::NodeIndex;
use petgraph::visit::DfsPostOrder;

use super::ControlFlowGraph::{Branch, ControlFlowGraph};

pub struct ControlFlowAnalysisResult {
    pub cfg: ControlFlowGraph,
    /// Reverse-post-order position of each block, indexed by the block's
    /// graph index. Worklist analyses visit lower priorities first.
    pub node_priorities: Vec<usize>,
}

pub struct ControlFlowAnalysis<'a> {
    func: &'a Function,
    cfg: ControlFlowGraph,
    current: NodeIndex,
    /// Enclosing branch targets, innermost last. A block's target is its
    /// join point, a loop's target is its header.
    targets: Vec<(Name, NodeIndex)>,
}

impl<'a> ControlFlowAnalysis<'a> {
    pub fn analyze(func: &'a Function) -> ControlFlowAnalysisResult {
        let cfg = ControlFlowGraph::new();
        let entry = cfg.entry;
        let mut cfa = ControlFlowAnalysis {
            func,
            cfg,
            current: entry,
            targets: Vec::new(),
        };

        cfa.visit(func.body);
        let exit = cfa.cfg.exit;
        cfa.cfg.connect(cfa.current, Branch::Uncond, exit);
        debug_assert!(cfa.targets.is_empty());

        let node_priorities = compute_priorities(&cfa.cfg);
        ControlFlowAnalysisResult {
            cfg: cfa.cfg,
            node_priorities,
        }
    }

    fn append(&mut self, id: ir::ExprId) {
        self.cfg.graph[self.current].exprs.push(id);
    }

    fn target(&self, name: &Name) -> NodeIndex {
        self.targets
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, block)| *block)
            .expect("branch to unknown label")
    }

    fn visit(&mut self, id: ir::ExprId) {
        let func = self.func;
        match &func.expr(id).kind {
            ExprKind::Block { name, children } => {
                match name {
                    Some(name) => {
                        let join = self.cfg.add_block();
                        self.targets.push((name.clone(), join));
                        for &child in children {
                            self.visit(child);
                        }
                        self.targets.pop();
                        self.cfg.connect(self.current, Branch::Uncond, join);
                        self.current = join;
                    }
                    None => {
                        for &child in children {
                            self.visit(child);
                        }
                    }
                }
                self.append(id);
            }
            ExprKind::If {
                condition,
                if_true,
                if_false,
            } => {
                self.visit(*condition);
                let pre = self.current;

                let true_start = self.cfg.add_block();
                self.cfg.connect(pre, Branch::OnTrue, true_start);
                self.current = true_start;
                self.visit(*if_true);
                let true_end = self.current;

                let join = match if_false {
                    Some(if_false) => {
                        let false_start = self.cfg.add_block();
                        self.cfg.connect(pre, Branch::OnFalse, false_start);
                        self.current = false_start;
                        self.visit(*if_false);
                        let false_end = self.current;

                        let join = self.cfg.add_block();
                        self.cfg.connect(true_end, Branch::Uncond, join);
                        self.cfg.connect(false_end, Branch::Uncond, join);
                        join
                    }
                    None => {
                        let join = self.cfg.add_block();
                        self.cfg.connect(true_end, Branch::Uncond, join);
                        self.cfg.connect(pre, Branch::OnFalse, join);
                        join
                    }
                };
                self.current = join;
                self.append(id);
            }
            ExprKind::Loop { name, body } => {
                let header = self.cfg.add_block();
                self.cfg.connect(self.current, Branch::Uncond, header);
                self.current = header;
                if let Some(name) = name {
                    self.targets.push((name.clone(), header));
                }
                self.visit(*body);
                if name.is_some() {
                    self.targets.pop();
                }
                self.append(id);
            }
            ExprKind::Br { target, condition } => match condition {
                None => {
                    self.append(id);
                    let to = self.target(target);
                    self.cfg.connect(self.current, Branch::Uncond, to);
                    // Anything following is unreachable.
                    self.current = self.cfg.add_block();
                }
                Some(condition) => {
                    self.visit(*condition);
                    self.append(id);
                    let from = self.current;
                    let to = self.target(target);
                    self.cfg.connect(from, Branch::OnTrue, to);
                    let cont = self.cfg.add_block();
                    self.cfg.connect(from, Branch::OnFalse, cont);
                    self.current = cont;
                }
            },
            ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.visit(*value);
                }
                self.append(id);
                let exit = self.cfg.exit;
                self.cfg.connect(self.current, Branch::Uncond, exit);
                self.current = self.cfg.add_block();
            }
            ExprKind::Unreachable => {
                self.append(id);
                // A trap transfers control out without reaching the exit
                // block; nothing downstream executes.
                self.current = self.cfg.add_block();
            }
            kind => {
                kind.for_each_child(|child| self.visit(child));
                self.append(id);
            }
        }
    }
}

/// Reverse post order from the entry; blocks unreachable from the entry are
/// ordered after all reachable ones.
fn compute_priorities(cfg: &ControlFlowGraph) -> Vec<usize> {
    let mut order = Vec::with_capacity(cfg.num_blocks());
    let mut dfs = DfsPostOrder::new(&cfg.graph, cfg.entry);
    while let Some(node) = dfs.next(&cfg.graph) {
        order.push(node);
    }
    order.reverse();

    let mut priorities = vec![usize::MAX; cfg.num_blocks()];
    for (i, node) in order.iter().enumerate() {
        priorities[node.index()] = i;
    }
    let mut next = order.len();
    for priority in priorities.iter_mut() {
        if *priority == usize::MAX {
            *priority = next;
            next += 1;
        }
    }
    priorities
}
