pub mod ControlFlowAnalysis;
pub mod ControlFlowGraph;
