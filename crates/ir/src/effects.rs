//! Shallow effect analysis. [`EffectAnalyzer::visit`] reports the effects of
//! a single node, not including its children; block-level analyses process
//! expressions in linear order and have already seen the children.

use bitflags::bitflags;

use crate::expr::ExprKind;

bitflags! {
    pub struct Effects: u8 {
        const READS_MEMORY = 1 << 0;
        const WRITES_MEMORY = 1 << 1;
        const READS_HEAP = 1 << 2;
        const WRITES_HEAP = 1 << 3;
        const CALLS = 1 << 4;
        const THROWS = 1 << 5;
        const TRAP = 1 << 6;
    }
}

impl Effects {
    pub fn reads_memory(self) -> bool {
        self.contains(Effects::READS_MEMORY)
    }

    pub fn writes_memory(self) -> bool {
        self.contains(Effects::WRITES_MEMORY)
    }

    pub fn reads_heap(self) -> bool {
        self.contains(Effects::READS_HEAP)
    }

    pub fn writes_heap(self) -> bool {
        self.contains(Effects::WRITES_HEAP)
    }
}

#[derive(Copy, Clone)]
pub struct EffectAnalyzer {
    /// Treat out-of-bounds and null-dereference traps as never happening.
    /// Memory and heap accesses otherwise carry a trap effect, which makes
    /// any analysis that stops at possible traps give up at every access.
    ignore_implicit_traps: bool,
}

impl EffectAnalyzer {
    pub fn new(ignore_implicit_traps: bool) -> EffectAnalyzer {
        EffectAnalyzer {
            ignore_implicit_traps,
        }
    }

    fn implicit_trap(&self) -> Effects {
        if self.ignore_implicit_traps {
            Effects::empty()
        } else {
            Effects::TRAP
        }
    }

    pub fn visit(&self, kind: &ExprKind) -> Effects {
        match kind {
            ExprKind::Load { .. } => Effects::READS_MEMORY | self.implicit_trap(),
            ExprKind::Store { .. } => Effects::WRITES_MEMORY | self.implicit_trap(),
            ExprKind::StructGet { .. } => Effects::READS_HEAP | self.implicit_trap(),
            ExprKind::StructSet { .. } => Effects::WRITES_HEAP | self.implicit_trap(),
            ExprKind::Call { .. } => Effects::CALLS | Effects::THROWS,
            ExprKind::Unreachable => Effects::TRAP,
            _ => Effects::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ExprId;

    #[test]
    fn implicit_traps_are_optional() {
        let ptr = ExprId::from_index(0);
        let load = ExprKind::Load {
            ptr,
            offset: 0,
            bytes: 4,
            atomic: false,
        };
        let strict = EffectAnalyzer::new(false).visit(&load);
        assert!(strict.reads_memory() && strict.contains(Effects::TRAP));
        let relaxed = EffectAnalyzer::new(true).visit(&load);
        assert!(relaxed.reads_memory() && !relaxed.contains(Effects::TRAP));
    }

    #[test]
    fn calls_and_unreachable() {
        let analyzer = EffectAnalyzer::new(true);
        let call = ExprKind::Call {
            target: "f".into(),
            operands: vec![],
        };
        assert!(analyzer.visit(&call).contains(Effects::CALLS));
        assert!(analyzer.visit(&ExprKind::Unreachable).contains(Effects::TRAP));
        assert!(analyzer.visit(&ExprKind::Nop).is_empty());
    }
}
