//! The constant evaluator: a small partial interpreter over `Literal`
//! and `BinaryOp` nodes, invoked by the analyzer before it processes an
//! assignment's right-hand side. Ported from
//! `original_source/src/semantic/node_calc.py`'s `NodeCalc`/`DefaultCalc`/
//! `LiteralNodeCalc`/`BinOpNodeCalc` registry as a single recursive
//! function with an exhaustive match, per the sum-type re-architecture
//! `SPEC_FULL.md` §9 calls for.
//!
//! The original's `DIV` branch performs addition instead of division —
//! a transcription bug in the distilled source (`SPEC_FULL.md` §9.1).
//! This implementation performs real division: integer division when
//! both operands are integers (so the fold is type-preserving and the
//! later type check the analyzer performs on the folded literal still
//! succeeds), float division otherwise.

use rusco_common::ast::{Literal, Node, NodeKind};
use rusco_common::types::BinOp;

/// Attempts to fold `node` to a literal value. Returns `None` (never an
/// error) on anything it doesn't understand — folding is best-effort and
/// failure leaves the original expression in place.
pub fn try_calc(node: &Node) -> Option<Literal> {
    match &node.kind {
        NodeKind::Literal(value) => Some(value.clone()),
        NodeKind::BinaryOp { op, left, right } => calc_binary_op(*op, left, right),
        _ => None,
    }
}

fn calc_binary_op(op: BinOp, left: &Node, right: &Node) -> Option<Literal> {
    if !matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div) {
        return None;
    }
    let lhs = try_calc(left)?;
    let rhs = try_calc(right)?;
    match (lhs, rhs) {
        (Literal::Int(a), Literal::Int(b)) => match op {
            BinOp::Add => Some(Literal::Int(a + b)),
            BinOp::Sub => Some(Literal::Int(a - b)),
            BinOp::Mul => Some(Literal::Int(a * b)),
            BinOp::Div => (b != 0).then(|| Literal::Int(a / b)),
            _ => unreachable!(),
        },
        (Literal::Float(a), Literal::Float(b)) => match op {
            BinOp::Add => Some(Literal::Float(a + b)),
            BinOp::Sub => Some(Literal::Float(a - b)),
            BinOp::Mul => Some(Literal::Float(a * b)),
            BinOp::Div => (b != 0.0).then(|| Literal::Float(a / b)),
            _ => unreachable!(),
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusco_common::span::Span;

    fn lit(value: Literal) -> Node {
        Node::new(Span::default(), NodeKind::Literal(value))
    }

    fn bin(op: BinOp, left: Node, right: Node) -> Node {
        Node::new(
            Span::default(),
            NodeKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
        )
    }

    #[test]
    fn folds_arithmetic_expression() {
        // 2 + 3 * 4
        let expr = bin(
            BinOp::Add,
            lit(Literal::Int(2)),
            bin(BinOp::Mul, lit(Literal::Int(3)), lit(Literal::Int(4))),
        );
        assert_eq!(try_calc(&expr), Some(Literal::Int(14)));
    }

    #[test]
    fn folds_subtraction() {
        let expr = bin(BinOp::Sub, lit(Literal::Int(10)), lit(Literal::Int(2)));
        assert_eq!(try_calc(&expr), Some(Literal::Int(8)));
    }

    #[test]
    fn division_by_zero_does_not_fold() {
        let expr = bin(BinOp::Div, lit(Literal::Int(10)), lit(Literal::Int(0)));
        assert_eq!(try_calc(&expr), None);
    }

    #[test]
    fn mismatched_operand_types_do_not_fold() {
        let expr = bin(BinOp::Add, lit(Literal::Int(1)), lit(Literal::Float(2.0)));
        assert_eq!(try_calc(&expr), None);
    }
}
