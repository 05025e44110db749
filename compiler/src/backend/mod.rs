//! Shared code-generation scaffolding used by both the CIL and JVM
//! emitters: label bookkeeping and the short-circuit boolean lowering
//! algorithm. Ported from `original_source/src/code/generation/common/
//! code_generator.py`'s `LabelProvider` base class and the
//! `BinOpNodeCodeGen.logical_expression_resolve` static method that
//! `msil_gen.py` and `jbc_gen.py` each carry a near-identical copy of —
//! collapsed here into one generic function plus a small trait each
//! backend implements for its own opcode table.

pub mod cil;
pub mod jvm;

use rusco_common::ast::{Node, NodeKind};
use rusco_common::types::{BaseType, BinOp};

/// Hands out label names for jump targets and for annotating the next
/// instruction emitted. Two kinds, mirroring `get_jump_label`/
/// `get_usual_label`: jump labels are always freshly minted, usual
/// labels are drawn from a LIFO stack of labels a caller pushed ahead of
/// time (`push_label`) so a jump target can land exactly on the next
/// instruction without a separate no-op.
pub trait LabelProvider {
    fn next_jump_label(&mut self) -> String;
    fn next_usual_label(&mut self) -> String;
    fn push_label(&mut self, label: String);
}

/// Whether the in-place comparison branch below should jump on the
/// *inverse* of the operator (polarity Negative, the common case: the
/// compiled condition falls through to "true") or on the operator
/// itself (Positive). Mirrors the source's `negative` kwarg, made
/// explicit as an enum rather than an `Option<bool>`-shaped flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Positive,
    Negative,
}

/// Per-emission state threaded through a function body's code
/// generation. `locals_offset` is JVM-only (the slot a parameter's
/// local-variable index is shifted by relative to its declared index,
/// always zero for CIL); carried on every backend's context regardless
/// so `logical_expression_resolve` stays backend-agnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmitCtx {
    pub locals_offset: usize,
}

/// What `logical_expression_resolve` needs from a concrete backend:
/// how to render one AST node as instructions, and how to spell a
/// comparison opcode and the two kinds of jump.
pub trait ConditionBackend {
    fn gen_node(&mut self, node: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String;
    /// The mnemonic for a *comparison* binary operator at the given
    /// operand base type (e.g. CIL's `bgt.s`, JVM's `if_icmpgt`/`ifgt`).
    fn compare_mnemonic(&self, op: BinOp, operand_base: BaseType) -> &'static str;
    /// Instructions to splice in after both operands are pushed but
    /// before `compare_mnemonic` runs — needed only when the operand
    /// type must be reduced to an int first (JVM string ordering via
    /// `String.compareTo`). Empty for everything else.
    fn comparison_infix(&self, op: BinOp, operand_base: BaseType) -> String {
        let _ = (op, operand_base);
        String::new()
    }
    fn conditional_jump(&self, mnemonic: &str, label: &str) -> String;
    fn unconditional_jump(&self, label: &str) -> String;
    fn usual_label_prefix(&self, labels: &mut dyn LabelProvider) -> String;
    /// Pushes a boolean constant — `ldc.i4.1`/`ldc.i4.0` for CIL,
    /// `iconst_1`/`iconst_0` for JVM.
    fn push_bool(&self, value: bool) -> String;
    /// Jumps to `label` when the value on top of the stack is falsy —
    /// CIL's `brfalse`, JVM's `ifeq`. Used for a bare boolean
    /// (identifier, call, literal) standing directly as a condition,
    /// where there is no comparison operator to invert.
    fn branch_if_false(&self, label: &str) -> String;
}

/// Materializes a comparison or logical expression as a `0`/`1` value on
/// the stack, for the (non-condition) contexts where a boolean is used
/// as an ordinary value rather than branched on directly — an
/// assignment's right-hand side, a call argument, and so on. The
/// original source's generic `BinOpNodeCodeGen.gen_code` keys its
/// opcode table by the comparison itself, which only makes sense when
/// the result is consumed by a branch; this is the value-producing
/// counterpart the statement-level emitters (`If`, `While`, `For`) skip
/// by calling `logical_expression_resolve` directly instead.
pub fn gen_condition_as_value<B: ConditionBackend>(
    backend: &mut B,
    labels: &mut dyn LabelProvider,
    ctx: EmitCtx,
    node: &Node,
) -> String {
    let true_label = labels.next_jump_label();
    let false_label = labels.next_jump_label();
    let end_label = labels.next_jump_label();

    let mut code = logical_expression_resolve(
        backend,
        labels,
        ctx,
        node,
        &false_label,
        &true_label,
        Polarity::Negative,
    );
    code.push('\n');

    labels.push_label(true_label);
    code.push_str(&format!(
        "\t{}: {}\n",
        backend.usual_label_prefix(labels),
        backend.push_bool(true)
    ));
    code.push_str(&backend.unconditional_jump(&end_label));
    code.push('\n');

    labels.push_label(false_label);
    code.push_str(&format!(
        "\t{}: {}\n",
        backend.usual_label_prefix(labels),
        backend.push_bool(false)
    ));

    labels.push_label(end_label);
    code
}

/// The operand base type a comparison's opcode table keys on: the type
/// of `left`/`right` themselves, not the `BOOL` result the comparison
/// produces (mirrors the source keying `msil_operators`/`jbc_operators`
/// by `node.node_type`, which for the source's ints/floats/strings is
/// how it distinguishes `bgt.s` from `ifgt`, etc — since every
/// comparison in this language yields `BOOL`, the operand type is the
/// only type information left to key on).
fn operand_base(node: &Node) -> BaseType {
    match &node.kind {
        NodeKind::BinaryOp { left, .. } => left.node_type.as_ref().and_then(|t| t.base()).unwrap_or(BaseType::Int),
        _ => node.node_type.as_ref().and_then(|t| t.base()).unwrap_or(BaseType::Int),
    }
}

/// Emits `node` (assumed boolean-valued) as a sequence of instructions
/// that falls through to `if_true` when it evaluates true and jumps to
/// `if_false` otherwise, recursively short-circuiting `И`/`ИЛИ`.
/// Faithful port of `BinOpNodeCodeGen.logical_expression_resolve`.
pub fn logical_expression_resolve<B: ConditionBackend>(
    backend: &mut B,
    labels: &mut dyn LabelProvider,
    ctx: EmitCtx,
    node: &Node,
    if_false: &str,
    if_true: &str,
    polarity: Polarity,
) -> String {
    let (op, left, right) = match &node.kind {
        NodeKind::BinaryOp { op, left, right } => (*op, left.as_ref(), right.as_ref()),
        _ => {
            // A bare boolean (identifier, call, literal) used directly as
            // a condition: compare it against nonzero the same way a
            // comparison operator's in-place branch does, by jumping on
            // its own truthiness.
            let mut code = backend.gen_node(node, labels, ctx);
            code.push('\n');
            code.push_str(&format!(
                "\t{}: {}\n",
                backend.usual_label_prefix(labels),
                backend.branch_if_false(if_false)
            ));
            code.push_str(&backend.unconditional_jump(if_true));
            return code;
        }
    };

    if !op.is_logical() {
        let base = operand_base(node);
        let mut code = String::new();
        if polarity == Polarity::Negative {
            let inv = op.inverse();
            code.push_str(&backend.gen_node(left, labels, ctx));
            code.push('\n');
            code.push_str(&backend.gen_node(right, labels, ctx));
            code.push('\n');
            let infix = backend.comparison_infix(inv, base);
            if !infix.is_empty() {
                code.push_str(&infix);
                code.push('\n');
            }
            let mnemonic = backend.compare_mnemonic(inv, base);
            code.push_str(&backend.conditional_jump(mnemonic, if_false));
            code.push('\n');
            code.push_str(&backend.unconditional_jump(if_true));
        } else {
            code.push_str(&backend.gen_node(left, labels, ctx));
            code.push('\n');
            code.push_str(&backend.gen_node(right, labels, ctx));
            code.push('\n');
            let infix = backend.comparison_infix(op, base);
            if !infix.is_empty() {
                code.push_str(&infix);
                code.push('\n');
            }
            let mnemonic = backend.compare_mnemonic(op, base);
            code.push_str(&backend.conditional_jump(mnemonic, if_true));
            code.push('\n');
            code.push_str(&backend.unconditional_jump(if_false));
        }
        return code;
    }

    match op {
        BinOp::Or => {
            let second_arg_label = labels.next_jump_label();
            let mut code = logical_expression_resolve(
                backend,
                labels,
                ctx,
                left,
                &second_arg_label,
                if_true,
                Polarity::Positive,
            );
            code.push('\n');
            labels.push_label(second_arg_label);
            code.push_str(&logical_expression_resolve(
                backend,
                labels,
                ctx,
                right,
                if_false,
                if_true,
                Polarity::Positive,
            ));
            code
        }
        BinOp::And => {
            let second_arg_label = labels.next_jump_label();
            let mut code = logical_expression_resolve(
                backend,
                labels,
                ctx,
                left,
                if_false,
                &second_arg_label,
                Polarity::Positive,
            );
            code.push('\n');
            labels.push_label(second_arg_label);
            code.push_str(&logical_expression_resolve(
                backend,
                labels,
                ctx,
                right,
                if_false,
                if_true,
                Polarity::Positive,
            ));
            code
        }
        _ => unreachable!("is_logical() only returns true for And/Or"),
    }
}
