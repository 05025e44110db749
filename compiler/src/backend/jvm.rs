//! JVM (Jasmin-syntax `.j`) code generation. Ported from
//! `original_source/src/code/generation/jbc/jbc_gen.py`'s per-class
//! handler set and `JBCLabelProvider`. Structurally a sibling of
//! `backend::cil`: same AST walk, different opcode vocabulary and the
//! addition of `locals_offset` (JVM locals and arguments share one
//! numbered slot space, so a function's locals start numbered after its
//! parameters rather than from zero).

use rusco_common::ast::{Literal, Node, NodeKind};
use rusco_common::scope::{IdentDesc, ScopeArena, ScopeId, ScopeKind};
use rusco_common::types::{BaseType, BinOp, TypeDesc};

use super::{gen_condition_as_value, ConditionBackend, EmitCtx, LabelProvider};

fn jvm_type(ty: &TypeDesc) -> &'static str {
    match ty.base() {
        Some(BaseType::Int) | Some(BaseType::Bool) => "I",
        Some(BaseType::Float) => "F",
        Some(BaseType::Str) => "Ljava/lang/String;",
        Some(BaseType::Void) | None => "V",
    }
}

/// `i`/`f` prefix used for the `Xload`/`Xstore`/`Xreturn`/`Xadd` family.
fn jvm_prefix(ty: &TypeDesc) -> &'static str {
    match ty.base() {
        Some(BaseType::Float) => "f",
        _ => "i",
    }
}

fn method_descriptor(params: &[TypeDesc], return_type: &TypeDesc) -> String {
    let params_desc: String = params.iter().map(|p| jvm_type(p)).collect();
    format!("({params_desc}){}", jvm_type(return_type))
}

fn arithmetic_mnemonic(op: BinOp, prefix: &str) -> String {
    let op_name = match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "rem",
        BinOp::BitAnd => "and",
        BinOp::BitOr => "or",
        other => unreachable!("{other:?} is not an arithmetic opcode"),
    };
    format!("{prefix}{op_name}")
}

#[derive(Default)]
pub struct JvmLabels {
    counter: u64,
    pushed: Vec<String>,
}

impl LabelProvider for JvmLabels {
    fn next_jump_label(&mut self) -> String {
        let label = format!("jp_{}", self.counter);
        self.counter += 1;
        label
    }

    fn next_usual_label(&mut self) -> String {
        if let Some(label) = self.pushed.pop() {
            return label;
        }
        let label = format!("il_{}", self.counter);
        self.counter += 1;
        label
    }

    fn push_label(&mut self, label: String) {
        self.pushed.push(label);
    }
}

pub struct JvmBackend<'a> {
    arena: &'a ScopeArena,
    class_name: String,
}

impl<'a> JvmBackend<'a> {
    pub fn new(arena: &'a ScopeArena, class_name: &str) -> Self {
        JvmBackend {
            arena,
            class_name: class_name.to_string(),
        }
    }

    fn gen_stmt_list(&mut self, statements: &[Node], labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        statements
            .iter()
            .map(|s| self.gen(s, labels, ctx))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn gen(&mut self, node: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        match &node.kind {
            NodeKind::Literal(lit) => match lit {
                Literal::Int(v) => format!("\t{}: ldc {v}", labels.next_usual_label()),
                Literal::Float(v) => format!("\t{}: ldc {v}", labels.next_usual_label()),
                Literal::Bool(v) => format!(
                    "\t{}: iconst_{}",
                    labels.next_usual_label(),
                    if *v { 1 } else { 0 }
                ),
                Literal::Str(s) => format!("\t{}: ldc \"{s}\"", labels.next_usual_label()),
            },

            NodeKind::Identifier { ident, .. } => {
                let ident = ident.as_ref().expect("resolved during analysis");
                self.gen_ident_load(ident, ctx)
            }

            NodeKind::Assign { target, value } => {
                let mut code = self.gen(value, labels, ctx);
                code.push('\n');
                let NodeKind::Identifier { ident, .. } = &target.kind else {
                    unreachable!("assignment target is always an identifier");
                };
                let ident = ident.as_ref().expect("resolved during analysis");
                code.push_str(&self.gen_ident_store(ident, ctx));
                code
            }

            NodeKind::BinaryOp { op, .. } if op.is_comparison() || op.is_logical() => {
                gen_condition_as_value(self, labels, ctx, node)
            }

            NodeKind::BinaryOp { op, left, right } if *op == BinOp::Add && left.node_type == Some(TypeDesc::STR) => {
                let mut code = self.gen(left, labels, ctx);
                code.push('\n');
                code.push_str(&self.gen(right, labels, ctx));
                code.push('\n');
                code.push_str(&format!(
                    "\t{}: invokevirtual java/lang/String/concat(Ljava/lang/String;)Ljava/lang/String;",
                    labels.next_usual_label()
                ));
                code
            }

            NodeKind::BinaryOp { op, left, right } => {
                let mut code = self.gen(left, labels, ctx);
                code.push('\n');
                code.push_str(&self.gen(right, labels, ctx));
                code.push('\n');
                let prefix = jvm_prefix(node.node_type.as_ref().unwrap_or(&TypeDesc::INT));
                code.push_str(&format!(
                    "\t{}: {}",
                    labels.next_usual_label(),
                    arithmetic_mnemonic(*op, prefix)
                ));
                code
            }

            NodeKind::TypeConvert { inner, target } => {
                let from_prefix = jvm_prefix(inner.node_type.as_ref().unwrap_or(&TypeDesc::INT));
                let mut code = self.gen(inner, labels, ctx);
                code.push('\n');
                code.push_str(&format!(
                    "\t{}: {from_prefix}2{}",
                    labels.next_usual_label(),
                    jvm_prefix(target)
                ));
                code
            }

            NodeKind::Call { callee, ident, args } => {
                let ident = ident.as_ref().expect("resolved during analysis");
                let mut code = args
                    .iter()
                    .map(|a| self.gen(a, labels, ctx))
                    .collect::<Vec<_>>()
                    .join("\n");
                if !args.is_empty() {
                    code.push('\n');
                }
                let (return_type, params) = match &ident.ty {
                    TypeDesc::Func { return_type, params } => (return_type.as_ref(), params.as_slice()),
                    _ => unreachable!(),
                };
                if ident.built_in {
                    code.push_str(&format!(
                        "\t{}: getstatic java/lang/System/out Ljava/io/PrintStream;\n",
                        labels.next_usual_label()
                    ));
                    // Mirrors the source's fixed built-in table: only
                    // `вывод_перенос` (println) adds a trailing newline.
                    let method = if callee == "вывод_перенос" { "println" } else { "print" };
                    code.push_str(&format!(
                        "\t{}: invokevirtual java/io/PrintStream/{method}({})V",
                        labels.next_usual_label(),
                        jvm_type(&params[0])
                    ));
                } else {
                    code.push_str(&format!(
                        "\t{}: invokestatic {}/func_{}({})",
                        labels.next_usual_label(),
                        self.class_name,
                        ident.index,
                        method_descriptor(params, return_type)
                    ));
                }
                code
            }

            NodeKind::VariableDefinition { entries, .. } => entries
                .iter()
                .filter(|e| matches!(e.kind, NodeKind::Assign { .. }))
                .map(|e| self.gen(e, labels, ctx))
                .collect::<Vec<_>>()
                .join("\n"),

            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.gen_if(cond, then_branch, else_branch.as_deref(), labels, ctx),

            NodeKind::While { cond, body } => self.gen_pretest_loop(cond, body, labels, ctx),

            NodeKind::DoWhile { cond, body } => self.gen_posttest_loop(cond, body, labels, ctx),

            NodeKind::For { init, cond, step, body } => self.gen_for(init, cond, step, body, labels, ctx),

            NodeKind::Return { expr } => {
                if expr.is_empty() {
                    format!("\t{}: return", labels.next_usual_label())
                } else {
                    let prefix = jvm_prefix(expr.node_type.as_ref().unwrap_or(&TypeDesc::INT));
                    let mut code = self.gen(expr, labels, ctx);
                    code.push('\n');
                    code.push_str(&format!("\t{}: {prefix}return", labels.next_usual_label()));
                    code
                }
            }

            NodeKind::StatementList { statements, .. } => self.gen_stmt_list(statements, labels, ctx),

            NodeKind::Param { .. } | NodeKind::FunctionDefinition { .. } | NodeKind::FunctionDeclaration { .. } => {
                String::new()
            }

            NodeKind::Empty => String::new(),
        }
    }

    fn gen_ident_load(&self, ident: &IdentDesc, ctx: EmitCtx) -> String {
        let prefix = jvm_prefix(&ident.ty);
        let slot = self.slot(ident, ctx);
        format!("\t{prefix}load\t{slot}")
    }

    fn gen_ident_store(&self, ident: &IdentDesc, ctx: EmitCtx) -> String {
        let prefix = jvm_prefix(&ident.ty);
        let slot = self.slot(ident, ctx);
        format!("\t{prefix}store\t{slot}")
    }

    /// Parameters occupy slots `0..n`; locals are shifted by
    /// `ctx.locals_offset` (the parameter count) to sit right after
    /// them, matching `jbc_gen.py`'s `node_ident.index + locals_offset`.
    fn slot(&self, ident: &IdentDesc, ctx: EmitCtx) -> usize {
        match ident.kind {
            ScopeKind::Param => ident.index,
            _ => ident.index + ctx.locals_offset,
        }
    }

    fn gen_if(
        &mut self,
        cond: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
        labels: &mut dyn LabelProvider,
        ctx: EmitCtx,
    ) -> String {
        let if_false = labels.next_jump_label();
        let if_true = labels.next_jump_label();

        let mut code = super::logical_expression_resolve(
            self,
            labels,
            ctx,
            cond,
            &if_false,
            &if_true,
            super::Polarity::Negative,
        );
        code.push('\n');

        labels.push_label(if_true);
        code.push_str(&self.gen(then_branch, labels, ctx));

        match else_branch {
            None => {
                code.push('\n');
                labels.push_label(if_false);
            }
            Some(else_branch) => {
                let next = labels.next_jump_label();
                code.push('\n');
                code.push_str(&format!("\t{}: goto {next}", labels.next_usual_label()));
                code.push('\n');
                labels.push_label(if_false);
                code.push_str(&self.gen(else_branch, labels, ctx));
                code.push('\n');
                labels.push_label(next);
            }
        }
        code
    }

    fn gen_pretest_loop(&mut self, cond: &Node, body: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        let check = labels.next_jump_label();
        let body_label = labels.next_jump_label();
        let next = labels.next_jump_label();

        let mut code = format!("\t{}: goto {check}", labels.next_usual_label());
        code.push('\n');

        labels.push_label(body_label.clone());
        code.push_str(&self.gen(body, labels, ctx));
        code.push('\n');

        labels.push_label(check);
        code.push_str(&super::logical_expression_resolve(
            self,
            labels,
            ctx,
            cond,
            &next,
            &body_label,
            super::Polarity::Negative,
        ));
        code.push('\n');
        labels.push_label(next);
        code
    }

    fn gen_posttest_loop(&mut self, cond: &Node, body: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        let body_label = labels.next_jump_label();
        let next = labels.next_jump_label();

        labels.push_label(body_label.clone());
        let mut code = self.gen(body, labels, ctx);
        code.push('\n');

        code.push_str(&super::logical_expression_resolve(
            self,
            labels,
            ctx,
            cond,
            &next,
            &body_label,
            super::Polarity::Negative,
        ));
        code.push('\n');
        labels.push_label(next);
        code
    }

    fn gen_for(
        &mut self,
        init: &Node,
        cond: &Node,
        step: &Node,
        body: &Node,
        labels: &mut dyn LabelProvider,
        ctx: EmitCtx,
    ) -> String {
        let check = labels.next_jump_label();
        let body_label = labels.next_jump_label();
        let next = labels.next_jump_label();

        let mut code = self.gen(init, labels, ctx);
        code.push('\n');
        code.push_str(&format!("\t{}: goto {check}", labels.next_usual_label()));
        code.push('\n');

        labels.push_label(body_label.clone());
        code.push_str(&self.gen(body, labels, ctx));
        code.push('\n');
        code.push_str(&self.gen(step, labels, ctx));
        code.push('\n');

        labels.push_label(check);
        code.push_str(&super::logical_expression_resolve(
            self,
            labels,
            ctx,
            cond,
            &next,
            &body_label,
            super::Polarity::Negative,
        ));
        code.push('\n');
        labels.push_label(next);
        code
    }

    fn gen_function(&mut self, node: &Node, func_scope: ScopeId) -> String {
        let NodeKind::FunctionDefinition {
            return_type,
            name,
            params,
            body,
            ident,
        } = &node.kind
        else {
            unreachable!("gen_function is only called on FunctionDefinition nodes");
        };

        let is_main = name == "главный";
        let method_name = if is_main {
            "main".to_string()
        } else {
            let ident = ident.as_ref().expect("resolved during analysis");
            format!("func_{}", ident.index)
        };

        let param_types: Vec<TypeDesc> = params
            .iter()
            .map(|p| {
                let NodeKind::Param { ty, .. } = &p.kind else { unreachable!() };
                ty.clone()
            })
            .collect();

        let descriptor = if is_main {
            "([Ljava/lang/String;)V".to_string()
        } else {
            method_descriptor(&param_types, return_type)
        };

        let ctx = EmitCtx {
            locals_offset: if is_main { 1 } else { params.len() },
        };
        let locals = self.arena.locals_of(func_scope);
        let max_locals = ctx.locals_offset + locals.len() + 1;

        let mut labels = JvmLabels::default();
        let body_code = self.gen(body, &mut labels, ctx);

        format!(
            ".method public static {method_name}{descriptor}\n\t.limit stack 32\n\t.limit locals {max_locals}\n{body_code}\n\treturn\n.end method\n"
        )
    }
}

impl<'a> ConditionBackend for JvmBackend<'a> {
    fn gen_node(&mut self, node: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        self.gen(node, labels, ctx)
    }

    fn compare_mnemonic(&self, op: BinOp, base: BaseType) -> &'static str {
        match (op, base) {
            (BinOp::Ge, BaseType::Float) => "ifge",
            (BinOp::Gt, BaseType::Float) => "ifgt",
            (BinOp::Le, BaseType::Float) => "ifle",
            (BinOp::Lt, BaseType::Float) => "iflt",
            (BinOp::Eq, BaseType::Float) => "ifeq",
            (BinOp::Neq, BaseType::Float) => "ifne",
            // Object references, not ints: identity comparison only.
            (BinOp::Eq, BaseType::Str) => "if_acmpeq",
            (BinOp::Neq, BaseType::Str) => "if_acmpne",
            // Ordering on strings is reduced to an int by `comparison_infix`
            // (`String.compareTo`) before this mnemonic runs, so it reuses
            // the single-operand, compare-against-zero family Float uses.
            (BinOp::Ge, BaseType::Str) => "ifge",
            (BinOp::Gt, BaseType::Str) => "ifgt",
            (BinOp::Le, BaseType::Str) => "ifle",
            (BinOp::Lt, BaseType::Str) => "iflt",
            (BinOp::Ge, _) => "if_icmpge",
            (BinOp::Gt, _) => "if_icmpgt",
            (BinOp::Le, _) => "if_icmple",
            (BinOp::Lt, _) => "if_icmplt",
            (BinOp::Eq, _) => "if_icmpeq",
            (BinOp::Neq, _) => "if_icmpne",
            other => unreachable!("{other:?} is not a comparison"),
        }
    }

    fn comparison_infix(&self, op: BinOp, base: BaseType) -> String {
        if base == BaseType::Str && matches!(op, BinOp::Ge | BinOp::Gt | BinOp::Le | BinOp::Lt) {
            "\tinvokevirtual java/lang/String/compareTo(Ljava/lang/String;)I".to_string()
        } else {
            String::new()
        }
    }

    fn conditional_jump(&self, mnemonic: &str, label: &str) -> String {
        format!("\t{mnemonic} {label}")
    }

    fn unconditional_jump(&self, label: &str) -> String {
        format!("\tgoto {label}")
    }

    fn usual_label_prefix(&self, labels: &mut dyn LabelProvider) -> String {
        labels.next_usual_label()
    }

    fn push_bool(&self, value: bool) -> String {
        format!("iconst_{}", if value { 1 } else { 0 })
    }

    fn branch_if_false(&self, label: &str) -> String {
        format!("ifeq {label}")
    }
}

/// Emits a full Jasmin `.j` source file. `class_name` becomes both the
/// `.class` name and the `invokestatic` target for user-defined calls.
pub fn generate(
    program: &Node,
    arena: &ScopeArena,
    func_scopes: &std::collections::HashMap<String, ScopeId>,
    class_name: &str,
) -> String {
    let NodeKind::StatementList { statements, .. } = &program.kind else {
        unreachable!("program root is always a StatementList");
    };

    let mut backend = JvmBackend::new(arena, class_name);

    let methods: Vec<String> = statements
        .iter()
        .filter(|s| matches!(s.kind, NodeKind::FunctionDefinition { .. }))
        .map(|f| {
            let NodeKind::FunctionDefinition { name, .. } = &f.kind else {
                unreachable!()
            };
            let func_scope = *func_scopes
                .get(name)
                .expect("every analyzed FunctionDefinition has a recorded body scope");
            backend.gen_function(f, func_scope)
        })
        .collect();

    format!(
        ".class public {class_name}\n.super java/lang/Object\n\n.method public <init>()V\n\taload_0\n\tinvokespecial java/lang/Object/<init>()V\n\treturn\n.end method\n\n{}\n",
        methods.join("\n")
    )
}
