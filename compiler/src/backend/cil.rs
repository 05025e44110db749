//! CIL (`ilasm`-syntax `.il`) code generation. Ported from
//! `original_source/src/code/generation/msil/msil_gen.py`'s per-class
//! handler set and `MSILLabelProvider`, collapsed into one exhaustive
//! match over `NodeKind` plus the shared `backend::ConditionBackend`
//! implementation for short-circuit conditions.

use rusco_common::ast::{Literal, Node, NodeKind};
use rusco_common::scope::{IdentDesc, ScopeArena, ScopeId, ScopeKind};
use rusco_common::types::{BaseType, BinOp, TypeDesc};

use super::{gen_condition_as_value, ConditionBackend, EmitCtx, LabelProvider};

const BUILT_IN_WRITE: &str = "[mscorlib]System.Console::Write";
const BUILT_IN_WRITE_LINE: &str = "[mscorlib]System.Console::WriteLine";

fn built_in_target(name: &str) -> &'static str {
    match name {
        "вывод" => BUILT_IN_WRITE,
        _ => BUILT_IN_WRITE_LINE,
    }
}

fn cil_type(ty: &TypeDesc) -> &'static str {
    match ty.base() {
        Some(BaseType::Int) => "int32",
        Some(BaseType::Float) => "float64",
        Some(BaseType::Bool) => "bool",
        Some(BaseType::Str) => "string",
        Some(BaseType::Void) | None => "void",
    }
}

fn cil_conv(ty: &TypeDesc) -> &'static str {
    match ty.base() {
        Some(BaseType::Float) => "r8",
        Some(BaseType::Str) => "object",
        _ => "i4",
    }
}

fn arithmetic_mnemonic(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "rem",
        BinOp::BitAnd => "and",
        BinOp::BitOr => "or",
        other => unreachable!("{other:?} is not an arithmetic opcode"),
    }
}

/// Hands out `IL_XXXX`/`JP_XXXX` labels, hex-padded as the source's
/// `MSILLabelProvider` does.
#[derive(Default)]
pub struct CilLabels {
    counter: u64,
    pushed: Vec<String>,
}

impl LabelProvider for CilLabels {
    fn next_jump_label(&mut self) -> String {
        let label = format!("JP_{:04X}", self.counter);
        self.counter += 1;
        label
    }

    fn next_usual_label(&mut self) -> String {
        if let Some(label) = self.pushed.pop() {
            return label;
        }
        let label = format!("IL_{:04X}", self.counter);
        self.counter += 1;
        label
    }

    fn push_label(&mut self, label: String) {
        self.pushed.push(label);
    }
}

pub struct CilBackend<'a> {
    arena: &'a ScopeArena,
}

impl<'a> CilBackend<'a> {
    pub fn new(arena: &'a ScopeArena) -> Self {
        CilBackend { arena }
    }

    fn label(&self, labels: &mut dyn LabelProvider) -> String {
        labels.next_usual_label()
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
                Literal::Int(v) => format!("\t{}: ldc.i4 {v}", self.label(labels)),
                Literal::Float(v) => format!("\t{}: ldc.r8 {v}", self.label(labels)),
                Literal::Bool(v) => format!(
                    "\t{}: ldc.i4.{}",
                    self.label(labels),
                    if *v { 1 } else { 0 }
                ),
                Literal::Str(s) => {
                    let bytes: Vec<String> = s.as_bytes().iter().map(|b| format!("{b:02X}")).collect();
                    format!("\t{}: ldstr bytearray ({} )", self.label(labels), bytes.join(" "))
                }
            },

            NodeKind::Identifier { ident, .. } => {
                let ident = ident.as_ref().expect("resolved during analysis");
                self.gen_ident_load(ident)
            }

            NodeKind::Assign { target, value } => {
                let mut code = self.gen(value, labels, ctx);
                code.push('\n');
                let NodeKind::Identifier { ident, .. } = &target.kind else {
                    unreachable!("assignment target is always an identifier");
                };
                let ident = ident.as_ref().expect("resolved during analysis");
                code.push_str(&self.gen_ident_store(ident));
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
                    "\t{}: call string [mscorlib]System.String::Concat(string, string)",
                    self.label(labels)
                ));
                code
            }

            NodeKind::BinaryOp { op, left, right } => {
                let mut code = self.gen(left, labels, ctx);
                code.push('\n');
                code.push_str(&self.gen(right, labels, ctx));
                code.push('\n');
                code.push_str(&format!("\t{}: {}", self.label(labels), arithmetic_mnemonic(*op)));
                code
            }

            NodeKind::TypeConvert { inner, target } => {
                let mut code = self.gen(inner, labels, ctx);
                code.push('\n');
                code.push_str(&format!("\t{}: conv.{}", self.label(labels), cil_conv(target)));
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
                let param_types: Vec<&str> = match &ident.ty {
                    TypeDesc::Func { params, .. } => params.iter().map(|p| cil_type(p)).collect(),
                    _ => unreachable!(),
                };
                let return_type = cil_type(node.node_type.as_ref().unwrap_or(&TypeDesc::VOID));
                if ident.built_in {
                    code.push_str(&format!(
                        "\t{}: call {return_type} {}({})",
                        self.label(labels),
                        built_in_target(callee),
                        param_types.join(",")
                    ));
                } else {
                    code.push_str(&format!(
                        "\t{}: call {return_type} Program::func_{}({})",
                        self.label(labels),
                        ident.index,
                        param_types.join(",")
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
                    format!("\t{}: ret", self.label(labels))
                } else {
                    let mut code = self.gen(expr, labels, ctx);
                    code.push('\n');
                    code.push_str(&format!("\t{}: ret", self.label(labels)));
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

    fn gen_ident_load(&self, ident: &IdentDesc) -> String {
        match ident.kind {
            ScopeKind::Param => format!("\tldarg.s {}", ident.index),
            _ => format!("\tldloc.s {}", ident.index),
        }
    }

    fn gen_ident_store(&self, ident: &IdentDesc) -> String {
        match ident.kind {
            ScopeKind::Param => format!("\tstarg.s {}", ident.index),
            _ => format!("\tstloc.s {}", ident.index),
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
                code.push_str(&format!("\t{}: br.s {next}", self.label(labels)));
                code.push('\n');
                labels.push_label(if_false);
                code.push_str(&self.gen(else_branch, labels, ctx));
                code.push('\n');
                labels.push_label(next);
            }
        }
        code
    }

    /// `while (cond) body` — tests before every iteration, mirroring the
    /// `for` loop's own check-then-branch shape from the source (`while`
    /// has no source counterpart; this generalizes `ForNodeCodeGen`'s
    /// layout to a loop with no init/step, per `SPEC_FULL.md` §4.6).
    fn gen_pretest_loop(&mut self, cond: &Node, body: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        let check = labels.next_jump_label();
        let body_label = labels.next_jump_label();
        let next = labels.next_jump_label();

        let mut code = format!("\t{}: br.s {check}", self.label(labels));
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

    /// `делать body пока (cond);` — tests after the first iteration.
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
        code.push_str(&format!("\t{}: br.s {check}", self.label(labels)));
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

        let func_name = if name == "главный" {
            "Main".to_string()
        } else {
            let ident = ident.as_ref().expect("resolved during analysis");
            format!("func_{}", ident.index)
        };

        let param_list: Vec<String> = params
            .iter()
            .map(|p| {
                let NodeKind::Param { ty, ident, .. } = &p.kind else {
                    unreachable!()
                };
                let ident = ident.as_ref().unwrap();
                format!("{} p_{}", cil_type(ty), ident.index)
            })
            .collect();

        let locals = self.arena.locals_of(func_scope);
        let locals_block = if locals.is_empty() {
            String::new()
        } else {
            let decls: Vec<String> = locals
                .iter()
                .map(|d| format!("[{}] {} V_{}", d.index, cil_type(&d.ty), d.index))
                .collect();
            format!("\n    .locals init (\n      {}\n    )", decls.join(",\n      "))
        };

        let mut labels = CilLabels::default();
        let ctx = EmitCtx::default();
        let body_code = self.gen(body, &mut labels, ctx);

        format!(
            ".method public hidebysig static {} {func_name}({}) cil managed\n{{\n  {}{locals_block}\n{body_code}\n}}\n",
            cil_type(return_type),
            param_list.join(", "),
            if func_name == "Main" { ".entrypoint" } else { "" },
        )
    }
}

impl<'a> ConditionBackend for CilBackend<'a> {
    fn gen_node(&mut self, node: &Node, labels: &mut dyn LabelProvider, ctx: EmitCtx) -> String {
        self.gen(node, labels, ctx)
    }

    fn compare_mnemonic(&self, op: BinOp, base: BaseType) -> &'static str {
        let _ = base;
        match op {
            BinOp::Ge => "bge.s",
            BinOp::Gt => "bgt.s",
            BinOp::Le => "ble.s",
            BinOp::Lt => "blt.s",
            BinOp::Eq => "beq.s",
            BinOp::Neq => "bne.un.s",
            other => unreachable!("{other:?} is not a comparison"),
        }
    }

    fn conditional_jump(&self, mnemonic: &str, label: &str) -> String {
        format!("\t{mnemonic} {label}")
    }

    fn unconditional_jump(&self, label: &str) -> String {
        format!("\tbr.s {label}")
    }

    fn usual_label_prefix(&self, labels: &mut dyn LabelProvider) -> String {
        labels.next_usual_label()
    }

    fn push_bool(&self, value: bool) -> String {
        format!("ldc.i4.{}", if value { 1 } else { 0 })
    }

    fn branch_if_false(&self, label: &str) -> String {
        format!("brfalse {label}")
    }
}

/// Emits a full `.il` source module for a parsed and analyzed program.
/// `func_scopes` maps each function's name to its body scope, as
/// recorded by `semantic::Analyzer` while it walked the tree.
pub fn generate(
    program: &Node,
    arena: &ScopeArena,
    func_scopes: &std::collections::HashMap<String, ScopeId>,
    assembly_name: &str,
) -> String {
    let NodeKind::StatementList { statements, .. } = &program.kind else {
        unreachable!("program root is always a StatementList");
    };

    let mut backend = CilBackend::new(arena);

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
        ".assembly extern mscorlib {{}}\n.assembly '{assembly_name}' {{}}\n.module '{assembly_name}.exe'\n\n.class public Program extends [mscorlib]System.Object\n{{\n{}\n}}\n",
        methods.join("\n")
    )
}
