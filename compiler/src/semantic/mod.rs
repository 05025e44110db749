//! The semantic analyzer: name resolution, type checking, implicit
//! conversion insertion, and constant folding over the AST. Ported from
//! `original_source/src/semantic/node_handlers.py`'s per-class handler
//! registry (and the teacher's own
//! `barracuda_pest_semantic_analyser.rs` dispatch-by-match shape) as a
//! single exhaustive match, carrying an explicit `Analyzer` value
//! instead of a global mutable singleton (`SPEC_FULL.md` §9).

pub mod calc;

use rusco_common::ast::{Literal, Node, NodeKind};
use rusco_common::error::CompileError;
use rusco_common::scope::{ScopeArena, ScopeId, ScopeKind};
use rusco_common::types::{self, BaseType, TypeDesc};

/// Owns the scope arena for one compilation run and the small amount of
/// bookkeeping the analyzer needs beyond what a scope lookup gives it:
/// the return type of the function currently being analyzed (for the
/// `Return`-type check the distilled spec's Open Question resolves in
/// favor of implementing, `SPEC_FULL.md` §4.3) and the forward-declared
/// functions awaiting a matching definition (`SPEC_FULL.md` §4.8).
pub struct Analyzer {
    pub arena: ScopeArena,
    /// Each function's body scope, keyed by name — the backends need
    /// this to emit a `.locals init` block without re-walking the arena
    /// by name (scopes are identified only by `ScopeId`).
    pub func_scopes: std::collections::HashMap<String, ScopeId>,
    return_type_stack: Vec<TypeDesc>,
    declared: std::collections::HashMap<String, TypeDesc>,
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            arena: ScopeArena::new(),
            func_scopes: std::collections::HashMap::new(),
            return_type_stack: Vec::new(),
            declared: std::collections::HashMap::new(),
        }
    }

    /// Analyzes a whole program (`StatementList { program: true, .. }`),
    /// then checks the `главный` entry point and forward-declaration
    /// completeness invariants.
    pub fn analyze_program(&mut self, root: &mut Node) -> Result<(), CompileError> {
        let global = self.arena.global();
        self.analyze(root, global)?;

        if let Some(unfulfilled) = self.declared.keys().next() {
            return Err(CompileError::InvalidProgramShape {
                message: format!("функция \"{unfulfilled}\" объявлена, но не определена"),
                span: None,
            });
        }

        match self.arena.get_ident(global, "главный") {
            Some(ident) if ident.ty.is_func() => Ok(()),
            _ => Err(CompileError::InvalidProgramShape {
                message: "Нет точки входа в программу (функция главный)".to_string(),
                span: None,
            }),
        }
    }

    fn analyze(&mut self, node: &mut Node, scope: ScopeId) -> Result<(), CompileError> {
        match &mut node.kind {
            NodeKind::Literal(value) => {
                node.node_type = Some(literal_type(value));
            }

            NodeKind::Identifier { name, ident } => {
                let desc = self.arena.get_ident(scope, name).cloned().ok_or_else(|| {
                    CompileError::UnresolvedName {
                        name: name.clone(),
                        span: Some(node.span),
                    }
                })?;
                node.node_type = Some(desc.ty.clone());
                *ident = Some(desc);
            }

            NodeKind::Assign { target, value } => {
                self.analyze(target, scope)?;
                self.fold_then_analyze(value, scope)?;
                let target_ty = target.node_type.clone().expect("analyzed above");
                take_and_replace(value, |v| {
                    type_convert(v, &target_ty, "присваиваемое значение")
                })?;
                node.node_type = Some(target_ty);
            }

            NodeKind::BinaryOp { op, left, right } => {
                self.analyze(left, scope)?;
                self.analyze(right, scope)?;
                let op = *op;
                let left_base = simple_base(left, node.span)?;
                let right_base = simple_base(right, node.span)?;

                if let Some(result) = types::binary_op_result(op, left_base, right_base) {
                    node.node_type = Some(TypeDesc::Simple(result));
                    return Ok(());
                }

                // Widen the right operand first, then the left, per
                // SPEC_FULL.md §4.3's search order.
                for target in types::conversion_targets(right_base) {
                    if let Some(result) = types::binary_op_result(op, left_base, *target) {
                        take_and_replace(right, |r| {
                            type_convert(r, &TypeDesc::Simple(*target), "операнд")
                        })?;
                        node.node_type = Some(TypeDesc::Simple(result));
                        return Ok(());
                    }
                }
                for target in types::conversion_targets(left_base) {
                    if let Some(result) = types::binary_op_result(op, *target, right_base) {
                        take_and_replace(left, |l| {
                            type_convert(l, &TypeDesc::Simple(*target), "операнд")
                        })?;
                        node.node_type = Some(TypeDesc::Simple(result));
                        return Ok(());
                    }
                }

                return Err(CompileError::TypeMismatch {
                    message: format!(
                        "оператор {} неприменим к ({}, {})",
                        op.symbol(),
                        left_base,
                        right_base
                    ),
                    span: Some(node.span),
                });
            }

            NodeKind::TypeConvert { inner, target } => {
                self.analyze(inner, scope)?;
                node.node_type = Some(target.clone());
            }

            NodeKind::Call { callee, ident, args } => {
                let desc = self.arena.get_ident(scope, callee).cloned().ok_or_else(|| {
                    CompileError::UnresolvedName {
                        name: callee.clone(),
                        span: Some(node.span),
                    }
                })?;
                let (return_type, params) = match &desc.ty {
                    TypeDesc::Func { return_type, params } => {
                        (return_type.as_ref().clone(), params.clone())
                    }
                    _ => {
                        return Err(CompileError::TypeMismatch {
                            message: format!("\"{callee}\" не является функцией"),
                            span: Some(node.span),
                        })
                    }
                };
                if args.len() != params.len() {
                    return Err(CompileError::ArityMismatch {
                        message: format!(
                            "функция \"{}\" ожидает {} аргумент(ов), передано {}",
                            callee,
                            params.len(),
                            args.len()
                        ),
                        span: Some(node.span),
                    });
                }
                for arg in args.iter_mut() {
                    self.analyze(arg, scope)?;
                }
                // Convert after all are individually analyzed, collecting
                // one aggregate error if any conversion fails
                // (SPEC_FULL.md §9's Result-collecting re-architecture of
                // the source's exception-based argument checking).
                let mut failures = Vec::new();
                for (i, (arg, expected)) in args.iter_mut().zip(params.iter()).enumerate() {
                    let taken = std::mem::replace(arg, Node::new(node.span, NodeKind::Empty));
                    match type_convert(taken, expected, "аргумент") {
                        Ok(converted) => *arg = converted,
                        Err(_) => failures.push(format!(
                            "аргумент {} имеет тип {}, ожидается {}",
                            i + 1,
                            arg.node_type.as_ref().map(ToString::to_string).unwrap_or_default(),
                            expected
                        )),
                    }
                }
                if !failures.is_empty() {
                    return Err(CompileError::TypeMismatch {
                        message: format!(
                            "несоответствие аргументов вызова \"{}\": {}",
                            callee,
                            failures.join("; ")
                        ),
                        span: Some(node.span),
                    });
                }
                node.node_type = Some(return_type);
                *ident = Some(desc);
            }

            NodeKind::VariableDefinition { ty, entries } => {
                for entry in entries.iter_mut() {
                    match &mut entry.kind {
                        NodeKind::Identifier { name, ident } => {
                            let desc = self.arena.add_ident(
                                scope,
                                name,
                                ty.clone(),
                                ScopeKind::Local,
                                Some(entry.span),
                            )?;
                            entry.node_type = Some(ty.clone());
                            *ident = Some(desc);
                        }
                        NodeKind::Assign { target, value } => {
                            // Declare before analyzing the initializer, so
                            // the RHS cannot observe the new name.
                            let name = match &target.kind {
                                NodeKind::Identifier { name, .. } => name.clone(),
                                _ => unreachable!("var_entry target is always an identifier"),
                            };
                            let desc = self.arena.add_ident(
                                scope,
                                &name,
                                ty.clone(),
                                ScopeKind::Local,
                                Some(target.span),
                            )?;
                            target.node_type = Some(ty.clone());
                            if let NodeKind::Identifier { ident, .. } = &mut target.kind {
                                *ident = Some(desc);
                            }
                            self.fold_then_analyze(value, scope)?;
                            take_and_replace(value, |v| {
                                type_convert(v, ty, "присваиваемое значение")
                            })?;
                            entry.node_type = Some(ty.clone());
                        }
                        _ => unreachable!("var entries are Identifier or Assign"),
                    }
                }
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.analyze_condition(cond, scope)?;
                let then_scope = self.arena.enter_scope(scope, false);
                self.analyze(then_branch, then_scope)?;
                if let Some(else_branch) = else_branch {
                    let else_scope = self.arena.enter_scope(scope, false);
                    self.analyze(else_branch, else_scope)?;
                }
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::While { cond, body } | NodeKind::DoWhile { cond, body } => {
                self.analyze_condition(cond, scope)?;
                let body_scope = self.arena.enter_scope(scope, false);
                self.analyze(body, body_scope)?;
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::For {
                init,
                cond,
                step,
                body,
            } => {
                let loop_scope = self.arena.enter_scope(scope, false);
                self.analyze(init, loop_scope)?;
                self.analyze_condition(cond, loop_scope)?;
                self.analyze(step, loop_scope)?;
                self.analyze(body, loop_scope)?;
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::Param { ty, name, ident } => {
                let desc =
                    self.arena
                        .add_ident(scope, name, ty.clone(), ScopeKind::Param, Some(node.span))?;
                node.node_type = Some(ty.clone());
                *ident = Some(desc);
            }

            NodeKind::FunctionDefinition {
                return_type,
                name,
                params,
                body,
                ident,
            } => {
                if self.arena.curr_func(scope).is_some() {
                    return Err(CompileError::InvalidProgramShape {
                        message: "вложенные функции не поддерживаются".to_string(),
                        span: Some(node.span),
                    });
                }

                let param_types: Vec<TypeDesc> = params
                    .iter()
                    .map(|p| match &p.kind {
                        NodeKind::Param { ty, .. } => ty.clone(),
                        _ => unreachable!(),
                    })
                    .collect();
                let func_ty = TypeDesc::func(return_type.clone(), param_types);

                if let Some(declared_ty) = self.declared.remove(name) {
                    if declared_ty != func_ty {
                        return Err(CompileError::InvalidProgramShape {
                            message: format!(
                                "объявление функции \"{name}\" не совпадает с определением"
                            ),
                            span: Some(node.span),
                        });
                    }
                }

                let global = self.arena.global();
                let desc = self.arena.add_ident(
                    global,
                    name,
                    func_ty,
                    ScopeKind::Global,
                    Some(node.span),
                )?;
                *ident = Some(desc);
                node.node_type = Some(TypeDesc::VOID);

                let func_scope = self.arena.enter_scope(global, true);
                self.func_scopes.insert(name.clone(), func_scope);
                for p in params.iter_mut() {
                    self.analyze(p, func_scope)?;
                }
                self.return_type_stack.push(return_type.clone());
                self.analyze(body, func_scope)?;
                self.return_type_stack.pop();
            }

            NodeKind::FunctionDeclaration {
                return_type,
                name,
                params,
                ident,
            } => {
                let param_types: Vec<TypeDesc> = params
                    .iter()
                    .map(|p| match &p.kind {
                        NodeKind::Param { ty, .. } => ty.clone(),
                        _ => unreachable!(),
                    })
                    .collect();
                let func_ty = TypeDesc::func(return_type.clone(), param_types);
                let global = self.arena.global();
                let desc = self.arena.add_ident(
                    global,
                    name,
                    func_ty.clone(),
                    ScopeKind::Global,
                    Some(node.span),
                )?;
                *ident = Some(desc);
                self.declared.insert(name.clone(), func_ty);
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::Return { expr } => {
                if expr.is_empty() {
                    node.node_type = Some(TypeDesc::VOID);
                } else {
                    self.analyze(expr, scope)?;
                    if let Some(expected) = self.return_type_stack.last().cloned() {
                        take_and_replace(expr, |e| {
                            type_convert(e, &expected, "возвращаемое значение")
                        })?;
                    }
                    node.node_type = expr.node_type.clone();
                }
            }

            NodeKind::StatementList { statements, .. } => {
                for stmt in statements.iter_mut() {
                    self.analyze(stmt, scope)?;
                }
                node.node_type = Some(TypeDesc::VOID);
            }

            NodeKind::Empty => {
                node.node_type = Some(TypeDesc::VOID);
            }
        }
        Ok(())
    }

    /// Analyzes a condition expression and coerces it to `BOOL` (`If`,
    /// `While`, `For`'s middle clause).
    fn analyze_condition(&mut self, cond: &mut Box<Node>, scope: ScopeId) -> Result<(), CompileError> {
        self.analyze(cond, scope)?;
        let span = cond.span;
        let taken = std::mem::replace(cond.as_mut(), Node::new(span, NodeKind::Empty));
        let converted = type_convert(taken, &TypeDesc::BOOL, "условие")?;
        **cond = converted;
        Ok(())
    }

    /// Attempts constant folding before analyzing an expression, per
    /// §4.3: "before analyzing an assignment's RHS ... attempt to
    /// evaluate it via the constant evaluator; if it succeeds, replace
    /// the RHS with a Literal".
    fn fold_then_analyze(&mut self, expr: &mut Box<Node>, scope: ScopeId) -> Result<(), CompileError> {
        if let Some(value) = calc::try_calc(expr) {
            let span = expr.span;
            **expr = Node::new(span, NodeKind::Literal(value));
        }
        self.analyze(expr, scope)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_type(value: &Literal) -> TypeDesc {
    // bool before int before float before string, per §4.3.
    match value {
        Literal::Bool(_) => TypeDesc::BOOL,
        Literal::Int(_) => TypeDesc::INT,
        Literal::Float(_) => TypeDesc::FLOAT,
        Literal::Str(_) => TypeDesc::STR,
    }
}

fn simple_base(node: &Node, span: rusco_common::span::Span) -> Result<BaseType, CompileError> {
    match node.node_type.as_ref().and_then(TypeDesc::base) {
        Some(b) => Ok(b),
        None => Err(CompileError::TypeMismatch {
            message: "ожидалось простое значение, а не функция".to_string(),
            span: Some(span),
        }),
    }
}

/// `type_convert` — §4.2. Returns `expr` unchanged if types are equal;
/// wraps it in a `TypeConvert` node if convertible; fails otherwise.
fn type_convert(expr: Node, target: &TypeDesc, context: &str) -> Result<Node, CompileError> {
    let from = expr
        .node_type
        .clone()
        .expect("type_convert is only called after the operand has been analyzed");
    if &from == target {
        return Ok(expr);
    }
    let (from_base, target_base) = match (from.base(), target.base()) {
        (Some(a), Some(b)) => (a, b),
        _ => (BaseType::Void, BaseType::Void), // forces the error branch below for func types
    };
    if from.is_simple() && target.is_simple() && types::convertible(from_base, target_base) {
        let span = expr.span;
        let mut converted = Node::new(
            span,
            NodeKind::TypeConvert {
                inner: Box::new(expr),
                target: target.clone(),
            },
        );
        converted.node_type = Some(target.clone());
        Ok(converted)
    } else {
        let span = expr.span;
        Err(CompileError::TypeMismatch {
            message: format!("тип {from} не может быть преобразован в {target} ({context})"),
            span: Some(span),
        })
    }
}

/// Replaces the boxed node with the result of applying `f` to its owned
/// contents, propagating an error without leaving the box empty.
fn take_and_replace(
    slot: &mut Box<Node>,
    f: impl FnOnce(Node) -> Result<Node, CompileError>,
) -> Result<(), CompileError> {
    let placeholder_span = slot.span;
    let taken = std::mem::replace(slot.as_mut(), Node::new(placeholder_span, NodeKind::Empty));
    **slot = f(taken)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    fn analyze_source(src: &str) -> Result<Node, CompileError> {
        let mut node = parse_program(src).unwrap();
        let mut analyzer = Analyzer::new();
        analyzer.analyze_program(&mut node)?;
        Ok(node)
    }

    #[test]
    fn s1_arithmetic_folds_and_types() {
        let node = analyze_source("целый главный() { целый x = 2 + 3 * 4; вывод_целый(x); }").unwrap();
        let body = find_main_body(&node);
        match &body.statements[0].kind {
            NodeKind::VariableDefinition { entries, .. } => match &entries[0].kind {
                NodeKind::Assign { value, .. } => {
                    assert!(matches!(value.kind, NodeKind::Literal(Literal::Int(14))));
                }
                _ => panic!(),
            },
            _ => panic!(),
        }
    }

    #[test]
    fn s7_missing_entry_point_fails() {
        let err = analyze_source("целый g() { вернуть 0; }").unwrap_err();
        assert!(err.message().contains("главный"));
    }

    #[test]
    fn s6_implicit_widen_inserts_type_convert() {
        let node = analyze_source(
            "вещественный f(вещественный x) { вернуть x + 1.0; } целый главный() { вывод_вещ(f(2)); }",
        )
        .unwrap();
        let body = find_main_body(&node);
        match &body.statements[0].kind {
            NodeKind::Call { args, .. } => match &args[0].kind {
                NodeKind::Call { args: inner_args, .. } => {
                    assert!(matches!(inner_args[0].kind, NodeKind::TypeConvert { .. }));
                }
                _ => panic!("expected nested call f(2)"),
            },
            _ => panic!(),
        }
    }

    struct MainBody<'a> {
        statements: &'a Vec<Node>,
    }

    fn find_main_body(root: &Node) -> MainBody<'_> {
        match &root.kind {
            NodeKind::StatementList { statements, .. } => {
                for s in statements {
                    if let NodeKind::FunctionDefinition { name, body, .. } = &s.kind {
                        if name == "главный" {
                            if let NodeKind::StatementList { statements, .. } = &body.kind {
                                return MainBody { statements };
                            }
                        }
                    }
                }
                panic!("главный not found")
            }
            _ => panic!("expected program root"),
        }
    }
}
