//! Front end: turns source text into the `rusco_common::ast` shape using
//! a `pest`-generated parser, the way the teacher crate's
//! `PestBarracudaParser` turns `barracuda.pest` pairs into `ASTNode`s.
//! This is the one piece `SPEC_FULL.md` treats as a replaceable
//! collaborator — the AST shape is the contract, not this grammar.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use rusco_common::ast::{Literal, Node, NodeKind};
use rusco_common::error::CompileError;
use rusco_common::span::Span;
use rusco_common::types::{BinOp, TypeDesc};

#[derive(Parser)]
#[grammar = "parser/grammar.pest"]
struct RuscoParser;

/// Parses a full translation unit into a `StatementList { program: true,
/// .. }` root node.
pub fn parse_program(source: &str) -> Result<Node, CompileError> {
    let mut pairs = RuscoParser::parse(Rule::program, source).map_err(|e| CompileError::Syntax(e.to_string()))?;
    let program_pair = pairs.next().expect("program rule always produces one pair");

    let span = span_of(&program_pair);
    let mut statements = Vec::new();
    for item in program_pair.into_inner() {
        match item.as_rule() {
            Rule::function_definition => statements.push(function_definition(item)?),
            Rule::function_declaration => statements.push(function_declaration(item)?),
            Rule::EOI => {}
            other => unreachable!("unexpected top-level rule {other:?}"),
        }
    }

    Ok(Node::new(
        span,
        NodeKind::StatementList {
            statements,
            program: true,
        },
    ))
}

fn span_of(pair: &Pair<Rule>) -> Span {
    let (row, col) = pair.as_span().start_pos().line_col();
    Span::new(row, col)
}

fn type_name(pair: Pair<Rule>) -> Result<TypeDesc, CompileError> {
    let span = span_of(&pair);
    let text = pair.as_str();
    TypeDesc::from_keyword(text).ok_or_else(|| CompileError::UnknownType {
        name: text.to_string(),
        span: Some(span),
    })
}

fn function_declaration(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let return_type = type_name(inner.next().unwrap())?;
    let name = inner.next().unwrap().as_str().to_string();
    let mut params = Vec::new();
    if let Some(p) = inner.next() {
        if p.as_rule() == Rule::param_list {
            params = param_list(p)?;
        }
    }
    Ok(Node::new(
        span,
        NodeKind::FunctionDeclaration {
            return_type,
            name,
            params,
            ident: None,
        },
    ))
}

fn function_definition(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let return_type = type_name(inner.next().unwrap())?;
    let name = inner.next().unwrap().as_str().to_string();
    let mut params = Vec::new();
    let mut next = inner.next().unwrap();
    if next.as_rule() == Rule::param_list {
        params = param_list(next)?;
        next = inner.next().unwrap();
    }
    let body = block(next)?;
    Ok(Node::new(
        span,
        NodeKind::FunctionDefinition {
            return_type,
            name,
            params,
            body: Box::new(body),
            ident: None,
        },
    ))
}

fn param_list(pair: Pair<Rule>) -> Result<Vec<Node>, CompileError> {
    pair.into_inner().map(param).collect()
}

fn param(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let ty = type_name(inner.next().unwrap())?;
    let name = inner.next().unwrap().as_str().to_string();
    Ok(Node::new(span, NodeKind::Param { ty, name, ident: None }))
}

fn block(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let statements = pair
        .into_inner()
        .map(statement)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Node::new(
        span,
        NodeKind::StatementList {
            statements,
            program: false,
        },
    ))
}

fn statement(pair: Pair<Rule>) -> Result<Node, CompileError> {
    match pair.as_rule() {
        Rule::var_def_stmt => var_def_stmt(pair),
        Rule::if_stmt => if_stmt(pair),
        Rule::while_stmt => while_stmt(pair),
        Rule::do_while_stmt => do_while_stmt(pair),
        Rule::for_stmt => for_stmt(pair),
        Rule::return_stmt => return_stmt(pair),
        Rule::block => block(pair),
        Rule::empty_stmt => Ok(Node::new(span_of(&pair), NodeKind::Empty)),
        Rule::expr_stmt => {
            let span = span_of(&pair);
            let inner = pair.into_inner().next().unwrap();
            let _ = span;
            expr(inner)
        }
        other => unreachable!("unexpected statement rule {other:?}"),
    }
}

fn var_def_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let ty = type_name(inner.next().unwrap())?;
    let entries = inner.map(var_entry).collect::<Result<Vec<_>, _>>()?;
    Ok(Node::new(span, NodeKind::VariableDefinition { ty, entries }))
}

fn var_def_headless(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let ty = type_name(inner.next().unwrap())?;
    let entries = inner.map(var_entry).collect::<Result<Vec<_>, _>>()?;
    Ok(Node::new(span, NodeKind::VariableDefinition { ty, entries }))
}

fn var_entry(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let name = inner.next().unwrap().as_str().to_string();
    let ident_node = Node::new(span, NodeKind::Identifier { name, ident: None });
    match inner.next() {
        Some(value_pair) => {
            let value = expr(value_pair)?;
            Ok(Node::new(
                span,
                NodeKind::Assign {
                    target: Box::new(ident_node),
                    value: Box::new(value),
                },
            ))
        }
        None => Ok(ident_node),
    }
}

fn if_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let cond = expr(inner.next().unwrap())?;
    let then_branch = statement(inner.next().unwrap())?;
    let else_branch = match inner.next() {
        Some(p) => Some(Box::new(statement(p)?)),
        None => None,
    };
    Ok(Node::new(
        span,
        NodeKind::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch,
        },
    ))
}

fn while_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let cond = expr(inner.next().unwrap())?;
    let body = statement(inner.next().unwrap())?;
    Ok(Node::new(
        span,
        NodeKind::While {
            cond: Box::new(cond),
            body: Box::new(body),
        },
    ))
}

fn do_while_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let body = statement(inner.next().unwrap())?;
    let cond = expr(inner.next().unwrap())?;
    Ok(Node::new(
        span,
        NodeKind::DoWhile {
            cond: Box::new(cond),
            body: Box::new(body),
        },
    ))
}

fn for_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();

    let init_pair = inner.next().unwrap();
    let init = match init_pair.into_inner().next() {
        Some(headless) => var_def_headless(headless)?,
        None => Node::new(span, NodeKind::Empty),
    };

    let cond_pair = inner.next().unwrap();
    let cond = match cond_pair.into_inner().next() {
        Some(e) => expr(e)?,
        None => Node::new(span, NodeKind::Literal(Literal::Bool(true))),
    };

    let step_pair = inner.next().unwrap();
    let step = match step_pair.into_inner().next() {
        Some(e) => expr(e)?,
        None => Node::new(span, NodeKind::Empty),
    };

    let body = statement(inner.next().unwrap())?;

    Ok(Node::new(
        span,
        NodeKind::For {
            init: Box::new(init),
            cond: Box::new(cond),
            step: Box::new(step),
            body: Box::new(body),
        },
    ))
}

fn return_stmt(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let expr_node = match inner.next() {
        Some(p) => expr(p)?,
        None => Node::new(span, NodeKind::Empty),
    };
    Ok(Node::new(span, NodeKind::Return { expr: Box::new(expr_node) }))
}

fn expr(pair: Pair<Rule>) -> Result<Node, CompileError> {
    // `expr` wraps `assign_expr`; unwrap down to it.
    let inner = match pair.as_rule() {
        Rule::expr => pair.into_inner().next().unwrap(),
        _ => pair,
    };
    assign_expr(inner)
}

fn assign_expr(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let first = inner.next().unwrap();
    match inner.next() {
        // `identifier "=" assign_expr` — two children means this was the
        // assignment alternative.
        Some(rhs_pair) => {
            let name = first.as_str().to_string();
            let target = Node::new(span, NodeKind::Identifier { name, ident: None });
            let value = assign_expr(rhs_pair)?;
            Ok(Node::new(
                span,
                NodeKind::Assign {
                    target: Box::new(target),
                    value: Box::new(value),
                },
            ))
        }
        None => logical_or(first),
    }
}

fn logical_or(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, logical_and, |_| BinOp::Or)
}

fn logical_and(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, equality, |_| BinOp::And)
}

fn equality(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, relational, |op_text| match op_text {
        "==" => BinOp::Eq,
        "!=" => BinOp::Neq,
        _ => unreachable!(),
    })
}

fn relational(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, additive, |op_text| match op_text {
        ">=" => BinOp::Ge,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        "<" => BinOp::Lt,
        _ => unreachable!(),
    })
}

fn additive(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, multiplicative, |op_text| match op_text {
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        _ => unreachable!(),
    })
}

fn multiplicative(pair: Pair<Rule>) -> Result<Node, CompileError> {
    binary_chain(pair, unary, |op_text| match op_text {
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Mod,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        _ => unreachable!(),
    })
}

/// Left-associative `operand (op_rule operand)*` folding shared by every
/// binary-precedence level.
fn binary_chain(
    pair: Pair<Rule>,
    mut operand: impl FnMut(Pair<Rule>) -> Result<Node, CompileError>,
    op_for: impl Fn(&str) -> BinOp,
) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let mut node = operand(inner.next().unwrap())?;
    while let Some(op_pair) = inner.next() {
        let op = op_for(op_pair.as_str());
        let rhs = operand(inner.next().unwrap())?;
        node = Node::new(
            span,
            NodeKind::BinaryOp {
                op,
                left: Box::new(node),
                right: Box::new(rhs),
            },
        );
    }
    Ok(node)
}

fn unary(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let first = inner.next().unwrap();
    match first.as_rule() {
        Rule::op_neg => {
            let operand = unary(inner.next().unwrap())?;
            // Desugar unary negation into `0 - x`; the type lattice has
            // no dedicated unary-minus entry (SPEC_FULL.md §3 lists no
            // UnaryOp variant), so this keeps the match exhaustive.
            Ok(Node::new(
                span,
                NodeKind::BinaryOp {
                    op: BinOp::Sub,
                    left: Box::new(Node::new(span, NodeKind::Literal(Literal::Int(0)))),
                    right: Box::new(operand),
                },
            ))
        }
        _ => primary(first),
    }
}

fn primary(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    match pair.as_rule() {
        Rule::int_lit => Ok(Node::new(
            span,
            NodeKind::Literal(Literal::Int(pair.as_str().parse().unwrap())),
        )),
        Rule::float_lit => Ok(Node::new(
            span,
            NodeKind::Literal(Literal::Float(pair.as_str().parse().unwrap())),
        )),
        Rule::bool_lit => Ok(Node::new(
            span,
            NodeKind::Literal(Literal::Bool(pair.as_str() == "ИСТИНА")),
        )),
        Rule::string_lit => {
            let text = pair.into_inner().next().unwrap().as_str().to_string();
            Ok(Node::new(span, NodeKind::Literal(Literal::Str(text))))
        }
        Rule::call => call(pair),
        Rule::identifier => Ok(Node::new(
            span,
            NodeKind::Identifier {
                name: pair.as_str().to_string(),
                ident: None,
            },
        )),
        Rule::expr => expr(pair),
        other => unreachable!("unexpected primary rule {other:?}"),
    }
}

fn call(pair: Pair<Rule>) -> Result<Node, CompileError> {
    let span = span_of(&pair);
    let mut inner = pair.into_inner();
    let callee = inner.next().unwrap().as_str().to_string();
    let mut args = Vec::new();
    if let Some(arg_list_pair) = inner.next() {
        args = arg_list_pair
            .into_inner()
            .map(expr)
            .collect::<Result<Vec<_>, _>>()?;
    }
    Ok(Node::new(
        span,
        NodeKind::Call {
            callee,
            ident: None,
            args,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Node {
        parse_program(src).expect("source should parse")
    }

    #[test]
    fn parses_minimal_main() {
        let node = parse("целый главный() { вернуть 0; }");
        match node.kind {
            NodeKind::StatementList { statements, program } => {
                assert!(program);
                assert_eq!(statements.len(), 1);
            }
            _ => panic!("expected a statement list"),
        }
    }

    #[test]
    fn parses_for_loop_sum() {
        let node = parse(
            "целый главный() { целый s = 0; цикл (целый i = 1; i <= 5; i = i + 1) s = s + i; вывод_целый(s); }",
        );
        assert!(matches!(node.kind, NodeKind::StatementList { .. }));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_program("целый главный() { @@@ }").is_err());
    }
}
