//! The type lattice: base types, the function type descriptor, the
//! convertibility relation and the binary-operator compatibility table.
//! Ported from `original_source/src/semantic/types.py` as an idiomatic
//! Rust enum/struct pair rather than a literal translation of the
//! Python classes.

use std::fmt;

/// The five base types of the source language. `Void` only ever appears
/// as a function return type; no expression is ever typed `Void`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    Void,
    Int,
    Float,
    Bool,
    Str,
}

impl BaseType {
    /// Maps a Russian base-type keyword to a `BaseType`. Used by both the
    /// grammar's type-name rule and the analyzer's `TypeDesc::from_str`.
    pub fn from_keyword(keyword: &str) -> Option<BaseType> {
        Some(match keyword {
            "целый" => BaseType::Int,
            "вещественный" => BaseType::Float,
            "логический" => BaseType::Bool,
            "строка" => BaseType::Str,
            "пустота" => BaseType::Void,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            BaseType::Void => "пустота",
            BaseType::Int => "целый",
            BaseType::Float => "вещественный",
            BaseType::Bool => "логический",
            BaseType::Str => "строка",
        }
    }
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A type is either one of the five base types, or a function type
/// carrying a return type and an ordered parameter-type list. Mirrors
/// `original_source`'s `TypeDesc`, where `base_type = None` marks the
/// function case.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Simple(BaseType),
    Func {
        return_type: Box<TypeDesc>,
        params: Vec<TypeDesc>,
    },
}

impl TypeDesc {
    pub const VOID: TypeDesc = TypeDesc::Simple(BaseType::Void);
    pub const INT: TypeDesc = TypeDesc::Simple(BaseType::Int);
    pub const FLOAT: TypeDesc = TypeDesc::Simple(BaseType::Float);
    pub const BOOL: TypeDesc = TypeDesc::Simple(BaseType::Bool);
    pub const STR: TypeDesc = TypeDesc::Simple(BaseType::Str);

    pub fn func(return_type: TypeDesc, params: Vec<TypeDesc>) -> TypeDesc {
        TypeDesc::Func {
            return_type: Box::new(return_type),
            params,
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<TypeDesc> {
        BaseType::from_keyword(keyword).map(TypeDesc::Simple)
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, TypeDesc::Simple(_))
    }

    pub fn is_func(&self) -> bool {
        !self.is_simple()
    }

    pub fn base(&self) -> Option<BaseType> {
        match self {
            TypeDesc::Simple(b) => Some(*b),
            TypeDesc::Func { .. } => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Simple(b) => write!(f, "{b}"),
            TypeDesc::Func {
                return_type,
                params,
            } => {
                write!(f, "{return_type}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Directed convertibility relation: `INT -> {FLOAT, BOOL, STR}`,
/// `FLOAT -> {STR}`, `BOOL -> {STR}`. Governs both explicit conversion
/// and argument coercion; intentionally asymmetric (a `FLOAT` does not
/// implicitly become an `INT`).
pub fn convertible(from: BaseType, to: BaseType) -> bool {
    use BaseType::*;
    matches!(
        (from, to),
        (Int, Float) | (Int, Bool) | (Int, Str) | (Float, Str) | (Bool, Str)
    )
}

/// Types `from` is convertible to, in the search order the analyzer
/// widens through for binary-operator resolution: nearest widenings
/// first as declared in the relation above.
pub fn conversion_targets(from: BaseType) -> &'static [BaseType] {
    use BaseType::*;
    match from {
        Int => &[Float, Bool, Str],
        Float => &[Str],
        Bool => &[Str],
        Str => &[],
        Void => &[],
    }
}

/// The binary operators of the source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Neq,
    And,
    Or,
    BitAnd,
    BitOr,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le | BinOp::Eq | BinOp::Neq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// The fixed inversion table used by short-circuit lowering:
    /// `>` <-> `<=`, `<` <-> `>=`, `=` <-> `!=`.
    pub fn inverse(self) -> BinOp {
        match self {
            BinOp::Gt => BinOp::Le,
            BinOp::Le => BinOp::Gt,
            BinOp::Lt => BinOp::Ge,
            BinOp::Ge => BinOp::Lt,
            BinOp::Eq => BinOp::Neq,
            BinOp::Neq => BinOp::Eq,
            other => other,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::And => "И",
            BinOp::Or => "ИЛИ",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
        }
    }
}

/// The binary-operator compatibility table: a partial function from
/// `(op, left, right)` to a result base type. Arithmetic over matching
/// numeric pairs, `ADD` additionally over `(STR, STR)`, comparisons over
/// any matching pair of `{INT, FLOAT, STR}`, bitwise over `(INT, INT)`,
/// logical over `(BOOL, BOOL)`.
pub fn binary_op_result(op: BinOp, left: BaseType, right: BaseType) -> Option<BaseType> {
    use BaseType::*;
    use BinOp::*;
    match (op, left, right) {
        (Add, Int, Int) | (Sub, Int, Int) | (Mul, Int, Int) | (Div, Int, Int) | (Mod, Int, Int) => {
            Some(Int)
        }
        (Add, Float, Float)
        | (Sub, Float, Float)
        | (Mul, Float, Float)
        | (Div, Float, Float)
        | (Mod, Float, Float) => Some(Float),
        (Add, Str, Str) => Some(Str),
        (Gt | Ge | Lt | Le | Eq | Neq, a, b) if a == b && matches!(a, Int | Float | Str) => {
            Some(Bool)
        }
        (BitAnd, Int, Int) | (BitOr, Int, Int) => Some(Int),
        (And, Bool, Bool) | (Or, Bool, Bool) => Some(Bool),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_widens_to_float_for_comparison() {
        assert!(convertible(BaseType::Int, BaseType::Float));
        assert_eq!(
            binary_op_result(BinOp::Gt, BaseType::Float, BaseType::Float),
            Some(BaseType::Bool)
        );
    }

    #[test]
    fn convertibility_is_asymmetric() {
        assert!(!convertible(BaseType::Float, BaseType::Int));
        assert!(!convertible(BaseType::Str, BaseType::Int));
    }

    #[test]
    fn inverse_table_round_trips() {
        for op in [BinOp::Gt, BinOp::Ge, BinOp::Lt, BinOp::Le, BinOp::Eq, BinOp::Neq] {
            assert_eq!(op.inverse().inverse(), op);
        }
    }
}
