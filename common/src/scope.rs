//! The scope/symbol model: nested identifier tables with per-scope
//! counters, built on an arena of `IdentScope`s referenced by index —
//! the same `ScopeId`-indexed-arena discipline the teacher crate uses
//! for its `SymbolTable`, chosen here to sidestep the parent/child
//! aliasing that a naive tree-of-owned-nodes would require `Rc<RefCell<_>>`
//! for. Ported semantics from `original_source/src/semantic/scopes.py`.

use std::collections::HashMap;

use crate::error::CompileError;
use crate::span::Span;
use crate::types::TypeDesc;

/// Index into a `ScopeArena`. Never invalidated: scopes are never removed
/// from the arena, only logically exited by the caller no longer
/// descending into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

/// The four identifier kinds from the distilled spec's §3. `Param` is
/// never rewritten by `add_ident`; the other three are assigned based on
/// where the identifier is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    GlobalLocal,
    Param,
    Local,
}

/// A resolved identifier: everything the analyzer and both backends need
/// to know about a name once it has been looked up.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentDesc {
    pub name: String,
    pub ty: TypeDesc,
    pub kind: ScopeKind,
    pub index: usize,
    pub built_in: bool,
}

/// One lexical scope: a flat name table, a parent link, and the two
/// counters that hand out slot indices. `func` is `Some` exactly when
/// this scope is a function's top-level body scope (the function
/// boundary `curr_func` walks up to).
pub struct IdentScope {
    parent: Option<ScopeId>,
    idents: HashMap<String, IdentDesc>,
    var_index: usize,
    param_index: usize,
    func: bool,
}

impl IdentScope {
    fn new(parent: Option<ScopeId>, func: bool) -> Self {
        IdentScope {
            parent,
            idents: HashMap::new(),
            var_index: 0,
            param_index: 0,
            func,
        }
    }

    pub fn is_global(&self) -> bool {
        self.parent.is_none()
    }

    pub fn get_local(&self, name: &str) -> Option<&IdentDesc> {
        self.idents.get(name)
    }
}

/// Owns every scope created during a single compilation run. Scopes
/// reference their parent by `ScopeId`, so the arena itself never moves
/// scopes once allocated and borrows stay entirely within `&self`/`&mut
/// self` calls on the arena.
pub struct ScopeArena {
    scopes: Vec<IdentScope>,
    global: ScopeId,
}

impl ScopeArena {
    /// Creates the arena with an empty global scope and seeds it with
    /// the four built-in console functions, per §4.1.
    pub fn new() -> Self {
        let mut arena = ScopeArena {
            scopes: vec![IdentScope::new(None, false)],
            global: ScopeId(0),
        };
        arena.seed_builtins();
        arena
    }

    fn seed_builtins(&mut self) {
        let builtins: [(&str, TypeDesc); 4] = [
            ("вывод_целый", TypeDesc::func(TypeDesc::VOID, vec![TypeDesc::INT])),
            ("вывод_вещ", TypeDesc::func(TypeDesc::VOID, vec![TypeDesc::FLOAT])),
            ("вывод", TypeDesc::func(TypeDesc::VOID, vec![TypeDesc::STR])),
            ("вывод_перенос", TypeDesc::func(TypeDesc::VOID, vec![TypeDesc::STR])),
        ];
        for (index, (name, ty)) in builtins.into_iter().enumerate() {
            let desc = IdentDesc {
                name: name.to_string(),
                ty,
                kind: ScopeKind::Global,
                index,
                built_in: true,
            };
            self.scopes[self.global.0].idents.insert(name.to_string(), desc);
        }
    }

    pub fn global(&self) -> ScopeId {
        self.global
    }

    /// Opens a new child scope of `parent`. `func` marks it as a function
    /// boundary scope (the body scope of a `FunctionDefinition`).
    pub fn enter_scope(&mut self, parent: ScopeId, func: bool) -> ScopeId {
        self.scopes.push(IdentScope::new(Some(parent), func));
        ScopeId(self.scopes.len() - 1)
    }

    pub fn parent_of(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    /// The nearest ancestor scope (including `scope` itself) with
    /// `func = true`, or `None` if `scope` is outside any function body.
    pub fn curr_func(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if self.scopes[id.0].func {
                return Some(id);
            }
            cur = self.scopes[id.0].parent;
        }
        None
    }

    /// Walks parents to the root. Every scope has one; the global scope
    /// is its own `curr_global`.
    pub fn curr_global(&self, scope: ScopeId) -> ScopeId {
        let mut cur = scope;
        while let Some(parent) = self.scopes[cur.0].parent {
            cur = parent;
        }
        cur
    }

    /// `get_ident` — walks parents until found; `None` on miss.
    pub fn get_ident(&self, scope: ScopeId, name: &str) -> Option<&IdentDesc> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            if let Some(desc) = self.scopes[id.0].idents.get(name) {
                return Some(desc);
            }
            cur = self.scopes[id.0].parent;
        }
        None
    }

    /// Attaches a descriptor to `scope` following the redeclaration and
    /// index-assignment rules of §4.1. `kind` is the *proposed* kind
    /// (`Param` for parameters, anything else — conventionally `Local`
    /// — for everything else); it is rewritten below based on where the
    /// declaration actually lands.
    pub fn add_ident(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: TypeDesc,
        kind: ScopeKind,
        span: Option<Span>,
    ) -> Result<IdentDesc, CompileError> {
        let resolved_kind = if kind == ScopeKind::Param {
            ScopeKind::Param
        } else if self.curr_func(scope).is_some() {
            ScopeKind::Local
        } else if self.scopes[scope.0].is_global() {
            ScopeKind::Global
        } else {
            ScopeKind::GlobalLocal
        };

        if let Some(prev) = self.get_ident(scope, name) {
            let ok = match (resolved_kind, prev.kind) {
                (ScopeKind::Param, ScopeKind::Param) => false,
                (ScopeKind::Local, ScopeKind::Global | ScopeKind::GlobalLocal) => true,
                (ScopeKind::Local, _) => false,
                _ => false,
            };
            if !ok {
                return Err(CompileError::Redeclaration {
                    name: name.to_string(),
                    span,
                });
            }
        }

        let index = match resolved_kind {
            ScopeKind::Param => {
                let func_scope = self.curr_func(scope).unwrap_or(scope);
                let idx = self.scopes[func_scope.0].param_index;
                self.scopes[func_scope.0].param_index += 1;
                idx
            }
            ScopeKind::Local => {
                let func_scope = self.curr_func(scope).unwrap_or(scope);
                let idx = self.scopes[func_scope.0].var_index;
                self.scopes[func_scope.0].var_index += 1;
                idx
            }
            ScopeKind::Global | ScopeKind::GlobalLocal => {
                let global = self.curr_global(scope);
                let idx = self.scopes[global.0].var_index;
                self.scopes[global.0].var_index += 1;
                idx
            }
        };

        let desc = IdentDesc {
            name: name.to_string(),
            ty,
            kind: resolved_kind,
            index,
            built_in: false,
        };
        self.scopes[scope.0].idents.insert(name.to_string(), desc.clone());
        Ok(desc)
    }

    /// Every non-function identifier of kind `Global` or `Local` declared
    /// directly in `scope`, in declaration order — used by the CIL
    /// backend to emit a function's `.locals init (...)` block.
    pub fn locals_of(&self, scope: ScopeId) -> Vec<&IdentDesc> {
        let mut locals: Vec<&IdentDesc> = self.scopes[scope.0]
            .idents
            .values()
            .filter(|d| !d.ty.is_func() && matches!(d.kind, ScopeKind::Global | ScopeKind::Local))
            .collect();
        locals.sort_by_key(|d| d.index);
        locals
    }
}

impl Default for ScopeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BaseType;

    #[test]
    fn builtins_are_seeded() {
        let arena = ScopeArena::new();
        let ident = arena.get_ident(arena.global(), "вывод_целый").unwrap();
        assert!(ident.built_in);
        assert_eq!(ident.ty, TypeDesc::func(TypeDesc::VOID, vec![TypeDesc::INT]));
    }

    #[test]
    fn local_may_shadow_global() {
        let mut arena = ScopeArena::new();
        let global = arena.global();
        arena
            .add_ident(global, "x", TypeDesc::Simple(BaseType::Int), ScopeKind::Local, None)
            .unwrap();
        let func_scope = arena.enter_scope(global, true);
        let shadowed = arena
            .add_ident(func_scope, "x", TypeDesc::Simple(BaseType::Float), ScopeKind::Local, None)
            .unwrap();
        assert_eq!(shadowed.kind, ScopeKind::Local);
        assert_eq!(shadowed.index, 0);
    }

    #[test]
    fn param_cannot_shadow_param() {
        let mut arena = ScopeArena::new();
        let func_scope = arena.enter_scope(arena.global(), true);
        arena
            .add_ident(func_scope, "x", TypeDesc::INT, ScopeKind::Param, None)
            .unwrap();
        let err = arena.add_ident(func_scope, "x", TypeDesc::INT, ScopeKind::Param, None);
        assert!(matches!(err, Err(CompileError::Redeclaration { .. })));
    }

    #[test]
    fn param_indices_increment_independently_of_locals() {
        let mut arena = ScopeArena::new();
        let func_scope = arena.enter_scope(arena.global(), true);
        let p0 = arena
            .add_ident(func_scope, "a", TypeDesc::INT, ScopeKind::Param, None)
            .unwrap();
        let l0 = arena
            .add_ident(func_scope, "b", TypeDesc::INT, ScopeKind::Local, None)
            .unwrap();
        let p1 = arena
            .add_ident(func_scope, "c", TypeDesc::INT, ScopeKind::Param, None)
            .unwrap();
        assert_eq!((p0.index, l0.index, p1.index), (0, 0, 1));
    }
}
