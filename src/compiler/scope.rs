//! Scope analysis: a single pre-pass over the expression tree that
//! decides, for every name, whether it lives in a global slot, a stack
//! slot, or a heap cell shared with closures.
//!
//! A variable starts out as a local of its declaring scope. When a
//! reference to it crosses a function boundary, the declaring scope
//! promotes it to a cell and every scope between the reference and the
//! declaration threads it through as a free variable, so the compiler
//! knows which cells each function must capture.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};

use crate::parser::{Expr, ExprKind, NodeId};
use crate::vm::GlobalTable;

use super::compiler::{form_child, form_list, form_symbol, COMPARE_OPS};
use super::result::{CompErr, CompResult};

pub type ScopeId = usize;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScopeKind {
    Global,
    Function,
    Block,
}

/// Where a name lives at runtime.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Allocation {
    Global,
    Local,
    Cell,
}

#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    parent: Option<ScopeId>,
    alloc_info: IndexMap<String, Allocation>,
    /// Names captured from an enclosing scope, or threaded through on
    /// the way to one.
    pub free: IndexSet<String>,
    /// Own variables captured by some nested function.
    pub cell: IndexSet<String>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            alloc_info: IndexMap::new(),
            free: IndexSet::new(),
            cell: IndexSet::new(),
        }
    }
}

/// Scope records stored in an arena, keyed by the id of the expression
/// node that introduced them.
#[derive(Debug, Default)]
pub struct ScopeTree {
    storage: Vec<Scope>,
    by_node: HashMap<NodeId, ScopeId>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: ScopeKind, parent: Option<ScopeId>, node: NodeId) -> ScopeId {
        let id = self.storage.len();
        self.storage.push(Scope::new(kind, parent));
        self.by_node.insert(node, id);
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.storage[id]
    }

    /// The scope introduced by the given expression node, if any.
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.by_node.get(&node).copied()
    }

    /// Register a declaration in a scope. In the global scope the
    /// allocation is GLOBAL, otherwise LOCAL until promoted.
    pub fn add_local(&mut self, scope: ScopeId, name: &str) {
        let alloc = if self.storage[scope].kind == ScopeKind::Global {
            Allocation::Global
        } else {
            Allocation::Local
        };
        self.storage[scope].alloc_info.insert(name.to_owned(), alloc);
    }

    /// Register a name that always binds to a global slot, wherever it
    /// is declared. Classes work this way.
    pub fn add_global(&mut self, scope: ScopeId, name: &str) {
        self.storage[scope].alloc_info.insert(name.to_owned(), Allocation::Global);
    }

    pub fn allocation(&self, scope: ScopeId, name: &str) -> Option<Allocation> {
        self.storage[scope].alloc_info.get(name).copied()
    }

    /// Resolve a name reference and, if the resolution crossed a
    /// function boundary, promote the variable to a heap cell.
    pub fn maybe_promote(
        &mut self,
        scope: ScopeId,
        name: &str,
        globals: &GlobalTable,
    ) -> CompResult<()> {
        // Already resolved in this scope (a declaration, a parameter,
        // or an earlier reference that threaded it through): keep the
        // verdict. Re-promoting a threaded free variable would register
        // it as an own cell too.
        if self.storage[scope].alloc_info.contains_key(name) {
            return Ok(());
        }
        let init = if self.storage[scope].kind == ScopeKind::Global {
            Allocation::Global
        } else {
            Allocation::Local
        };

        let (owner, alloc) = self.resolve(scope, name, init, globals)?;
        self.storage[scope].alloc_info.insert(name.to_owned(), alloc);

        if alloc == Allocation::Cell {
            self.promote(scope, owner, name);
        }
        Ok(())
    }

    fn resolve(
        &self,
        start: ScopeId,
        name: &str,
        mut alloc: Allocation,
        globals: &GlobalTable,
    ) -> CompResult<(ScopeId, Allocation)> {
        let mut current = start;
        loop {
            let scope = &self.storage[current];
            if scope.alloc_info.contains_key(name) {
                return Ok((current, alloc));
            }
            // Leaving a function without resolving the name makes it
            // free, hence cell-allocated, unless it turns out global.
            if scope.kind == ScopeKind::Function {
                alloc = Allocation::Cell;
            }
            let Some(parent) = scope.parent else {
                // Natives and host constants live in the global table
                // without ever being declared in source.
                if globals.exists(name) {
                    return Ok((current, Allocation::Global));
                }
                return Err(CompErr::reference(name));
            };
            if self.storage[parent].kind == ScopeKind::Global {
                alloc = Allocation::Global;
            }
            current = parent;
        }
    }

    /// Mark the variable as a cell in its owner scope and as free in
    /// every scope from the reference up to (but excluding) the owner.
    fn promote(&mut self, from: ScopeId, owner: ScopeId, name: &str) {
        let scope = &mut self.storage[owner];
        scope.cell.insert(name.to_owned());
        scope.alloc_info.insert(name.to_owned(), Allocation::Cell);

        let mut current = from;
        while current != owner {
            let scope = &mut self.storage[current];
            scope.free.insert(name.to_owned());
            scope.alloc_info.insert(name.to_owned(), Allocation::Cell);
            current = self.storage[current].parent.expect("promotion walked past the root");
        }
    }
}

/// The analysis walk itself. Produces a `ScopeTree` keyed by the nodes
/// that introduce scopes: blocks, functions, lambdas, and the top level.
pub struct Analyzer<'a> {
    tree: ScopeTree,
    globals: &'a GlobalTable,
}

impl<'a> Analyzer<'a> {
    pub fn analyze(expr: &Expr, globals: &'a GlobalTable) -> CompResult<ScopeTree> {
        let mut analyzer = Analyzer { tree: ScopeTree::new(), globals };
        analyzer.walk(expr, None)?;
        Ok(analyzer.tree)
    }

    fn walk(&mut self, expr: &Expr, scope: Option<ScopeId>) -> CompResult<()> {
        match &expr.kind {
            ExprKind::Number(_) | ExprKind::Str(_) => Ok(()),
            ExprKind::Symbol(name) => {
                if name == "true" || name == "false" {
                    return Ok(());
                }
                let scope = scope.ok_or_else(|| CompErr::reference(name.as_str()))?;
                self.tree.maybe_promote(scope, name, self.globals)
            }
            ExprKind::List(children) => self.walk_list(expr, children, scope),
        }
    }

    fn walk_list(
        &mut self,
        expr: &Expr,
        children: &[Expr],
        scope: Option<ScopeId>,
    ) -> CompResult<()> {
        let tag = children.first().and_then(|child| child.as_symbol());
        match tag {
            Some("begin") => {
                let kind =
                    if scope.is_none() { ScopeKind::Global } else { ScopeKind::Block };
                let block = self.tree.add(kind, scope, expr.id);
                for child in &children[1..] {
                    self.walk(child, Some(block))?;
                }
                Ok(())
            }
            Some("var") => {
                let name = form_symbol(children, 1, "var")?;
                let scope = require_scope(scope, name)?;
                self.tree.add_local(scope, name);
                self.walk(form_child(children, 2, "var")?, Some(scope))
            }
            Some("def") => {
                let name = form_symbol(children, 1, "def")?;
                let params = form_child(children, 2, "def")?;
                let body = form_child(children, 3, "def")?;
                let scope = require_scope(scope, name)?;
                self.tree.add_local(scope, name);
                self.walk_function(expr.id, Some(name), params, body, scope)
            }
            Some("lambda") => {
                let params = form_child(children, 1, "lambda")?;
                let body = form_child(children, 2, "lambda")?;
                let scope = require_scope(scope, "lambda")?;
                self.walk_function(expr.id, None, params, body, scope)
            }
            Some("class") => {
                let name = form_symbol(children, 1, "class")?;
                let scope = require_scope(scope, name)?;
                self.tree.add_global(scope, name);
                // Method names become class properties, not variables,
                // so they are not registered in the enclosing scope.
                for member in &children[3..] {
                    let members = member.as_list().unwrap_or(&[]);
                    if !member.is_tagged("def") {
                        return Err(CompErr::syntax(format!(
                            "class {name} members must be function definitions"
                        )));
                    }
                    let method = form_symbol(members, 1, "def")?;
                    let params = form_child(members, 2, "def")?;
                    let body = form_child(members, 3, "def")?;
                    self.walk_function(member.id, Some(method), params, body, scope)?;
                }
                Ok(())
            }
            // Only the object side of a property access is an
            // expression; the property itself is just a name.
            Some("prop") => self.walk(form_child(children, 1, "prop")?, scope),
            Some("super") => self.walk(form_child(children, 1, "super")?, scope),
            Some(tag) if is_special_form(tag) => {
                for child in &children[1..] {
                    self.walk(child, scope)?;
                }
                Ok(())
            }
            // A call: the head is an expression too (a callee symbol
            // must resolve like any other reference).
            _ => {
                for child in children {
                    self.walk(child, scope)?;
                }
                Ok(())
            }
        }
    }

    fn walk_function(
        &mut self,
        node: NodeId,
        name: Option<&str>,
        params: &Expr,
        body: &Expr,
        parent: ScopeId,
    ) -> CompResult<()> {
        let fn_scope = self.tree.add(ScopeKind::Function, Some(parent), node);
        if let Some(name) = name {
            self.tree.add_local(fn_scope, name);
        }
        for param in form_list(params, "parameter list")? {
            let param = param
                .as_symbol()
                .ok_or_else(|| CompErr::syntax("parameters must be symbols"))?;
            self.tree.add_local(fn_scope, param);
        }
        self.walk(body, Some(fn_scope))
    }
}

fn require_scope(scope: Option<ScopeId>, name: &str) -> CompResult<ScopeId> {
    scope.ok_or_else(|| CompErr::syntax(format!("{name} declared outside any scope")))
}

/// Forms whose head is syntax rather than a callee expression.
fn is_special_form(tag: &str) -> bool {
    matches!(tag, "if" | "while" | "for" | "set" | "new" | "+" | "-" | "*" | "/")
        || COMPARE_OPS.contains_key(tag)
}

#[cfg(test)]
mod tests {
    use crate::parser::Parser;

    use super::*;

    fn analyze(source: &str) -> (Expr, ScopeTree) {
        let expr = Parser::parse(source).unwrap();
        let globals = GlobalTable::new();
        let tree = Analyzer::analyze(&expr, &globals).unwrap();
        (expr, tree)
    }

    fn nth<'a>(expr: &'a Expr, index: usize) -> &'a Expr {
        &expr.as_list().unwrap()[index]
    }

    #[test]
    fn top_level_vars_are_global() {
        let (expr, tree) = analyze("(begin (var g 1) g)");
        let root = tree.scope_of(expr.id).unwrap();
        assert_eq!(tree.get(root).kind, ScopeKind::Global);
        assert_eq!(tree.allocation(root, "g"), Some(Allocation::Global));
    }

    #[test]
    fn block_vars_are_local() {
        let (expr, tree) = analyze("(begin (begin (var a 1) a))");
        let block = tree.scope_of(nth(&expr, 1).id).unwrap();
        assert_eq!(tree.get(block).kind, ScopeKind::Block);
        assert_eq!(tree.allocation(block, "a"), Some(Allocation::Local));
    }

    #[test]
    fn captured_var_is_promoted_to_cell() {
        let (expr, tree) = analyze("(begin (begin (var v 0) (def f () v)))");
        let inner = nth(&expr, 1);
        let block = tree.scope_of(inner.id).unwrap();
        assert_eq!(tree.allocation(block, "v"), Some(Allocation::Cell));
        assert!(tree.get(block).cell.contains("v"));

        let def_scope = tree.scope_of(nth(inner, 2).id).unwrap();
        assert!(tree.get(def_scope).free.contains("v"));
        assert_eq!(tree.allocation(def_scope, "v"), Some(Allocation::Cell));
    }

    #[test]
    fn free_vars_are_threaded_through_intermediate_functions() {
        let (expr, tree) =
            analyze("(begin (begin (var v 0) (def mid () (def inner () v))))");
        let inner_block = nth(&expr, 1);
        let mid_scope = tree.scope_of(nth(inner_block, 2).id).unwrap();
        assert!(tree.get(mid_scope).free.contains("v"));

        let inner_def = nth(nth(inner_block, 2), 3);
        let inner_scope = tree.scope_of(inner_def.id).unwrap();
        assert!(tree.get(inner_scope).free.contains("v"));
    }

    #[test]
    fn global_reads_from_functions_stay_global() {
        let (expr, tree) = analyze("(begin (var g 10) (def f () g))");
        let def_scope = tree.scope_of(nth(&expr, 2).id).unwrap();
        assert_eq!(tree.allocation(def_scope, "g"), Some(Allocation::Global));
        assert!(tree.get(def_scope).free.is_empty());
    }

    #[test]
    fn params_are_locals_of_the_function_scope() {
        let (expr, tree) = analyze("(begin (def f (a b) (+ a b)))");
        let def_scope = tree.scope_of(nth(&expr, 1).id).unwrap();
        assert_eq!(tree.allocation(def_scope, "a"), Some(Allocation::Local));
        assert_eq!(tree.allocation(def_scope, "f"), Some(Allocation::Local));
    }

    #[test]
    fn undefined_reference_is_fatal() {
        let expr = Parser::parse("(begin missing)").unwrap();
        let globals = GlobalTable::new();
        let err = Analyzer::analyze(&expr, &globals).unwrap_err();
        assert_eq!(err.kind, crate::compiler::CompErrKind::ReferenceErr("missing".to_owned()));
    }

    #[test]
    fn predefined_globals_resolve_without_declarations() {
        let expr = Parser::parse("(begin (square 2))").unwrap();
        let mut globals = GlobalTable::new();
        globals.define("square");
        let tree = Analyzer::analyze(&expr, &globals).unwrap();
        let root = tree.scope_of(expr.id).unwrap();
        assert_eq!(tree.allocation(root, "square"), Some(Allocation::Global));
    }
}
