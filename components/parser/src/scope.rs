//! Scope management
//!
//! Scopes form a tree rooted at the Global or Eval scope of a compilation
//! unit. The parser records declarations and references while it reads the
//! source; once the unit is parsed, capture analysis marks the scopes whose
//! variables are referenced from nested functions. The code generator then
//! asks each scope, once, how its variables are stored:
//!
//! - **direct slots**: every variable lives in a register of the current
//!   frame. Only Block and TopLevelFunction scopes without `with`, direct
//!   `eval` or captured variables qualify.
//! - **dynamic record**: the variables live in a runtime record chained to
//!   the enclosing record and are looked up by name and hop count.

use std::collections::HashSet;
use std::rc::Rc;

use bytecode_system::{RegisterId, ScopeLayout};
use core_types::{ErrorKind, JsError, SourcePosition};
use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use tracing::debug;

use crate::ast::{FunctionLiteral, StaticType};
use crate::error::syntax_error;

/// Index of a scope in its [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

/// Scope kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Program code
    Global,
    /// Non-strict direct eval code
    Eval,
    /// Strict direct eval code
    EvalStrict,
    /// A function body
    TopLevelFunction,
    /// `{ }`, loop headers, catch clauses, switch bodies
    Block,
    /// The body of a `with` statement
    With,
}

impl ScopeKind {
    /// Scopes that `var` declarations bind in.
    pub fn is_var_target(&self) -> bool {
        !matches!(self, ScopeKind::Block | ScopeKind::With)
    }
}

/// How a variable was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `var`
    Var,
    /// `let`
    Let,
    /// `const`
    Const,
    /// Function declaration
    Function,
    /// Function parameter
    Parameter,
    /// `catch` parameter
    CatchParameter,
    /// A function expression's own name
    FunctionName,
}

impl DeclarationKind {
    /// `let` and `const` bindings have a temporal dead zone and may not be
    /// redeclared.
    pub fn is_lexical(&self) -> bool {
        matches!(self, DeclarationKind::Let | DeclarationKind::Const)
    }

    /// Bindings that may not be assigned after initialization.
    pub fn is_immutable(&self) -> bool {
        matches!(self, DeclarationKind::Const | DeclarationKind::FunctionName)
    }
}

/// A declared variable
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredVariable {
    /// Scope the variable is bound in
    pub scope: ScopeId,
    /// Insertion index within the scope
    pub index: usize,
    /// Declaration keyword
    pub kind: DeclarationKind,
    /// Name
    pub name: String,
    /// Inferred type
    pub static_type: StaticType,
    /// Declaration site
    pub position: Option<SourcePosition>,
}

/// Storage decided for a scope's variables.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageStrategy {
    /// One register per variable
    DirectSlots {
        /// Register of each variable
        registers: IndexMap<String, RegisterId>,
    },
    /// A runtime record chained to the enclosing one
    DynamicRecord {
        /// Names held by the record
        layout: ScopeLayout,
        /// Whether entering the scope pushes a record at runtime
        pushes_record: bool,
    },
}

impl StorageStrategy {
    /// True for the direct-slot strategy.
    pub fn is_direct(&self) -> bool {
        matches!(self, StorageStrategy::DirectSlots { .. })
    }
}

/// Where a name lives, as seen from one scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A register of the current frame
    Slot {
        /// Register
        register: RegisterId,
        /// Declaration kind
        kind: DeclarationKind,
    },
    /// A record `hops` levels up the runtime chain
    Record {
        /// Records to skip
        hops: u32,
        /// Declaration kind
        kind: DeclarationKind,
    },
    /// A property of the global object
    Global,
    /// Unknown until run time: search the whole runtime chain
    Dynamic,
}

/// Result of resolving a name.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Records (by hop count) that may hold the name only at run time and
    /// must be checked first, innermost first
    pub object_checks: Vec<u32>,
    /// Where the name lives when no checked record holds it
    pub binding: Binding,
}

/// A single scope
#[derive(Debug, Clone)]
pub struct Scope {
    /// Scope kind
    pub kind: ScopeKind,
    /// Enclosing scope
    pub parent: Option<ScopeId>,
    /// Declared variables in declaration order
    pub variables: IndexMap<String, DeclaredVariable>,
    /// Function declarations materialized on entry, in declaration order
    pub hoisted_functions: Vec<Rc<FunctionLiteral>>,
    /// A `with` statement appears in this scope or below it in the same function
    pub contains_with: bool,
    /// A direct `eval` appears in this scope or any scope below it
    pub contains_direct_eval: bool,
    /// A variable of this scope is referenced from a nested function
    pub has_captures: bool,
    hoisted_through: HashSet<String>,
    strategy: OnceCell<StorageStrategy>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            parent,
            variables: IndexMap::new(),
            hoisted_functions: Vec::new(),
            contains_with: false,
            contains_direct_eval: false,
            has_captures: false,
            hoisted_through: HashSet::new(),
            strategy: OnceCell::new(),
        }
    }

    /// The decided storage strategy, if any.
    pub fn strategy(&self) -> Option<&StorageStrategy> {
        self.strategy.get()
    }
}

/// Tree of every scope of a compilation unit
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    references: Vec<(String, ScopeId)>,
    disable_slots: bool,
}

impl ScopeTree {
    /// Creates a tree holding only a root scope of the given kind.
    pub fn new(root_kind: ScopeKind) -> Self {
        Self {
            scopes: vec![Scope::new(root_kind, None)],
            references: Vec::new(),
            disable_slots: false,
        }
    }

    /// Forces every scope onto the dynamic-record strategy.
    pub fn disable_slot_optimization(&mut self, disable: bool) {
        self.disable_slots = disable;
    }

    /// The root scope.
    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Looks up a scope.
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Creates a child scope.
    pub fn create_scope(&mut self, kind: ScopeKind, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope::new(kind, Some(parent)));
        id
    }

    /// Changes a scope's kind (used when eval code turns out to be strict).
    pub fn set_kind(&mut self, id: ScopeId, kind: ScopeKind) {
        self.scopes[id.0].kind = kind;
    }

    /// The nearest enclosing scope that `var` declarations bind in.
    pub fn var_scope_of(&self, from: ScopeId) -> ScopeId {
        let mut current = from;
        loop {
            let scope = &self.scopes[current.0];
            match scope.parent {
                Some(parent) if !scope.kind.is_var_target() => current = parent,
                _ => return current,
            }
        }
    }

    /// Declares a `var`-style name (var, function, parameter), hoisting it
    /// past Block and With scopes. Returns the scope it was bound in.
    pub fn declare_var(
        &mut self,
        from: ScopeId,
        name: &str,
        kind: DeclarationKind,
        position: Option<SourcePosition>,
    ) -> Result<ScopeId, JsError> {
        let target = self.var_scope_of(from);

        let mut current = from;
        while current != target {
            let scope = &mut self.scopes[current.0];
            if let Some(existing) = scope.variables.get(name) {
                if existing.kind.is_lexical() {
                    return Err(already_declared(name, position));
                }
            }
            scope.hoisted_through.insert(name.to_string());
            match scope.parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let scope = &mut self.scopes[target.0];
        if let Some(existing) = scope.variables.get_mut(name) {
            if existing.kind.is_lexical() {
                return Err(already_declared(name, position));
            }
            if kind == DeclarationKind::Function {
                existing.kind = DeclarationKind::Function;
            }
            return Ok(target);
        }
        insert_variable(scope, target, name, kind, position);
        Ok(target)
    }

    /// Declares a name directly in `scope` (let, const, catch parameter,
    /// function name, block-level function in strict code). Any existing
    /// declaration of the name in the same scope is an error.
    pub fn declare_lexical(
        &mut self,
        scope_id: ScopeId,
        name: &str,
        kind: DeclarationKind,
        position: Option<SourcePosition>,
    ) -> Result<(), JsError> {
        let scope = &mut self.scopes[scope_id.0];
        if scope.variables.contains_key(name) || scope.hoisted_through.contains(name) {
            return Err(already_declared(name, position));
        }
        insert_variable(scope, scope_id, name, kind, position);
        Ok(())
    }

    /// Declares a function parameter. Repeated names share one binding.
    pub fn declare_parameter(&mut self, scope_id: ScopeId, name: &str, position: Option<SourcePosition>) {
        let scope = &mut self.scopes[scope_id.0];
        if !scope.variables.contains_key(name) {
            insert_variable(scope, scope_id, name, DeclarationKind::Parameter, position);
        }
    }

    /// Records a function declaration to materialize on entry to `scope`.
    pub fn add_hoisted_function(&mut self, scope: ScopeId, function: Rc<FunctionLiteral>) {
        self.scopes[scope.0].hoisted_functions.push(function);
    }

    /// Records a reference to `name` from `scope` for capture analysis.
    pub fn record_reference(&mut self, scope: ScopeId, name: &str) {
        self.references.push((name.to_string(), scope));
    }

    /// Drops the most recent reference if it names `name` (a label that was
    /// first read as an identifier).
    pub fn retract_reference(&mut self, name: &str) {
        if self.references.last().is_some_and(|(last, _)| last == name) {
            self.references.pop();
        }
    }

    /// Marks a `with` statement: every scope up to the enclosing function
    /// loses direct storage.
    pub fn mark_with(&mut self, from: ScopeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = &mut self.scopes[id.0];
            scope.contains_with = true;
            if scope.kind.is_var_target() {
                break;
            }
            current = scope.parent;
        }
    }

    /// Marks a direct `eval`: eval code may name any enclosing variable, so
    /// every ancestor up to the root loses direct storage.
    pub fn mark_direct_eval(&mut self, from: ScopeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let scope = &mut self.scopes[id.0];
            scope.contains_direct_eval = true;
            current = scope.parent;
        }
    }

    /// Resolves recorded references and marks scopes whose variables are
    /// used across a function boundary.
    pub fn finalize(&mut self) {
        let references = std::mem::take(&mut self.references);
        for (name, from) in &references {
            let mut current = Some(*from);
            let mut crossed_function = false;
            while let Some(id) = current {
                let scope = &mut self.scopes[id.0];
                if scope.variables.contains_key(name) {
                    if crossed_function {
                        scope.has_captures = true;
                    }
                    break;
                }
                if scope.kind == ScopeKind::TopLevelFunction {
                    crossed_function = true;
                }
                current = scope.parent;
            }
        }
        self.references = references;
    }

    fn slot_eligible(&self, id: ScopeId) -> bool {
        let scope = &self.scopes[id.0];
        !self.disable_slots
            && matches!(scope.kind, ScopeKind::Block | ScopeKind::TopLevelFunction)
            && !scope.contains_with
            && !scope.contains_direct_eval
            && !scope.has_captures
    }

    /// Decides how the variables of `id` are stored. The first call fixes the
    /// decision; later calls return it unchanged. `allocate_register` is
    /// called once per variable when direct slots are chosen.
    pub fn decide_storage(
        &self,
        id: ScopeId,
        allocate_register: &mut dyn FnMut() -> RegisterId,
    ) -> &StorageStrategy {
        let scope = &self.scopes[id.0];
        scope.strategy.get_or_init(|| {
            let strategy = if self.slot_eligible(id) {
                let registers = scope
                    .variables
                    .keys()
                    .map(|name| (name.clone(), allocate_register()))
                    .collect();
                StorageStrategy::DirectSlots { registers }
            } else {
                StorageStrategy::DynamicRecord {
                    layout: self.record_layout(id),
                    pushes_record: self.pushes_record(id),
                }
            };
            debug!(
                scope = id.0,
                kind = ?scope.kind,
                direct = strategy.is_direct(),
                variables = scope.variables.len(),
                "decided scope storage"
            );
            strategy
        })
    }

    /// Names a dynamic record for `id` holds, grouped by initialization rule.
    fn record_layout(&self, id: ScopeId) -> ScopeLayout {
        let scope = &self.scopes[id.0];
        let mut layout = ScopeLayout {
            variable_scope: matches!(scope.kind, ScopeKind::TopLevelFunction | ScopeKind::EvalStrict),
            ..ScopeLayout::default()
        };
        for var in scope.variables.values() {
            if !holds_in_record(scope.kind, var.kind) {
                continue;
            }
            match var.kind {
                DeclarationKind::Var | DeclarationKind::Function | DeclarationKind::Parameter => {
                    layout.vars.push(var.name.clone())
                }
                DeclarationKind::Let | DeclarationKind::CatchParameter => {
                    layout.lets.push(var.name.clone())
                }
                DeclarationKind::Const | DeclarationKind::FunctionName => {
                    layout.consts.push(var.name.clone())
                }
            }
        }
        layout
    }

    fn pushes_record(&self, id: ScopeId) -> bool {
        let scope = &self.scopes[id.0];
        match scope.kind {
            ScopeKind::Global | ScopeKind::Eval => scope
                .variables
                .values()
                .any(|var| holds_in_record(scope.kind, var.kind)),
            ScopeKind::EvalStrict | ScopeKind::Block => !scope.variables.is_empty(),
            ScopeKind::TopLevelFunction | ScopeKind::With => true,
        }
    }

    /// Resolves `name` as seen from `from`. Every scope on the way must have
    /// had its storage decided.
    pub fn resolve(&self, from: ScopeId, name: &str) -> Result<Resolution, JsError> {
        let mut object_checks = Vec::new();
        let mut hops = 0u32;
        let mut current = from;

        loop {
            let scope = &self.scopes[current.0];
            let strategy = scope.strategy.get().ok_or_else(|| {
                JsError::new(
                    ErrorKind::InternalError,
                    format!("storage of scope {} used before it was decided", current.0),
                )
            })?;

            let mut found = None;
            match strategy {
                StorageStrategy::DirectSlots { registers } => {
                    if let (Some(register), Some(var)) = (registers.get(name), scope.variables.get(name)) {
                        found = Some(Binding::Slot {
                            register: *register,
                            kind: var.kind,
                        });
                    }
                }
                StorageStrategy::DynamicRecord { pushes_record, .. } => {
                    if scope.kind == ScopeKind::With {
                        object_checks.push(hops);
                        hops += 1;
                    } else if let Some(var) = scope.variables.get(name) {
                        found = Some(if holds_in_record(scope.kind, var.kind) {
                            Binding::Record { hops, kind: var.kind }
                        } else if scope.kind == ScopeKind::Global {
                            Binding::Global
                        } else {
                            Binding::Dynamic
                        });
                    } else if *pushes_record {
                        if scope.contains_direct_eval && scope.kind == ScopeKind::TopLevelFunction {
                            object_checks.push(hops);
                        }
                        hops += 1;
                    }
                }
            }
            if let Some(binding) = found {
                return Ok(Resolution { object_checks, binding });
            }

            match scope.parent {
                Some(parent) => current = parent,
                None => {
                    let binding = match scope.kind {
                        ScopeKind::Eval | ScopeKind::EvalStrict => Binding::Dynamic,
                        _ => Binding::Global,
                    };
                    return Ok(Resolution { object_checks, binding });
                }
            }
        }
    }
}

/// Whether a dynamic record of a `scope_kind` scope holds a variable of
/// `kind`. Global `var`s live on the global object and non-strict eval
/// `var`s in the caller's variable record.
fn holds_in_record(scope_kind: ScopeKind, kind: DeclarationKind) -> bool {
    match scope_kind {
        ScopeKind::Global | ScopeKind::Eval => kind.is_lexical(),
        _ => true,
    }
}

fn insert_variable(
    scope: &mut Scope,
    scope_id: ScopeId,
    name: &str,
    kind: DeclarationKind,
    position: Option<SourcePosition>,
) {
    let index = scope.variables.len();
    scope.variables.insert(
        name.to_string(),
        DeclaredVariable {
            scope: scope_id,
            index,
            kind,
            name: name.to_string(),
            static_type: StaticType::Any,
            position,
        },
    );
}

fn already_declared(name: &str, position: Option<SourcePosition>) -> JsError {
    syntax_error(format!("Identifier '{}' has already been declared", name), position)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocator() -> impl FnMut() -> RegisterId {
        let mut next = 0;
        move || {
            next += 1;
            RegisterId(next - 1)
        }
    }

    fn decide_all(tree: &ScopeTree) {
        let mut alloc = allocator();
        for i in 0..tree.len() {
            tree.decide_storage(ScopeId(i), &mut alloc);
        }
    }

    #[test]
    fn test_var_hoists_past_blocks() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let func = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        let block = tree.create_scope(ScopeKind::Block, func);
        let target = tree
            .declare_var(block, "x", DeclarationKind::Var, None)
            .unwrap();
        assert_eq!(target, func);
        assert!(tree.get(func).variables.contains_key("x"));
        assert!(!tree.get(block).variables.contains_key("x"));
    }

    #[test]
    fn test_var_redeclaration_is_noop() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let root = tree.root();
        tree.declare_var(root, "x", DeclarationKind::Var, None).unwrap();
        tree.declare_var(root, "x", DeclarationKind::Var, None).unwrap();
        assert_eq!(tree.get(root).variables.len(), 1);
    }

    #[test]
    fn test_duplicate_let_is_error() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let block = tree.create_scope(ScopeKind::Block, tree.root());
        tree.declare_lexical(block, "a", DeclarationKind::Let, None).unwrap();
        let err = tree
            .declare_lexical(block, "a", DeclarationKind::Const, None)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SyntaxError);
    }

    #[test]
    fn test_var_conflicting_with_block_let() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let block = tree.create_scope(ScopeKind::Block, tree.root());
        tree.declare_lexical(block, "a", DeclarationKind::Let, None).unwrap();
        assert!(tree.declare_var(block, "a", DeclarationKind::Var, None).is_err());

        let other = tree.create_scope(ScopeKind::Block, tree.root());
        tree.declare_var(other, "b", DeclarationKind::Var, None).unwrap();
        assert!(tree.declare_lexical(other, "b", DeclarationKind::Let, None).is_err());
    }

    #[test]
    fn test_var_may_pass_catch_parameter() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let catch = tree.create_scope(ScopeKind::Block, tree.root());
        tree.declare_lexical(catch, "e", DeclarationKind::CatchParameter, None)
            .unwrap();
        let target = tree.declare_var(catch, "e", DeclarationKind::Var, None).unwrap();
        assert_eq!(target, tree.root());
    }

    #[test]
    fn test_uncaptured_function_scope_uses_slots() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let func = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        tree.declare_var(func, "a", DeclarationKind::Var, None).unwrap();
        tree.record_reference(func, "a");
        tree.finalize();
        decide_all(&tree);

        let resolution = tree.resolve(func, "a").unwrap();
        assert!(resolution.object_checks.is_empty());
        assert!(matches!(resolution.binding, Binding::Slot { .. }));
        assert_eq!(tree.resolve(func, "missing").unwrap().binding, Binding::Global);
    }

    #[test]
    fn test_captured_variable_forces_record() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let outer = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        let inner = tree.create_scope(ScopeKind::TopLevelFunction, outer);
        tree.declare_var(outer, "a", DeclarationKind::Var, None).unwrap();
        tree.record_reference(inner, "a");
        tree.finalize();
        decide_all(&tree);

        assert!(tree.get(outer).has_captures);
        assert!(!tree.get(outer).strategy().unwrap().is_direct());
        assert_eq!(
            tree.resolve(inner, "a").unwrap().binding,
            Binding::Record {
                hops: 0,
                kind: DeclarationKind::Var
            }
        );
        assert!(tree.get(inner).strategy().unwrap().is_direct());
    }

    #[test]
    fn test_decision_is_cached() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let func = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        tree.declare_var(func, "a", DeclarationKind::Var, None).unwrap();
        let mut alloc = allocator();
        let first = tree.decide_storage(func, &mut alloc).clone();
        let second = tree.decide_storage(func, &mut alloc).clone();
        assert_eq!(first, second);
    }

    #[test]
    fn test_with_checks_before_outer_binding() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let root = tree.root();
        tree.declare_var(root, "x", DeclarationKind::Var, None).unwrap();
        let with = tree.create_scope(ScopeKind::With, root);
        tree.mark_with(with);
        decide_all(&tree);

        let resolution = tree.resolve(with, "x").unwrap();
        assert_eq!(resolution.object_checks, vec![0]);
        assert_eq!(resolution.binding, Binding::Global);
    }

    #[test]
    fn test_eval_poisons_all_ancestors() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let outer = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        let inner = tree.create_scope(ScopeKind::TopLevelFunction, outer);
        let block = tree.create_scope(ScopeKind::Block, inner);
        tree.mark_direct_eval(block);
        assert!(tree.get(outer).contains_direct_eval);
        assert!(tree.get(tree.root()).contains_direct_eval);

        tree.declare_var(inner, "v", DeclarationKind::Var, None).unwrap();
        decide_all(&tree);
        // the function record may gain eval-declared names at run time
        let resolution = tree.resolve(block, "w").unwrap();
        assert_eq!(resolution.object_checks, vec![0, 1]);
    }

    #[test]
    fn test_global_lexical_lives_in_record() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        let root = tree.root();
        tree.declare_lexical(root, "l", DeclarationKind::Let, None).unwrap();
        tree.declare_var(root, "v", DeclarationKind::Var, None).unwrap();
        decide_all(&tree);

        assert_eq!(
            tree.resolve(root, "l").unwrap().binding,
            Binding::Record {
                hops: 0,
                kind: DeclarationKind::Let
            }
        );
        assert_eq!(tree.resolve(root, "v").unwrap().binding, Binding::Global);
        match tree.get(root).strategy().unwrap() {
            StorageStrategy::DynamicRecord { layout, pushes_record } => {
                assert!(*pushes_record);
                assert_eq!(layout.lets, vec!["l"]);
                assert!(layout.vars.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_disabled_slots() {
        let mut tree = ScopeTree::new(ScopeKind::Global);
        tree.disable_slot_optimization(true);
        let func = tree.create_scope(ScopeKind::TopLevelFunction, tree.root());
        tree.declare_var(func, "a", DeclarationKind::Var, None).unwrap();
        decide_all(&tree);
        assert!(!tree.get(func).strategy().unwrap().is_direct());
    }

    #[test]
    fn test_resolve_before_decision_is_internal_error() {
        let tree = ScopeTree::new(ScopeKind::Global);
        let err = tree.resolve(tree.root(), "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InternalError);
    }
}
