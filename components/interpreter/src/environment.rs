//! Runtime scope records
//!
//! Scopes the compiler could not keep in registers live here as a chain of
//! records. A declarative record holds bindings by name; an object record
//! exposes the properties of a `with` object. The end of the chain (`None`)
//! is the global object.

use std::cell::RefCell;
use std::rc::Rc;

use bytecode_system::ScopeLayout;
use core_types::Value;
use indexmap::IndexMap;

/// A record chain; `None` is the global object.
pub type Env = Option<Rc<Environment>>;

/// A binding of a declarative record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBinding {
    /// Current value, [`Value::Uninitialized`] before a lexical declaration
    /// has run
    pub value: Value,
    /// Assignments are allowed
    pub mutable: bool,
}

/// Contents of one record.
#[derive(Debug)]
pub enum Record {
    /// Named bindings
    Declarative {
        /// Bindings in declaration order
        bindings: RefCell<IndexMap<String, RecordBinding>>,
        /// Eval code declares its `var`s here
        variable_scope: bool,
    },
    /// Properties of a `with` object
    Object(usize),
}

/// One link of the record chain.
#[derive(Debug)]
pub struct Environment {
    /// The record
    pub record: Record,
    /// Enclosing records
    pub parent: Env,
}

impl Environment {
    /// Creates a declarative record for `layout`: `var` names start as
    /// `undefined`, `let` and `const` names start uninitialized.
    pub fn declarative(layout: &ScopeLayout, parent: Env) -> Rc<Self> {
        let mut bindings = IndexMap::with_capacity(layout.len());
        for name in &layout.vars {
            bindings.insert(
                name.clone(),
                RecordBinding {
                    value: Value::Undefined,
                    mutable: true,
                },
            );
        }
        for name in &layout.lets {
            bindings.insert(
                name.clone(),
                RecordBinding {
                    value: Value::Uninitialized,
                    mutable: true,
                },
            );
        }
        for name in &layout.consts {
            bindings.insert(
                name.clone(),
                RecordBinding {
                    value: Value::Uninitialized,
                    mutable: false,
                },
            );
        }
        Rc::new(Self {
            record: Record::Declarative {
                bindings: RefCell::new(bindings),
                variable_scope: layout.variable_scope,
            },
            parent,
        })
    }

    /// Creates an object record for a `with` statement.
    pub fn object(object: usize, parent: Env) -> Rc<Self> {
        Rc::new(Self {
            record: Record::Object(object),
            parent,
        })
    }

    /// A copy of this record with the same parent. Object records are
    /// shared, not copied.
    pub fn copy(self: &Rc<Self>) -> Rc<Self> {
        match &self.record {
            Record::Declarative {
                bindings,
                variable_scope,
            } => Rc::new(Self {
                record: Record::Declarative {
                    bindings: RefCell::new(bindings.borrow().clone()),
                    variable_scope: *variable_scope,
                },
                parent: self.parent.clone(),
            }),
            Record::Object(_) => Rc::clone(self),
        }
    }

    /// The record `hops` links up the chain.
    pub fn ancestor(self: &Rc<Self>, hops: u32) -> Option<&Rc<Self>> {
        let mut current = self;
        for _ in 0..hops {
            current = current.parent.as_ref()?;
        }
        Some(current)
    }

    /// The binding `name` of a declarative record.
    pub fn binding(&self, name: &str) -> Option<RecordBinding> {
        match &self.record {
            Record::Declarative { bindings, .. } => bindings.borrow().get(name).cloned(),
            Record::Object(_) => None,
        }
    }

    /// Overwrites the value of an existing binding, ignoring mutability.
    /// Returns false when the record has no such binding.
    pub fn initialize(&self, name: &str, value: Value) -> bool {
        match &self.record {
            Record::Declarative { bindings, .. } => match bindings.borrow_mut().get_mut(name) {
                Some(binding) => {
                    binding.value = value;
                    true
                }
                None => false,
            },
            Record::Object(_) => false,
        }
    }

    /// Adds a mutable `undefined` binding unless `name` already exists.
    pub fn declare(&self, name: &str) {
        if let Record::Declarative { bindings, .. } = &self.record {
            bindings
                .borrow_mut()
                .entry(name.to_string())
                .or_insert(RecordBinding {
                    value: Value::Undefined,
                    mutable: true,
                });
        }
    }

    /// Whether eval code declares its `var`s in this record.
    pub fn is_variable_scope(&self) -> bool {
        matches!(
            self.record,
            Record::Declarative {
                variable_scope: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> ScopeLayout {
        ScopeLayout {
            vars: vec!["v".into()],
            lets: vec!["l".into()],
            consts: vec!["c".into()],
            variable_scope: true,
        }
    }

    #[test]
    fn test_layout_initial_states() {
        let env = Environment::declarative(&layout(), None);
        assert_eq!(env.binding("v").unwrap().value, Value::Undefined);
        assert_eq!(env.binding("l").unwrap().value, Value::Uninitialized);
        assert!(!env.binding("c").unwrap().mutable);
        assert!(env.is_variable_scope());
    }

    #[test]
    fn test_ancestor_hops() {
        let outer = Environment::declarative(&layout(), None);
        let inner = Environment::declarative(&ScopeLayout::default(), Some(outer.clone()));
        assert!(Rc::ptr_eq(inner.ancestor(1).unwrap(), &outer));
        assert!(inner.ancestor(2).is_none());
    }

    #[test]
    fn test_copy_detaches_bindings() {
        let env = Environment::declarative(&layout(), None);
        let copy = env.copy();
        copy.initialize("l", Value::Smi(3));
        assert_eq!(env.binding("l").unwrap().value, Value::Uninitialized);
        assert_eq!(copy.binding("l").unwrap().value, Value::Smi(3));
    }

    #[test]
    fn test_declare_keeps_existing() {
        let env = Environment::declarative(&layout(), None);
        env.initialize("v", Value::Smi(1));
        env.declare("v");
        env.declare("fresh");
        assert_eq!(env.binding("v").unwrap().value, Value::Smi(1));
        assert_eq!(env.binding("fresh").unwrap().value, Value::Undefined);
    }
}
