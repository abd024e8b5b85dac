//! Object heap
//!
//! Objects live in an arena and are referenced from [`Value::HeapObject`] by
//! index. Nothing is ever collected; a heap lives as long as its VM.

use std::rc::Rc;

use bytecode_system::FunctionTemplate;
use core_types::{ErrorKind, Value};
use indexmap::IndexMap;

use crate::environment::Env;

/// A property of an object.
#[derive(Debug, Clone)]
pub struct Property {
    /// Current value
    pub value: Value,
    /// Visited by `for-in`
    pub enumerable: bool,
    /// Removable with `delete`
    pub configurable: bool,
}

impl Property {
    /// An ordinary enumerable, deletable data property.
    pub fn data(value: Value) -> Self {
        Self {
            value,
            enumerable: true,
            configurable: true,
        }
    }

    /// A property hidden from enumeration.
    pub fn hidden(value: Value) -> Self {
        Self {
            value,
            enumerable: false,
            configurable: true,
        }
    }
}

/// Functions implemented by the VM itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFunction {
    /// The intrinsic `eval`
    Eval,
    /// An error constructor; `None` is the plain `Error`
    ErrorConstructor(Option<ErrorKind>),
}

/// What kind of object a heap entry is.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array; indexed elements are stored as properties and `length` is
    /// kept in step
    Array,
    /// Script function closing over the record chain it was created in
    Closure {
        /// Compiled body
        template: Rc<FunctionTemplate>,
        /// Records visible to the body
        env: Env,
    },
    /// VM-implemented function
    Native(NativeFunction),
    /// Error instance
    Error,
    /// Regular expression literal (no matching engine)
    RegExp,
}

/// A heap object.
#[derive(Debug, Clone)]
pub struct JsObject {
    /// Kind of object
    pub kind: ObjectKind,
    /// Own properties in insertion order
    pub properties: IndexMap<String, Property>,
    /// Prototype, if any
    pub prototype: Option<usize>,
}

impl JsObject {
    /// Creates an object with no properties.
    pub fn new(kind: ObjectKind, prototype: Option<usize>) -> Self {
        Self {
            kind,
            properties: IndexMap::new(),
            prototype,
        }
    }

    /// Returns true for closures and native functions.
    pub fn is_callable(&self) -> bool {
        matches!(self.kind, ObjectKind::Closure { .. } | ObjectKind::Native(_))
    }
}

/// Arena of heap objects.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<JsObject>,
}

impl Heap {
    /// Creates an empty heap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates an object and returns its id.
    pub fn allocate(&mut self, object: JsObject) -> usize {
        self.objects.push(object);
        self.objects.len() - 1
    }

    /// Number of live objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if nothing was allocated.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Looks up an object.
    pub fn get(&self, id: usize) -> Option<&JsObject> {
        self.objects.get(id)
    }

    /// Looks up an object mutably.
    pub fn get_mut(&mut self, id: usize) -> Option<&mut JsObject> {
        self.objects.get_mut(id)
    }

    /// Finds a property on the object or its prototype chain.
    pub fn lookup(&self, id: usize, key: &str) -> Option<&Property> {
        let mut current = Some(id);
        while let Some(id) = current {
            let object = self.objects.get(id)?;
            if let Some(property) = object.properties.get(key) {
                return Some(property);
            }
            current = object.prototype;
        }
        None
    }

    /// `[[Get]]`: the property's value, `undefined` when absent.
    pub fn get_property(&self, id: usize, key: &str) -> Value {
        self.lookup(id, key)
            .map(|p| p.value.clone())
            .unwrap_or(Value::Undefined)
    }

    /// `[[HasProperty]]`.
    pub fn has_property(&self, id: usize, key: &str) -> bool {
        self.lookup(id, key).is_some()
    }

    /// `[[Set]]` of an own data property. Arrays grow their `length` when
    /// an index at or past the end is written.
    pub fn set_property(&mut self, id: usize, key: &str, value: Value) {
        let Some(object) = self.objects.get_mut(id) else {
            return;
        };
        match object.properties.get_mut(key) {
            Some(property) => property.value = value,
            None => {
                object
                    .properties
                    .insert(key.to_string(), Property::data(value));
            }
        }

        if matches!(object.kind, ObjectKind::Array) {
            if let Ok(index) = key.parse::<u32>() {
                let length = object
                    .properties
                    .get("length")
                    .and_then(|p| p.value.as_number())
                    .unwrap_or(0.0);
                if f64::from(index) >= length {
                    object.properties.insert(
                        "length".to_string(),
                        Property {
                            value: Value::number(f64::from(index) + 1.0),
                            enumerable: false,
                            configurable: false,
                        },
                    );
                }
            }
        }
    }

    /// Defines an own property with explicit attributes.
    pub fn define_property(&mut self, id: usize, key: &str, property: Property) {
        if let Some(object) = self.objects.get_mut(id) {
            object.properties.insert(key.to_string(), property);
        }
    }

    /// `[[Delete]]`: false only for a non-configurable own property.
    pub fn delete_property(&mut self, id: usize, key: &str) -> bool {
        let Some(object) = self.objects.get_mut(id) else {
            return true;
        };
        match object.properties.get(key) {
            Some(property) if !property.configurable => false,
            Some(_) => {
                object.properties.shift_remove(key);
                true
            }
            None => true,
        }
    }

    /// Enumerable string keys of the object and its prototypes, own keys
    /// first, each name once.
    pub fn enumerable_keys(&self, id: usize) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(object) = self.objects.get(id) else {
                break;
            };
            for (key, property) in &object.properties {
                if seen.insert(key.clone()) && property.enumerable {
                    keys.push(key.clone());
                }
            }
            current = object.prototype;
        }
        keys
    }

    /// Walks the prototype chain of `id` looking for `prototype`.
    pub fn inherits_from(&self, id: usize, prototype: usize) -> bool {
        let mut current = self.objects.get(id).and_then(|o| o.prototype);
        while let Some(id) = current {
            if id == prototype {
                return true;
            }
            current = self.objects.get(id).and_then(|o| o.prototype);
        }
        false
    }
}
