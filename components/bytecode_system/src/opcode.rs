//! Bytecode opcodes for the JavaScript virtual machine
//!
//! The machine is stack based with a per-frame register file. Registers back
//! the variables of scopes that use direct-slot storage as well as compiler
//! temporaries; scopes that use dynamic records are addressed by name and by
//! the number of records between the current one and the target (`hops`).
//!
//! Unless stated otherwise an instruction pops its operands and pushes its
//! result. Variable stores consume the stored value; property stores leave
//! the stored value on the stack as the assignment's result.

use core_types::ErrorKind;

/// Register identifier for local variable slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId(pub u32);

/// Names declared by a scope that is stored as a dynamic record.
///
/// The groups are kept apart because they are initialized differently:
/// `var` names start as `undefined`, `let` and `const` names start
/// uninitialized, and only `const` names are immutable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeLayout {
    /// Names bound with `var`, function declarations, and parameters
    pub vars: Vec<String>,
    /// Names bound with `let` (and catch parameters)
    pub lets: Vec<String>,
    /// Names bound with `const`
    pub consts: Vec<String>,
    /// `var` declarations made by eval code land in this record
    pub variable_scope: bool,
}

impl ScopeLayout {
    /// Total number of names in the layout.
    pub fn len(&self) -> usize {
        self.vars.len() + self.lets.len() + self.consts.len()
    }

    /// Returns true if the layout declares nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The relational primitive behind `<`, `<=`, `>` and `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareKind {
    /// Abstract relational comparison `a < b`
    LessThan,
    /// `a <= b`, computed as the negation of `b < a` with `undefined` as false
    LessThanOrEqual,
}

/// Bytecode opcodes for JavaScript execution
#[derive(Debug, Clone, PartialEq)]
pub enum Opcode {
    // Literals
    /// Load constant from constant pool at given index
    LoadConstant(usize),
    /// Load undefined value
    LoadUndefined,
    /// Load null value
    LoadNull,
    /// Load boolean true
    LoadTrue,
    /// Load boolean false
    LoadFalse,
    /// Load the marker for a binding that has not been initialized yet
    LoadUninitialized,
    /// Create a regular expression object `{ source, flags }`
    CreateRegExp {
        /// Pattern text between the slashes
        pattern: String,
        /// Flag characters after the closing slash
        flags: String,
    },

    // Direct slots
    /// Load local variable from register
    LoadLocal(RegisterId),
    /// Store to local variable in register
    StoreLocal(RegisterId),
    /// Raise a ReferenceError if the top of the stack is the uninitialized
    /// marker (the value is left in place)
    CheckInitialized(String),
    /// Load the n-th argument of the current call, `undefined` if absent
    LoadArgument(u32),
    /// Load the function object being executed
    LoadCallee,
    /// Create the arguments object of the current call: indexed copies of
    /// the actual arguments plus `length`, with no aliasing of parameters
    CreateArguments,
    /// Load the `this` value of the current call
    LoadThis,

    // Dynamic records
    /// Push a declarative record whose parent is the current record
    PushScope(ScopeLayout),
    /// Pop an object and push an object record for `with` over it
    PushWithScope,
    /// Restore the parent of the current record
    PopScope,
    /// Replace the current declarative record with a copy of itself
    /// (fresh per-iteration bindings for loop headers)
    CloneScope,
    /// Push whether the record `hops` levels up has a binding (or, for a
    /// `with` record, a property) called `name`
    ScopeHas {
        /// Records to skip
        hops: u32,
        /// Binding name
        name: String,
    },
    /// Load a binding from the record `hops` levels up
    LoadScoped {
        /// Records to skip
        hops: u32,
        /// Binding name
        name: String,
    },
    /// Assign a binding in the record `hops` levels up
    StoreScoped {
        /// Records to skip
        hops: u32,
        /// Binding name
        name: String,
        /// Strict-mode assignment semantics
        strict: bool,
    },
    /// Initialize a binding in the record `hops` levels up, ending its
    /// uninitialized state
    InitScoped {
        /// Records to skip
        hops: u32,
        /// Binding name
        name: String,
    },
    /// Create a `var` binding in the nearest variable record (function
    /// record or global object) unless it exists; used by eval code
    DeclareVar(String),
    /// Resolve a name against the whole runtime record chain, then the
    /// global object
    LoadName {
        /// Binding name
        name: String,
        /// Throw a ReferenceError if unresolvable, else push undefined
        throw_if_missing: bool,
    },
    /// Assign a name resolved against the whole runtime record chain
    StoreName {
        /// Binding name
        name: String,
        /// Strict-mode assignment semantics
        strict: bool,
    },
    /// Delete an unqualified name (non-strict only); pushes the result
    DeleteName(String),

    // Global object
    /// Load a property of the global object
    LoadGlobal {
        /// Property name
        name: String,
        /// Throw a ReferenceError if absent, else push undefined
        throw_if_missing: bool,
    },
    /// Store a property of the global object; strict stores to absent
    /// properties throw a ReferenceError
    StoreGlobal {
        /// Property name
        name: String,
        /// Strict-mode assignment semantics
        strict: bool,
    },
    /// Declare a global `var` (non-deletable, keeps an existing value)
    DeclareGlobal(String),

    // Conversions and arithmetic
    /// ToNumber
    ToNumber,
    /// Add with the ToPrimitive-driven string/number dispatch
    Add,
    /// ToNumber both operands, subtract
    Sub,
    /// ToNumber both operands, multiply
    Mul,
    /// ToNumber both operands, divide
    Div,
    /// ToNumber both operands, IEEE remainder with the dividend's sign
    Mod,
    /// ToNumber both operands, exponentiation
    Exp,
    /// ToNumber, then negate
    Neg,
    /// ToNumber, then add one
    Inc,
    /// ToNumber, then subtract one
    Dec,
    /// ToBoolean, then logical not
    Not,
    /// ToInt32, then bitwise not
    BitNot,
    /// ToInt32 both operands, bitwise and
    BitAnd,
    /// ToInt32 both operands, bitwise or
    BitOr,
    /// ToInt32 both operands, bitwise xor
    BitXor,
    /// ToInt32 left, ToUint32 right masked to five bits, shift left
    ShiftLeft,
    /// ToInt32 left, ToUint32 right masked to five bits, arithmetic shift
    ShiftRight,
    /// ToUint32 left, ToUint32 right masked to five bits, logical shift
    UnsignedShiftRight,
    /// typeof operator - push type string
    Typeof,

    // Comparison operations
    /// Loose equality (==)
    Equal,
    /// Strict equality (===)
    StrictEqual,
    /// Relational comparison. Operands are always pushed left first; with
    /// `swap` the primitive receives them as `(right, left)`.
    Compare {
        /// The primitive to apply
        kind: CompareKind,
        /// Exchange the operands before applying the primitive
        swap: bool,
    },
    /// Instanceof operator
    Instanceof,
    /// In operator
    In,

    // Control flow
    /// Unconditional jump to offset
    Jump(usize),
    /// Pop, ToBoolean, jump to offset if true
    JumpIfTrue(usize),
    /// Pop, ToBoolean, jump to offset if false
    JumpIfFalse(usize),
    /// Return from current function
    Return,

    // Object operations
    /// Create new empty object
    CreateObject,
    /// Create array with given number of elements (elements are on stack)
    CreateArray(usize),
    /// Pop a value and define it as an own property of the object below it
    /// (the object stays on the stack)
    DefineProperty(String),
    /// Load property from object
    LoadProperty(String),
    /// Store property to object: `[obj, value]` -> `[value]`
    StoreProperty(String),
    /// Get value at computed key: `[obj, key]` -> `[value]`
    GetIndex,
    /// Set value at computed key: `[obj, key, value]` -> `[value]`
    SetIndex,
    /// Delete a computed property: `[obj, key]` -> `[bool]`
    DeleteProperty,
    /// Replace a value with an array of its enumerable property keys
    EnumerateKeys,

    // Function operations
    /// Create closure from the nested function at index, capturing the
    /// current record chain
    CreateClosure(usize),
    /// Call function: `[callee, args...]`, `this` is undefined
    Call(u8),
    /// Call method: `[this, callee, args...]`
    CallMethod(u8),
    /// Call constructor: `[callee, args...]`
    CallNew(u8),
    /// Call that is a direct eval when the callee is the intrinsic eval:
    /// `[callee, args...]`
    CallEval {
        /// Number of arguments
        argc: u8,
        /// Whether the calling code is strict
        strict: bool,
    },

    // Exception handling
    /// Pop value from stack and throw as exception
    Throw,
    /// Throw a new error object of the given kind
    ThrowError {
        /// Error constructor kind
        kind: ErrorKind,
        /// Message text
        message: String,
    },
    /// Push exception handler; on throw, jump to the offset with the
    /// exception value on the stack
    PushTry(usize),
    /// Pop exception handler from try stack
    PopTry,

    // Stack manipulation
    /// Pop value from stack
    Pop,
    /// Duplicate top value on stack
    Dup,
    /// Duplicate the top two values on stack
    Dup2,
}

impl Opcode {
    /// Check if this opcode is a terminator (ends basic block)
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Return
                | Opcode::Jump(_)
                | Opcode::JumpIfTrue(_)
                | Opcode::JumpIfFalse(_)
                | Opcode::Throw
                | Opcode::ThrowError { .. }
        )
    }

    /// Check if this opcode is an unconditional terminator
    pub fn is_unconditional_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Return | Opcode::Jump(_) | Opcode::Throw | Opcode::ThrowError { .. }
        )
    }

    /// Jump target of a branch instruction.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Opcode::Jump(t) | Opcode::JumpIfTrue(t) | Opcode::JumpIfFalse(t) | Opcode::PushTry(t) => {
                Some(*t)
            }
            _ => None,
        }
    }

    /// Check if this opcode is a numeric binary operation (both operands
    /// go through ToNumber or ToInt32/ToUint32)
    pub fn is_numeric_binary(&self) -> bool {
        matches!(
            self,
            Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Exp
                | Opcode::BitAnd
                | Opcode::BitOr
                | Opcode::BitXor
                | Opcode::ShiftLeft
                | Opcode::ShiftRight
                | Opcode::UnsignedShiftRight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminators() {
        assert!(Opcode::Return.is_terminator());
        assert!(Opcode::JumpIfFalse(3).is_terminator());
        assert!(!Opcode::JumpIfFalse(3).is_unconditional_terminator());
        assert!(Opcode::ThrowError {
            kind: ErrorKind::ReferenceError,
            message: "Invalid assignment target".into(),
        }
        .is_unconditional_terminator());
        assert!(!Opcode::Add.is_terminator());
    }

    #[test]
    fn test_jump_target() {
        assert_eq!(Opcode::PushTry(9).jump_target(), Some(9));
        assert_eq!(Opcode::Pop.jump_target(), None);
    }

    #[test]
    fn test_scope_layout_len() {
        let layout = ScopeLayout {
            vars: vec!["a".into()],
            lets: vec!["b".into(), "c".into()],
            consts: vec![],
            variable_scope: false,
        };
        assert_eq!(layout.len(), 3);
        assert!(!layout.is_empty());
        assert!(ScopeLayout::default().is_empty());
    }
}
