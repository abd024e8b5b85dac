//! Abstract Syntax Tree node definitions
//!
//! Operator expressions are uniform: one node type holds the operator
//! descriptor and an ordered operand list, so the expression parser can
//! splice nodes without knowing what each operator means.

use std::rc::Rc;

use core_types::{SourcePosition, SourceSpan};

use crate::context::OptimizationHints;
use crate::operators::{Operator, OperatorKind};
use crate::scope::{ScopeId, ScopeTree};

/// Statically known type of an expression's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum StaticType {
    /// Unknown
    #[default]
    Any,
    /// Always undefined
    Undefined,
    /// Always null
    Null,
    /// Always a boolean
    Boolean,
    /// Always a number
    Number,
    /// A number known to be a signed 32-bit integer
    Int32,
    /// A number known to be an unsigned 32-bit integer
    UInt32,
    /// Always a string
    String,
    /// Always an object
    Object,
}

impl StaticType {
    /// True for every numeric type.
    pub fn is_numeric(&self) -> bool {
        matches!(self, StaticType::Number | StaticType::Int32 | StaticType::UInt32)
    }

    /// True when the value is known to be a primitive.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, StaticType::Any | StaticType::Object)
    }
}

/// Literal values
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// null
    Null,
    /// true / false
    Boolean(bool),
    /// Number literal
    Number(f64),
    /// String literal
    String(String),
}

/// JavaScript expressions
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Literal {
        /// Value
        value: LiteralValue,
        /// Source location
        position: SourcePosition,
    },

    /// Identifier reference
    Identifier {
        /// Referenced name
        name: String,
        /// Scope the reference appears in
        scope: ScopeId,
        /// Source location
        position: SourcePosition,
    },

    /// this
    This {
        /// Source location
        position: SourcePosition,
    },

    /// Array literal; `None` entries are elisions
    Array {
        /// Elements
        elements: Vec<Option<Expression>>,
        /// Source location
        position: SourcePosition,
    },

    /// Object literal
    Object {
        /// Properties in source order
        properties: Vec<ObjectProperty>,
        /// Source location
        position: SourcePosition,
    },

    /// Function expression
    Function {
        /// The function
        function: Rc<FunctionLiteral>,
        /// Source location
        position: SourcePosition,
    },

    /// Template literal; `quasis` has one more entry than `expressions`
    Template {
        /// Cooked string parts
        quasis: Vec<String>,
        /// Substitutions
        expressions: Vec<Expression>,
        /// Source location
        position: SourcePosition,
    },

    /// Regular expression literal
    RegExp {
        /// Pattern text
        pattern: String,
        /// Flags
        flags: String,
        /// Source location
        position: SourcePosition,
    },

    /// Operator application
    Operator(OperatorExpression),
}

/// A property of an object literal
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    /// Property key (identifier names and numbers are stringified)
    pub key: String,
    /// Property value
    pub value: Expression,
}

/// An operator applied to its operands.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorExpression {
    /// Operator descriptor from the operator table
    pub operator: &'static Operator,
    /// Operands in source order. Calls hold the callee followed by the
    /// arguments; member access holds the object and a string literal.
    pub operands: Vec<Expression>,
    /// The secondary token of a two-part operator has been seen
    pub closed: bool,
    /// Position of the operator token
    pub position: SourcePosition,
}

impl OperatorExpression {
    /// Creates a node with no operands yet.
    pub fn new(operator: &'static Operator, position: SourcePosition) -> Self {
        Self {
            operator,
            operands: Vec::new(),
            closed: false,
            position,
        }
    }

    /// The operator's kind.
    pub fn kind(&self) -> OperatorKind {
        self.operator.kind
    }

    /// A node that no later operator may take operands from: a postfix
    /// update, a closed grouping, call or index, or `new` applied to a
    /// closed call.
    pub fn is_sealed(&self) -> bool {
        if self.operator.is_postfix() {
            return true;
        }
        if self.closed && !self.operator.has_operand_after_secondary {
            return true;
        }
        if self.operator.kind == OperatorKind::New {
            if let Some(Expression::Operator(inner)) = self.operands.first() {
                return inner.operator.kind == OperatorKind::FunctionCall && inner.closed;
            }
        }
        false
    }

    /// Whether the node can take another operand right now.
    pub fn accepts_operand(&self) -> bool {
        if self.is_sealed() {
            return false;
        }
        if self.operator.secondary.is_some() && !self.closed {
            return true;
        }
        self.operands.len() < self.operator.max_operands
    }
}

impl Expression {
    /// Source position of the expression.
    pub fn position(&self) -> SourcePosition {
        match self {
            Expression::Literal { position, .. }
            | Expression::Identifier { position, .. }
            | Expression::This { position }
            | Expression::Array { position, .. }
            | Expression::Object { position, .. }
            | Expression::Function { position, .. }
            | Expression::Template { position, .. }
            | Expression::RegExp { position, .. } => *position,
            Expression::Operator(op) => op.position,
        }
    }

    /// The operator node, if this is one.
    pub fn as_operator(&self) -> Option<&OperatorExpression> {
        match self {
            Expression::Operator(op) => Some(op),
            _ => None,
        }
    }

    /// Returns true for an operator node of the given kind.
    pub fn is_operator(&self, kind: OperatorKind) -> bool {
        matches!(self, Expression::Operator(op) if op.operator.kind == kind)
    }

    /// Strips any number of grouping parentheses.
    pub fn ungrouped(&self) -> &Expression {
        match self {
            Expression::Operator(op) if op.operator.kind == OperatorKind::Grouping => {
                op.operands.first().map_or(self, Expression::ungrouped)
            }
            _ => self,
        }
    }

    /// Simple names and property accesses can be assigned to.
    pub fn is_referenceable(&self) -> bool {
        match self.ungrouped() {
            Expression::Identifier { .. } => true,
            Expression::Operator(op) => matches!(
                op.operator.kind,
                OperatorKind::MemberAccess | OperatorKind::Index
            ),
            _ => false,
        }
    }

    /// Static type of the value this expression produces.
    pub fn result_type(&self) -> StaticType {
        match self {
            Expression::Literal { value, .. } => match value {
                LiteralValue::Null => StaticType::Null,
                LiteralValue::Boolean(_) => StaticType::Boolean,
                LiteralValue::Number(n) if n.fract() == 0.0 && n.abs() < 2147483648.0 => {
                    StaticType::Int32
                }
                LiteralValue::Number(_) => StaticType::Number,
                LiteralValue::String(_) => StaticType::String,
            },
            Expression::Template { .. } => StaticType::String,
            Expression::Array { .. }
            | Expression::Object { .. }
            | Expression::Function { .. }
            | Expression::RegExp { .. } => StaticType::Object,
            Expression::Identifier { .. } | Expression::This { .. } => StaticType::Any,
            Expression::Operator(op) => operator_result_type(op),
        }
    }
}

fn operator_result_type(op: &OperatorExpression) -> StaticType {
    use OperatorKind as K;
    let operand = |i: usize| {
        op.operands
            .get(i)
            .map_or(StaticType::Any, Expression::result_type)
    };
    match op.operator.kind {
        K::Add => {
            let (left, right) = (operand(0), operand(1));
            if left == StaticType::String || right == StaticType::String {
                StaticType::String
            } else if left.is_numeric() && right.is_numeric() {
                StaticType::Number
            } else {
                StaticType::Any
            }
        }
        K::Subtract
        | K::Multiply
        | K::Divide
        | K::Modulo
        | K::Exponent
        | K::Positive
        | K::Negate
        | K::PreIncrement
        | K::PreDecrement
        | K::PostIncrement
        | K::PostDecrement => StaticType::Number,
        K::BitAnd | K::BitOr | K::BitXor | K::BitNot | K::ShiftLeft | K::ShiftRight => {
            StaticType::Int32
        }
        K::UnsignedShiftRight => StaticType::UInt32,
        K::Equal
        | K::NotEqual
        | K::StrictEqual
        | K::StrictNotEqual
        | K::LessThan
        | K::GreaterThan
        | K::LessThanOrEqual
        | K::GreaterThanOrEqual
        | K::In
        | K::Instanceof
        | K::LogicalNot
        | K::Delete => StaticType::Boolean,
        K::Typeof => StaticType::String,
        K::Void => StaticType::Undefined,
        K::New => StaticType::Object,
        K::Assign => operand(1),
        K::Grouping => operand(0),
        K::Comma => operand(1),
        K::Conditional => {
            let (yes, no) = (operand(1), operand(2));
            if yes == no {
                yes
            } else {
                StaticType::Any
            }
        }
        K::LogicalAnd | K::LogicalOr => {
            let (left, right) = (operand(0), operand(1));
            if left == right {
                left
            } else {
                StaticType::Any
            }
        }
        _ => StaticType::Any,
    }
}

/// A parsed function, shared between its declaration site and the scope
/// that materializes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLiteral {
    /// Declared name
    pub name: Option<String>,
    /// Parameter names in order (duplicates allowed in non-strict code)
    pub params: Vec<String>,
    /// Body statements
    pub body: Vec<Statement>,
    /// The function's own scope
    pub scope: ScopeId,
    /// Scope binding a function expression's own name, if it has one
    pub name_scope: Option<ScopeId>,
    /// The body is strict code
    pub strict: bool,
    /// Hints gathered while parsing the body
    pub hints: OptimizationHints,
    /// Source span from `function` to the closing brace
    pub span: SourceSpan,
    /// Declaration rather than expression
    pub is_declaration: bool,
    /// The body may read `arguments`, so the prologue creates it
    pub uses_arguments: bool,
}

/// Variable declaration keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// var
    Var,
    /// let
    Let,
    /// const
    Const,
}

/// One `name = init` part of a declaration
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDeclarator {
    /// Bound name
    pub name: String,
    /// Initializer
    pub init: Option<Expression>,
    /// Scope the declaration statement appears in
    pub scope: ScopeId,
    /// Source location
    pub position: SourcePosition,
}

/// Initializer clause of a `for (;;)` loop
#[derive(Debug, Clone, PartialEq)]
pub enum ForInit {
    /// `var`/`let`/`const` declarations
    Declaration {
        /// Keyword
        kind: VariableKind,
        /// Declarators
        declarations: Vec<VariableDeclarator>,
    },
    /// An expression
    Expression(Expression),
}

/// Left-hand side of `for-in` / `for-of`
#[derive(Debug, Clone, PartialEq)]
pub enum ForBinding {
    /// A single declared name
    Declaration {
        /// Keyword
        kind: VariableKind,
        /// Bound name
        name: String,
        /// Scope the name is resolved from
        scope: ScopeId,
        /// Source location
        position: SourcePosition,
    },
    /// An assignment target expression
    Target(Expression),
}

/// A `case` or `default` clause
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Case test, `None` for default
    pub test: Option<Expression>,
    /// Statements of the clause
    pub consequent: Vec<Statement>,
}

/// `catch (param) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct CatchClause {
    /// Parameter name
    pub param: String,
    /// Body statements
    pub body: Vec<Statement>,
    /// Scope holding the parameter and the body's declarations
    pub scope: ScopeId,
}

/// JavaScript statements
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `{ ... }`
    Block {
        /// Statements
        body: Vec<Statement>,
        /// Block scope
        scope: ScopeId,
        /// Source span
        span: SourceSpan,
    },

    /// Variable declaration (var, let, const)
    VariableDeclaration {
        /// Keyword
        kind: VariableKind,
        /// Declarators
        declarations: Vec<VariableDeclarator>,
        /// Source span
        span: SourceSpan,
    },

    /// Function declaration (materialized with its scope's hoisted functions)
    FunctionDeclaration {
        /// The function
        function: Rc<FunctionLiteral>,
        /// Source span
        span: SourceSpan,
    },

    /// Expression statement
    Expression {
        /// The expression
        expression: Expression,
        /// Source span
        span: SourceSpan,
    },

    /// `;`
    Empty {
        /// Source span
        span: SourceSpan,
    },

    /// if statement
    If {
        /// Condition
        test: Expression,
        /// Then branch
        consequent: Box<Statement>,
        /// Else branch
        alternate: Option<Box<Statement>>,
        /// Source span
        span: SourceSpan,
    },

    /// do-while loop
    DoWhile {
        /// Body
        body: Box<Statement>,
        /// Condition
        test: Expression,
        /// Source span
        span: SourceSpan,
    },

    /// while loop
    While {
        /// Condition
        test: Expression,
        /// Body
        body: Box<Statement>,
        /// Source span
        span: SourceSpan,
    },

    /// `for (init; test; update)`
    For {
        /// Initializer
        init: Option<ForInit>,
        /// Condition
        test: Option<Expression>,
        /// Update
        update: Option<Expression>,
        /// Body
        body: Box<Statement>,
        /// Header scope holding `let`/`const` bindings
        scope: Option<ScopeId>,
        /// Source span
        span: SourceSpan,
    },

    /// `for (left in right)`
    ForIn {
        /// Binding
        left: ForBinding,
        /// Object enumerated
        right: Expression,
        /// Body
        body: Box<Statement>,
        /// Header scope holding a `let`/`const` binding
        scope: Option<ScopeId>,
        /// Source span
        span: SourceSpan,
    },

    /// `for (left of right)`
    ForOf {
        /// Binding
        left: ForBinding,
        /// Array-like iterated
        right: Expression,
        /// Body
        body: Box<Statement>,
        /// Header scope holding a `let`/`const` binding
        scope: Option<ScopeId>,
        /// Source span
        span: SourceSpan,
    },

    /// continue statement
    Continue {
        /// Target label
        label: Option<String>,
        /// Source span
        span: SourceSpan,
    },

    /// break statement
    Break {
        /// Target label
        label: Option<String>,
        /// Source span
        span: SourceSpan,
    },

    /// return statement
    Return {
        /// Returned value
        argument: Option<Expression>,
        /// Source span
        span: SourceSpan,
    },

    /// with statement
    With {
        /// Object whose properties become visible
        object: Expression,
        /// Body
        body: Box<Statement>,
        /// The with scope
        scope: ScopeId,
        /// Source span
        span: SourceSpan,
    },

    /// switch statement
    Switch {
        /// Value compared against each case
        discriminant: Expression,
        /// Clauses in source order
        cases: Vec<SwitchCase>,
        /// Scope shared by all clauses
        scope: ScopeId,
        /// Source span
        span: SourceSpan,
    },

    /// throw statement
    Throw {
        /// Thrown value
        argument: Expression,
        /// Source span
        span: SourceSpan,
    },

    /// try statement
    Try {
        /// Protected block
        block: Box<Statement>,
        /// catch clause
        handler: Option<CatchClause>,
        /// finally block
        finalizer: Option<Box<Statement>>,
        /// Source span
        span: SourceSpan,
    },

    /// debugger statement
    Debugger {
        /// Source span
        span: SourceSpan,
    },

    /// `label: statement`
    Labeled {
        /// Label
        label: String,
        /// Labeled statement
        body: Box<Statement>,
        /// Source span
        span: SourceSpan,
    },
}

impl Statement {
    /// Source span of the statement.
    pub fn span(&self) -> SourceSpan {
        match self {
            Statement::Block { span, .. }
            | Statement::VariableDeclaration { span, .. }
            | Statement::FunctionDeclaration { span, .. }
            | Statement::Expression { span, .. }
            | Statement::Empty { span }
            | Statement::If { span, .. }
            | Statement::DoWhile { span, .. }
            | Statement::While { span, .. }
            | Statement::For { span, .. }
            | Statement::ForIn { span, .. }
            | Statement::ForOf { span, .. }
            | Statement::Continue { span, .. }
            | Statement::Break { span, .. }
            | Statement::Return { span, .. }
            | Statement::With { span, .. }
            | Statement::Switch { span, .. }
            | Statement::Throw { span, .. }
            | Statement::Try { span, .. }
            | Statement::Debugger { span }
            | Statement::Labeled { span, .. } => *span,
        }
    }

    /// Loops are valid `continue` targets.
    pub fn is_iteration(&self) -> bool {
        match self {
            Statement::DoWhile { .. }
            | Statement::While { .. }
            | Statement::For { .. }
            | Statement::ForIn { .. }
            | Statement::ForOf { .. } => true,
            Statement::Labeled { body, .. } => body.is_iteration(),
            _ => false,
        }
    }
}

/// A parsed compilation unit
#[derive(Debug)]
pub struct Program {
    /// Top-level statements
    pub statements: Vec<Statement>,
    /// Every scope of the unit
    pub scope_tree: ScopeTree,
    /// Scope of the top-level code
    pub root_scope: ScopeId,
    /// Hints gathered from the top-level code
    pub hints: OptimizationHints,
    /// Top-level code is strict
    pub strict: bool,
    /// The function being compiled, when the unit is a function body
    pub function: Option<Rc<FunctionLiteral>>,
}
