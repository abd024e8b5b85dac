//! Statement parser
//!
//! Recursive descent over statements. Expressions are handed to the
//! precedence-climbing reader in `expression.rs`. Declarations and references
//! go straight into the [`ScopeTree`] while the source is read, so a parsed
//! [`Program`] carries everything code generation needs.
//!
//! Per-function parse state (current scope, hints, strictness, labels, loop
//! nesting) lives in [`ParseState`]. Entering a function body swaps in a
//! fresh state and the caller's state is put back before any error from the
//! body is propagated.

use std::collections::HashSet;
use std::mem;
use std::rc::Rc;

use core_types::{JsError, SourcePosition, SourceSpan};
use tracing::{debug, trace};

use crate::ast::{
    CatchClause, Expression, ForBinding, ForInit, FunctionLiteral, LiteralValue, Program,
    Statement, SwitchCase, VariableDeclarator, VariableKind,
};
use crate::context::{CodeContext, CompatibilityMode, CompilerOptions, OptimizationHints};
use crate::error::{nesting_too_deep, syntax_error, unexpected_eof, unexpected_token};
use crate::expression::Terminator;
use crate::lexer::{Keyword, LexMode, Lexer, Punctuator, Token};
use crate::scope::{DeclarationKind, ScopeId, ScopeKind, ScopeTree};

/// Deepest statement and expression nesting a compilation unit may use.
pub(crate) const MAX_NESTING_DEPTH: usize = 512;

/// Recursive passes over the tree switch to a fresh stack segment once less
/// than this much native stack remains.
pub(crate) const STACK_RED_ZONE: usize = 256 * 1024;
pub(crate) const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Words that are reserved only in strict code.
const STRICT_RESERVED: [&str; 8] = [
    "implements",
    "interface",
    "package",
    "private",
    "protected",
    "public",
    "static",
    "yield",
];

#[derive(Debug, Clone)]
struct Label {
    name: String,
    iteration: bool,
}

/// Name and parameters of the function being parsed, re-checked when a
/// `"use strict"` directive turns up in its body.
#[derive(Debug, Clone)]
struct Signature {
    name: Option<(String, SourcePosition)>,
    params: Vec<(String, SourcePosition)>,
}

/// Parse state of one function body.
#[derive(Debug, Clone)]
pub(crate) struct ParseState {
    pub(crate) scope: ScopeId,
    pub(crate) hints: OptimizationHints,
    pub(crate) strict: bool,
    in_function: bool,
    labels: Vec<Label>,
    /// Labels directly in front of the statement being parsed
    pending_labels: usize,
    iteration_depth: usize,
    breakable_depth: usize,
    signature: Option<Signature>,
}

impl ParseState {
    fn new(scope: ScopeId, strict: bool, in_function: bool) -> Self {
        Self {
            scope,
            hints: OptimizationHints::default(),
            strict,
            in_function,
            labels: Vec::new(),
            pending_labels: 0,
            iteration_depth: 0,
            breakable_depth: 0,
            signature: None,
        }
    }
}

/// JavaScript parser
pub struct Parser<'a> {
    pub(crate) lexer: Lexer<'a>,
    pub(crate) scopes: ScopeTree,
    pub(crate) state: ParseState,
    context: CodeContext,
    /// Statements and expressions currently open, across function bodies
    pub(crate) nesting: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser for global code with default options.
    pub fn new(source: &'a str) -> Self {
        Self::with_options(source, CompilerOptions::default(), CodeContext::Global)
    }

    /// Creates a parser for the given kind of code.
    pub fn with_options(source: &'a str, options: CompilerOptions, context: CodeContext) -> Self {
        let strict = options.force_strict || matches!(context, CodeContext::Eval { strict: true });
        let root_kind = match context {
            CodeContext::Eval { .. } if strict => ScopeKind::EvalStrict,
            CodeContext::Eval { .. } => ScopeKind::Eval,
            _ => ScopeKind::Global,
        };
        let mut scopes = ScopeTree::new(root_kind);
        scopes.disable_slot_optimization(options.disable_slot_optimization);

        let mut lexer = Lexer::new(source)
            .with_legacy_octal(options.compatibility == CompatibilityMode::Ecmascript3);
        lexer.set_strict(strict);

        let state = ParseState::new(scopes.root(), strict, false);
        Self {
            lexer,
            scopes,
            state,
            context,
            nesting: 0,
        }
    }

    /// Parses the whole compilation unit.
    pub fn parse_program(mut self) -> Result<Program, JsError> {
        debug!(context = ?self.context, strict = self.state.strict, "parsing compilation unit");
        self.lexer.advance(LexMode::Operand)?;

        let (statements, function) = match self.context.clone() {
            CodeContext::Function { arguments } => {
                (Vec::new(), Some(self.parse_function_unit(&arguments)?))
            }
            _ => (self.parse_body(None)?, None),
        };

        self.scopes.finalize();
        debug!(
            scopes = self.scopes.len(),
            statements = statements.len(),
            strict = self.state.strict,
            "parsed compilation unit"
        );
        let strict = function.as_ref().map_or(self.state.strict, |f| f.strict);
        Ok(Program {
            statements,
            root_scope: self.scopes.root(),
            scope_tree: self.scopes,
            hints: self.state.hints,
            strict,
            function,
        })
    }

    /// The whole source as the body of an anonymous function taking
    /// `arguments`.
    fn parse_function_unit(&mut self, arguments: &[String]) -> Result<Rc<FunctionLiteral>, JsError> {
        let root = self.scopes.root();
        let scope = self.scopes.create_scope(ScopeKind::TopLevelFunction, root);
        let mut params = Vec::new();
        for name in arguments {
            let valid = name
                .chars()
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
                && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$')
                && Keyword::lookup(name).is_none();
            if !valid {
                return Err(syntax_error(format!("Invalid parameter name '{}'", name), None));
            }
            self.scopes.declare_parameter(scope, name, None);
            params.push((name.clone(), SourcePosition::default()));
        }

        let strict = self.state.strict;
        let mut inner = ParseState::new(scope, strict, true);
        inner.signature = Some(Signature { name: None, params });
        let outer = mem::replace(&mut self.state, inner);
        let body = self.parse_function_body(None);
        let inner = mem::replace(&mut self.state, outer);
        let body = body?;

        self.state.hints.has_nested_function = true;
        let uses_arguments = self.declare_arguments_object(scope, &inner.hints);
        Ok(Rc::new(FunctionLiteral {
            name: None,
            params: arguments.to_vec(),
            body,
            scope,
            name_scope: None,
            strict: inner.strict,
            hints: inner.hints,
            span: SourceSpan::new(0, self.lexer.source().len(), 1),
            is_declaration: false,
            uses_arguments,
        }))
    }

    /// Declares the implicit `arguments` binding of a function body that
    /// mentions the name or calls eval. A parameter, function declaration
    /// or lexical declaration of that name takes its place.
    fn declare_arguments_object(&mut self, scope: ScopeId, hints: &OptimizationHints) -> bool {
        if !hints.has_eval && !hints.variable_occurrences.contains_key("arguments") {
            return false;
        }
        match self.scopes.get(scope).variables.get("arguments").map(|v| v.kind) {
            Some(DeclarationKind::Var) => true,
            Some(_) => false,
            None => self
                .scopes
                .declare_var(scope, "arguments", DeclarationKind::Var, None)
                .is_ok(),
        }
    }

    pub(crate) fn unexpected(&self) -> JsError {
        let info = self.lexer.current();
        match &info.token {
            Token::EOF => unexpected_eof(Some(info.start)),
            token => syntax_error(format!("Unexpected {}", token), Some(info.start)),
        }
    }

    fn expect(&mut self, punct: Punctuator, mode: LexMode) -> Result<(), JsError> {
        let info = self.lexer.current();
        if !info.token.is_punct(punct) {
            if info.token == Token::EOF {
                return Err(unexpected_eof(Some(info.start)));
            }
            return Err(unexpected_token(
                &format!("'{}'", punct.as_str()),
                &info.token.to_string(),
                Some(info.start),
            ));
        }
        self.lexer.advance(mode)
    }

    fn span_from(&self, start: SourcePosition) -> SourceSpan {
        SourceSpan::new(start.offset, self.lexer.previous_end(), start.line)
    }

    /// Ends a statement: an explicit `;`, or an inserted one before `}`, the
    /// end of input, or a token on a new line.
    fn consume_semicolon(&mut self) -> Result<(), JsError> {
        match self.lexer.token() {
            Token::Punctuator(Punctuator::Semicolon) => self.lexer.advance(LexMode::Operand),
            Token::Punctuator(Punctuator::RBrace) | Token::EOF => Ok(()),
            _ if self.lexer.newline_before() => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    pub(crate) fn check_identifier_reference(
        &self,
        name: &str,
        position: SourcePosition,
    ) -> Result<(), JsError> {
        if self.state.strict && STRICT_RESERVED.contains(&name) {
            return Err(syntax_error(
                "Unexpected strict mode reserved word",
                Some(position),
            ));
        }
        Ok(())
    }

    fn check_binding_name(&self, name: &str, position: SourcePosition) -> Result<(), JsError> {
        if self.state.strict && (name == "eval" || name == "arguments") {
            return Err(syntax_error(
                "Unexpected eval or arguments in strict mode",
                Some(position),
            ));
        }
        self.check_identifier_reference(name, position)
    }

    /// The current token as a name to bind. Does not advance.
    fn binding_identifier(&self) -> Result<String, JsError> {
        let info = self.lexer.current();
        match &info.token {
            Token::Identifier(name) => {
                self.check_binding_name(name, info.start)?;
                Ok(name.clone())
            }
            Token::Keyword(keyword) if keyword.is_reserved() => {
                Err(syntax_error("Unexpected reserved word", Some(info.start)))
            }
            Token::EOF => Err(unexpected_eof(Some(info.start))),
            token => Err(unexpected_token("identifier", &token.to_string(), Some(info.start))),
        }
    }

    /// Strict-mode checks on the enclosing function's name and parameters.
    fn check_signature(&self) -> Result<(), JsError> {
        let Some(signature) = &self.state.signature else {
            return Ok(());
        };
        if let Some((name, position)) = &signature.name {
            self.check_binding_name(name, *position)?;
        }
        let mut seen = HashSet::new();
        for (param, position) in &signature.params {
            self.check_binding_name(param, *position)?;
            if !seen.insert(param.as_str()) {
                return Err(syntax_error(
                    "Duplicate parameter name not allowed in this context",
                    Some(*position),
                ));
            }
        }
        Ok(())
    }

    fn enter_scope(&mut self, kind: ScopeKind) -> (ScopeId, ScopeId) {
        let outer = self.state.scope;
        let scope = self.scopes.create_scope(kind, outer);
        self.state.scope = scope;
        (scope, outer)
    }

    /// Statements up to `end` (or the end of input), starting with the
    /// directive prologue.
    fn parse_body(&mut self, end: Option<Punctuator>) -> Result<Vec<Statement>, JsError> {
        let mut statements = Vec::new();
        let mut in_prologue = true;
        let mut octal_seen = false;
        loop {
            match (self.lexer.token(), end) {
                (Token::EOF, None) => break,
                (Token::EOF, Some(_)) => return Err(self.unexpected()),
                (token, Some(punct)) if token.is_punct(punct) => break,
                _ => {}
            }
            if in_prologue && matches!(self.lexer.token(), Token::String(_)) {
                let (statement, is_directive) = self.parse_directive(&mut octal_seen)?;
                in_prologue = is_directive;
                statements.push(statement);
                continue;
            }
            in_prologue = false;
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_directive(&mut self, octal_seen: &mut bool) -> Result<(Statement, bool), JsError> {
        let start = self.lexer.position();
        *octal_seen |= self.lexer.current().legacy_octal;
        let expression = self.parse_expression(&[])?;
        let is_directive = matches!(
            expression,
            Expression::Literal {
                value: LiteralValue::String(_),
                ..
            }
        );
        if is_directive {
            let raw = &self.lexer.source()[start.offset..self.lexer.previous_end()];
            if raw == "'use strict'" || raw == "\"use strict\"" {
                self.enable_strict(*octal_seen)?;
            }
        }
        self.consume_semicolon()?;
        let span = self.span_from(start);
        Ok((Statement::Expression { expression, span }, is_directive))
    }

    /// Switches the current body to strict code after a `"use strict"`
    /// directive. Whatever was read before the directive is checked again
    /// under strict rules.
    fn enable_strict(&mut self, octal_seen: bool) -> Result<(), JsError> {
        let current = self.lexer.current();
        if octal_seen || current.legacy_octal {
            return Err(syntax_error(
                "Octal escape sequences are not allowed in strict mode.",
                Some(current.start),
            ));
        }
        self.state.strict = true;
        self.lexer.set_strict(true);

        let root = self.scopes.root();
        if self.state.scope == root && self.scopes.get(root).kind == ScopeKind::Eval {
            self.scopes.set_kind(root, ScopeKind::EvalStrict);
        }
        trace!(scope = self.state.scope.0, "strict mode enabled");
        self.check_signature()
    }

    /// Runs `parse` one nesting level deeper, failing once the unit nests
    /// past [`MAX_NESTING_DEPTH`].
    pub(crate) fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, JsError>,
    ) -> Result<T, JsError> {
        if self.nesting >= MAX_NESTING_DEPTH {
            return Err(nesting_too_deep(Some(self.lexer.position())));
        }
        self.nesting += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || parse(self));
        self.nesting -= 1;
        result
    }

    fn parse_statement(&mut self) -> Result<Statement, JsError> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Statement, JsError> {
        let pending_labels = mem::take(&mut self.state.pending_labels);
        match self.lexer.token().clone() {
            Token::Punctuator(Punctuator::LBrace) => self.parse_block_statement(),
            Token::Punctuator(Punctuator::Semicolon) => {
                let start = self.lexer.position();
                self.lexer.advance(LexMode::Operand)?;
                Ok(Statement::Empty {
                    span: self.span_from(start),
                })
            }
            Token::Keyword(keyword) => match keyword {
                Keyword::Var => self.parse_variable_statement(VariableKind::Var),
                Keyword::Let => self.parse_variable_statement(VariableKind::Let),
                Keyword::Const => self.parse_variable_statement(VariableKind::Const),
                Keyword::Function => self.parse_function_declaration(),
                Keyword::If => self.parse_if_statement(),
                Keyword::Do => {
                    self.mark_iteration_labels(pending_labels);
                    self.parse_do_while_statement()
                }
                Keyword::While => {
                    self.mark_iteration_labels(pending_labels);
                    self.parse_while_statement()
                }
                Keyword::For => {
                    self.mark_iteration_labels(pending_labels);
                    self.parse_for_statement()
                }
                Keyword::Continue => self.parse_continue_statement(),
                Keyword::Break => self.parse_break_statement(),
                Keyword::Return => self.parse_return_statement(),
                Keyword::With => self.parse_with_statement(),
                Keyword::Switch => self.parse_switch_statement(),
                Keyword::Throw => self.parse_throw_statement(),
                Keyword::Try => self.parse_try_statement(),
                Keyword::Debugger => {
                    let start = self.lexer.position();
                    self.lexer.advance(LexMode::Operand)?;
                    self.consume_semicolon()?;
                    Ok(Statement::Debugger {
                        span: self.span_from(start),
                    })
                }
                keyword if keyword.is_reserved() => Err(syntax_error(
                    "Unexpected reserved word",
                    Some(self.lexer.position()),
                )),
                _ => self.parse_expression_statement(pending_labels),
            },
            _ => self.parse_expression_statement(pending_labels),
        }
    }

    fn mark_iteration_labels(&mut self, count: usize) {
        for label in self.state.labels.iter_mut().rev().take(count) {
            label.iteration = true;
        }
    }

    fn parse_statements_until_brace(&mut self) -> Result<Vec<Statement>, JsError> {
        let mut statements = Vec::new();
        while !self.lexer.token().is_punct(Punctuator::RBrace) {
            if *self.lexer.token() == Token::EOF {
                return Err(self.unexpected());
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_block_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        if !self.lexer.token().is_punct(Punctuator::LBrace) {
            return Err(unexpected_token("'{'", &self.lexer.token().to_string(), Some(start)));
        }
        self.lexer.advance(LexMode::Operand)?;
        let (scope, outer) = self.enter_scope(ScopeKind::Block);
        let body = self.parse_statements_until_brace();
        self.state.scope = outer;
        let body = body?;
        self.lexer.advance(LexMode::Operand)?;
        Ok(Statement::Block {
            body,
            scope,
            span: self.span_from(start),
        })
    }

    fn parse_variable_statement(&mut self, kind: VariableKind) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        let declarations = self.parse_declarators(kind, false)?;
        self.consume_semicolon()?;
        Ok(Statement::VariableDeclaration {
            kind,
            declarations,
            span: self.span_from(start),
        })
    }

    /// Reads `name [= init], ...` after the declaration keyword. In a `for`
    /// head, `in` or `of` ends an initializer and `const` may omit one.
    fn parse_declarators(
        &mut self,
        kind: VariableKind,
        in_for_head: bool,
    ) -> Result<Vec<VariableDeclarator>, JsError> {
        let mut declarations = Vec::new();
        loop {
            self.lexer.advance(LexMode::Operand)?;
            let position = self.lexer.position();
            let name = self.binding_identifier()?;
            self.declare(kind, &name, position)?;
            self.lexer.advance(LexMode::Operator)?;

            let init = if self.lexer.token().is_punct(Punctuator::Assign) {
                self.lexer.advance(LexMode::Operand)?;
                let terminators: &[Terminator] = if in_for_head {
                    &[
                        Terminator::Punct(Punctuator::Comma),
                        Terminator::In,
                        Terminator::Of,
                    ]
                } else {
                    &[Terminator::Punct(Punctuator::Comma)]
                };
                Some(self.parse_expression(terminators)?)
            } else {
                if kind == VariableKind::Const && !in_for_head {
                    return Err(syntax_error(
                        "Missing initializer in const declaration",
                        Some(position),
                    ));
                }
                None
            };

            declarations.push(VariableDeclarator {
                name,
                init,
                scope: self.state.scope,
                position,
            });
            if !self.lexer.token().is_punct(Punctuator::Comma) {
                break;
            }
        }
        Ok(declarations)
    }

    fn declare(&mut self, kind: VariableKind, name: &str, position: SourcePosition) -> Result<(), JsError> {
        let scope = self.state.scope;
        match kind {
            VariableKind::Var => self
                .scopes
                .declare_var(scope, name, DeclarationKind::Var, Some(position))
                .map(|_| ()),
            VariableKind::Let => {
                self.scopes
                    .declare_lexical(scope, name, DeclarationKind::Let, Some(position))
            }
            VariableKind::Const => {
                self.scopes
                    .declare_lexical(scope, name, DeclarationKind::Const, Some(position))
            }
        }
    }

    fn parse_function_declaration(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        let function = self.parse_function(true)?;
        let name = function.name.clone().unwrap_or_default();

        let scope = self.state.scope;
        if self.state.strict && self.scopes.get(scope).kind == ScopeKind::Block {
            self.scopes
                .declare_lexical(scope, &name, DeclarationKind::Function, Some(start))?;
        } else {
            self.scopes
                .declare_var(scope, &name, DeclarationKind::Function, Some(start))?;
        }
        self.scopes.add_hoisted_function(scope, Rc::clone(&function));

        self.lexer.advance(LexMode::Operand)?;
        Ok(Statement::FunctionDeclaration {
            function,
            span: self.span_from(start),
        })
    }

    /// Reads a function from the `function` keyword through its closing
    /// brace, which is left as the current token.
    pub(crate) fn parse_function(&mut self, is_declaration: bool) -> Result<Rc<FunctionLiteral>, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;

        let name = match self.lexer.token().clone() {
            Token::Identifier(name) => {
                let position = self.lexer.position();
                self.check_identifier_reference(&name, position)?;
                self.lexer.advance(LexMode::Operand)?;
                Some((name, position))
            }
            _ if is_declaration => {
                return Err(syntax_error(
                    "Function statements require a function name",
                    Some(self.lexer.position()),
                ))
            }
            _ => None,
        };

        let name_scope = match (&name, is_declaration) {
            (Some((name, position)), false) => {
                let scope = self.scopes.create_scope(ScopeKind::Block, self.state.scope);
                self.scopes
                    .declare_lexical(scope, name, DeclarationKind::FunctionName, Some(*position))?;
                Some(scope)
            }
            _ => None,
        };
        let scope = self
            .scopes
            .create_scope(ScopeKind::TopLevelFunction, name_scope.unwrap_or(self.state.scope));

        self.expect(Punctuator::LParen, LexMode::Operand)?;
        let mut params = Vec::new();
        if !self.lexer.token().is_punct(Punctuator::RParen) {
            loop {
                let position = self.lexer.position();
                let param = self.binding_identifier()?;
                self.scopes.declare_parameter(scope, &param, Some(position));
                params.push((param, position));
                self.lexer.advance(LexMode::Operator)?;
                if !self.lexer.token().is_punct(Punctuator::Comma) {
                    break;
                }
                self.lexer.advance(LexMode::Operand)?;
            }
        }
        self.expect(Punctuator::RParen, LexMode::Operand)?;
        self.expect(Punctuator::LBrace, LexMode::Operand)?;

        let strict = self.state.strict;
        let lexer_strict = self.lexer.is_strict();
        let mut inner = ParseState::new(scope, strict, true);
        inner.signature = Some(Signature {
            name: name.clone(),
            params: params.clone(),
        });
        let outer = mem::replace(&mut self.state, inner);
        let body = self.parse_function_body(Some(Punctuator::RBrace));
        let inner = mem::replace(&mut self.state, outer);
        self.lexer.set_strict(lexer_strict);
        let body = body?;

        self.state.hints.has_nested_function = true;
        let uses_arguments = self.declare_arguments_object(scope, &inner.hints);
        let end = self.lexer.current().end;
        trace!(
            name = name.as_ref().map_or("<anonymous>", |(n, _)| n.as_str()),
            scope = scope.0,
            strict = inner.strict,
            "parsed function"
        );
        Ok(Rc::new(FunctionLiteral {
            name: name.map(|(name, _)| name),
            params: params.into_iter().map(|(param, _)| param).collect(),
            body,
            scope,
            name_scope,
            strict: inner.strict,
            hints: inner.hints,
            span: SourceSpan::new(start.offset, end, start.line),
            is_declaration,
            uses_arguments,
        }))
    }

    fn parse_function_body(&mut self, end: Option<Punctuator>) -> Result<Vec<Statement>, JsError> {
        if self.state.strict {
            self.check_signature()?;
        }
        self.parse_body(end)
    }

    fn parse_parenthesized(&mut self) -> Result<Expression, JsError> {
        self.expect(Punctuator::LParen, LexMode::Operand)?;
        let expression = self.parse_expression(&[Terminator::Punct(Punctuator::RParen)])?;
        self.expect(Punctuator::RParen, LexMode::Operand)?;
        Ok(expression)
    }

    fn parse_if_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let test = self.parse_parenthesized()?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.lexer.token().is_keyword(Keyword::Else) {
            self.lexer.advance(LexMode::Operand)?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
            span: self.span_from(start),
        })
    }

    fn parse_loop_body(&mut self) -> Result<Statement, JsError> {
        self.state.iteration_depth += 1;
        self.state.breakable_depth += 1;
        let body = self.parse_statement();
        self.state.iteration_depth -= 1;
        self.state.breakable_depth -= 1;
        body
    }

    fn parse_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let test = self.parse_parenthesized()?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::While {
            test,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let body = Box::new(self.parse_loop_body()?);
        if !self.lexer.token().is_keyword(Keyword::While) {
            return Err(unexpected_token(
                "'while'",
                &self.lexer.token().to_string(),
                Some(self.lexer.position()),
            ));
        }
        self.lexer.advance(LexMode::Operand)?;
        let test = self.parse_parenthesized()?;
        if self.lexer.token().is_punct(Punctuator::Semicolon) {
            self.lexer.advance(LexMode::Operand)?;
        }
        Ok(Statement::DoWhile {
            body,
            test,
            span: self.span_from(start),
        })
    }

    fn parse_for_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        self.expect(Punctuator::LParen, LexMode::Operand)?;
        let outer = self.state.scope;
        let statement = self.parse_for_rest(start);
        self.state.scope = outer;
        statement
    }

    /// Everything after `for (`. The head decides between the three loop
    /// forms: `in` or `of` after the first clause makes it an enumeration.
    fn parse_for_rest(&mut self, start: SourcePosition) -> Result<Statement, JsError> {
        let mut head_scope = None;
        let init = match self.lexer.token().clone() {
            Token::Punctuator(Punctuator::Semicolon) => None,
            Token::Keyword(Keyword::Var) => Some(ForInit::Declaration {
                kind: VariableKind::Var,
                declarations: self.parse_declarators(VariableKind::Var, true)?,
            }),
            Token::Keyword(keyword @ (Keyword::Let | Keyword::Const)) => {
                let kind = if keyword == Keyword::Let {
                    VariableKind::Let
                } else {
                    VariableKind::Const
                };
                let (scope, _) = self.enter_scope(ScopeKind::Block);
                head_scope = Some(scope);
                Some(ForInit::Declaration {
                    kind,
                    declarations: self.parse_declarators(kind, true)?,
                })
            }
            _ => Some(ForInit::Expression(
                self.parse_expression(&[Terminator::In, Terminator::Of])?,
            )),
        };

        let is_in = self.lexer.token().is_keyword(Keyword::In);
        let is_of = self.lexer.token().is_identifier_named("of");
        if is_in || is_of {
            let Some(init) = init else {
                return Err(self.unexpected());
            };
            let loop_kind = if is_in { "for-in" } else { "for-of" };
            let left = self.for_binding(init, loop_kind)?;
            self.lexer.advance(LexMode::Operand)?;
            let right = if is_in {
                self.parse_expression(&[Terminator::Punct(Punctuator::RParen)])?
            } else {
                self.parse_expression(&[
                    Terminator::Punct(Punctuator::RParen),
                    Terminator::Punct(Punctuator::Comma),
                ])?
            };
            self.expect(Punctuator::RParen, LexMode::Operand)?;
            let body = Box::new(self.parse_loop_body()?);
            let span = self.span_from(start);
            return Ok(if is_in {
                Statement::ForIn {
                    left,
                    right,
                    body,
                    scope: head_scope,
                    span,
                }
            } else {
                Statement::ForOf {
                    left,
                    right,
                    body,
                    scope: head_scope,
                    span,
                }
            });
        }

        if let Some(ForInit::Declaration {
            kind: VariableKind::Const,
            declarations,
        }) = &init
        {
            if let Some(missing) = declarations.iter().find(|d| d.init.is_none()) {
                return Err(syntax_error(
                    "Missing initializer in const declaration",
                    Some(missing.position),
                ));
            }
        }

        self.expect(Punctuator::Semicolon, LexMode::Operand)?;
        let test = if self.lexer.token().is_punct(Punctuator::Semicolon) {
            None
        } else {
            Some(self.parse_expression(&[])?)
        };
        self.expect(Punctuator::Semicolon, LexMode::Operand)?;
        let update = if self.lexer.token().is_punct(Punctuator::RParen) {
            None
        } else {
            Some(self.parse_expression(&[Terminator::Punct(Punctuator::RParen)])?)
        };
        self.expect(Punctuator::RParen, LexMode::Operand)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::For {
            init,
            test,
            update,
            body,
            scope: head_scope,
            span: self.span_from(start),
        })
    }

    fn for_binding(&self, init: ForInit, loop_kind: &str) -> Result<ForBinding, JsError> {
        match init {
            ForInit::Declaration {
                kind,
                mut declarations,
            } => {
                if declarations.len() != 1 {
                    return Err(syntax_error(
                        format!(
                            "Invalid left-hand side in {} loop: Must have a single binding.",
                            loop_kind
                        ),
                        declarations.get(1).map(|d| d.position),
                    ));
                }
                let declaration = declarations.remove(0);
                if declaration.init.is_some() {
                    return Err(syntax_error(
                        format!("{} loop variable declaration may not have an initializer.", loop_kind),
                        Some(declaration.position),
                    ));
                }
                Ok(ForBinding::Declaration {
                    kind,
                    name: declaration.name,
                    scope: declaration.scope,
                    position: declaration.position,
                })
            }
            ForInit::Expression(target) => Ok(ForBinding::Target(target)),
        }
    }

    /// An optional label after `break` / `continue` on the same line.
    fn statement_label(&mut self) -> Result<Option<String>, JsError> {
        match self.lexer.token() {
            Token::Identifier(name) if !self.lexer.newline_before() => {
                let name = name.clone();
                self.lexer.advance(LexMode::Operand)?;
                Ok(Some(name))
            }
            _ => Ok(None),
        }
    }

    fn parse_continue_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let label = self.statement_label()?;
        match &label {
            Some(name) => match self.state.labels.iter().rev().find(|l| &l.name == name) {
                Some(target) if target.iteration => {}
                Some(_) => {
                    return Err(syntax_error(
                        format!(
                            "Illegal continue statement: '{}' does not denote an iteration statement",
                            name
                        ),
                        Some(start),
                    ))
                }
                None => return Err(syntax_error(format!("Undefined label '{}'", name), Some(start))),
            },
            None if self.state.iteration_depth == 0 => {
                return Err(syntax_error(
                    "Illegal continue statement: no surrounding iteration statement",
                    Some(start),
                ))
            }
            None => {}
        }
        self.consume_semicolon()?;
        Ok(Statement::Continue {
            label,
            span: self.span_from(start),
        })
    }

    fn parse_break_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let label = self.statement_label()?;
        match &label {
            Some(name) if !self.state.labels.iter().any(|l| &l.name == name) => {
                return Err(syntax_error(format!("Undefined label '{}'", name), Some(start)))
            }
            None if self.state.breakable_depth == 0 => {
                return Err(syntax_error("Illegal break statement", Some(start)))
            }
            _ => {}
        }
        self.consume_semicolon()?;
        Ok(Statement::Break {
            label,
            span: self.span_from(start),
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        if !self.state.in_function {
            return Err(syntax_error("Illegal return statement", Some(start)));
        }
        self.lexer.advance(LexMode::Operand)?;
        let argument = match self.lexer.token() {
            Token::Punctuator(Punctuator::Semicolon | Punctuator::RBrace) | Token::EOF => None,
            _ if self.lexer.newline_before() => None,
            _ => Some(self.parse_expression(&[])?),
        };
        self.consume_semicolon()?;
        Ok(Statement::Return {
            argument,
            span: self.span_from(start),
        })
    }

    fn parse_with_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        if self.state.strict {
            return Err(syntax_error(
                "Strict mode code may not include a with statement",
                Some(start),
            ));
        }
        self.lexer.advance(LexMode::Operand)?;
        let object = self.parse_parenthesized()?;

        let (scope, outer) = self.enter_scope(ScopeKind::With);
        self.scopes.mark_with(scope);
        let body = self.parse_statement();
        self.state.scope = outer;

        Ok(Statement::With {
            object,
            body: Box::new(body?),
            scope,
            span: self.span_from(start),
        })
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let discriminant = self.parse_parenthesized()?;
        self.expect(Punctuator::LBrace, LexMode::Operand)?;

        let (scope, outer) = self.enter_scope(ScopeKind::Block);
        self.state.breakable_depth += 1;
        let cases = self.parse_switch_cases();
        self.state.breakable_depth -= 1;
        self.state.scope = outer;
        let cases = cases?;

        self.lexer.advance(LexMode::Operand)?;
        Ok(Statement::Switch {
            discriminant,
            cases,
            scope,
            span: self.span_from(start),
        })
    }

    fn parse_switch_cases(&mut self) -> Result<Vec<SwitchCase>, JsError> {
        let mut cases = Vec::new();
        let mut seen_default = false;
        loop {
            let test = match self.lexer.token() {
                Token::Punctuator(Punctuator::RBrace) => break,
                Token::Keyword(Keyword::Case) => {
                    self.lexer.advance(LexMode::Operand)?;
                    Some(self.parse_expression(&[Terminator::Punct(Punctuator::Colon)])?)
                }
                Token::Keyword(Keyword::Default) => {
                    if seen_default {
                        return Err(syntax_error(
                            "More than one default clause in switch statement",
                            Some(self.lexer.position()),
                        ));
                    }
                    seen_default = true;
                    self.lexer.advance(LexMode::Operator)?;
                    None
                }
                _ => return Err(self.unexpected()),
            };
            self.expect(Punctuator::Colon, LexMode::Operand)?;

            let mut consequent = Vec::new();
            loop {
                match self.lexer.token() {
                    Token::Keyword(Keyword::Case | Keyword::Default)
                    | Token::Punctuator(Punctuator::RBrace) => break,
                    Token::EOF => return Err(self.unexpected()),
                    _ => consequent.push(self.parse_statement()?),
                }
            }
            cases.push(SwitchCase { test, consequent });
        }
        Ok(cases)
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        if self.lexer.newline_before() {
            return Err(syntax_error("Illegal newline after throw", Some(start)));
        }
        let argument = self.parse_expression(&[])?;
        self.consume_semicolon()?;
        Ok(Statement::Throw {
            argument,
            span: self.span_from(start),
        })
    }

    fn parse_try_statement(&mut self) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        self.lexer.advance(LexMode::Operand)?;
        let block = Box::new(self.parse_block_statement()?);

        let handler = if self.lexer.token().is_keyword(Keyword::Catch) {
            self.lexer.advance(LexMode::Operand)?;
            self.expect(Punctuator::LParen, LexMode::Operand)?;
            let position = self.lexer.position();
            let param = self.binding_identifier()?;
            self.lexer.advance(LexMode::Operator)?;
            self.expect(Punctuator::RParen, LexMode::Operand)?;
            self.expect(Punctuator::LBrace, LexMode::Operand)?;

            let (scope, outer) = self.enter_scope(ScopeKind::Block);
            let body = self
                .scopes
                .declare_lexical(scope, &param, DeclarationKind::CatchParameter, Some(position))
                .and_then(|_| self.parse_statements_until_brace());
            self.state.scope = outer;
            let body = body?;
            self.lexer.advance(LexMode::Operand)?;
            Some(CatchClause { param, body, scope })
        } else {
            None
        };

        let finalizer = if self.lexer.token().is_keyword(Keyword::Finally) {
            self.lexer.advance(LexMode::Operand)?;
            Some(Box::new(self.parse_block_statement()?))
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(syntax_error(
                "Missing catch or finally after try",
                Some(self.lexer.position()),
            ));
        }
        Ok(Statement::Try {
            block,
            handler,
            finalizer,
            span: self.span_from(start),
        })
    }

    /// An expression statement, or a labeled statement when the expression
    /// is a lone identifier followed by `:`.
    fn parse_expression_statement(&mut self, pending_labels: usize) -> Result<Statement, JsError> {
        let start = self.lexer.position();
        let expression = self.parse_expression(&[Terminator::Punct(Punctuator::Colon)])?;
        if self.lexer.token().is_punct(Punctuator::Colon) {
            if let Expression::Identifier { name, .. } = &expression {
                return self.parse_labeled_statement(name.clone(), start, pending_labels);
            }
        }
        self.consume_semicolon()?;
        Ok(Statement::Expression {
            expression,
            span: self.span_from(start),
        })
    }

    fn parse_labeled_statement(
        &mut self,
        label: String,
        start: SourcePosition,
        pending_labels: usize,
    ) -> Result<Statement, JsError> {
        // The label was read as a reference first.
        self.scopes.retract_reference(&label);
        if let Some(count) = self.state.hints.variable_occurrences.get_mut(&label) {
            *count -= 1;
            if *count == 0 {
                self.state.hints.variable_occurrences.shift_remove(&label);
            }
        }

        if self.state.labels.iter().any(|l| l.name == label) {
            return Err(syntax_error(
                format!("Label '{}' has already been declared", label),
                Some(start),
            ));
        }
        self.lexer.advance(LexMode::Operand)?;

        self.state.labels.push(Label {
            name: label.clone(),
            iteration: false,
        });
        self.state.pending_labels = pending_labels + 1;
        let body = self.parse_statement();
        self.state.pending_labels = 0;
        self.state.labels.pop();

        Ok(Statement::Labeled {
            label,
            body: Box::new(body?),
            span: self.span_from(start),
        })
    }
}
