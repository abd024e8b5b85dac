//! Expression parsing by precedence climbing
//!
//! Operators are read left to right into a tree without parent links. The
//! builder keeps the root and the depth of the *unbound* node: the deepest
//! node on the right spine that may still receive an operand. An infix or
//! postfix operator walks the spine from the root down to the unbound node
//! and picks the deepest node that binds looser than itself (its pivot),
//! then takes over the pivot's last operand:
//!
//! ```text
//! new.operands.push(pivot.operands.pop()); pivot.operands.push(new)
//! ```
//!
//! When no node on the spine binds looser, the new operator takes the whole
//! tree as its first operand and becomes the root. Two-part operators
//! (`?:`, calls, indexing and grouping) stay open until their closing token
//! arrives; while open they bind with their secondary precedence, so a
//! grouping accepts any operator inside it.
//!
//! The finished tree goes through a validity pass before it is handed back.

use core_types::{conversion::number_to_string, JsError, SourcePosition};

use crate::ast::{Expression, LiteralValue, ObjectProperty, OperatorExpression};
use crate::error::{nesting_too_deep, syntax_error, unexpected_eof};
use crate::lexer::{Keyword, LexMode, Punctuator, Token};
use crate::operators::{
    lookup, Associativity, Fixity, OperatorKind, OperatorToken, MAX_CALL_ARGUMENTS,
};
use crate::parser::{Parser, MAX_NESTING_DEPTH, STACK_RED_ZONE, STACK_SEGMENT};

/// A token that ends an expression when no two-part operator is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Terminator {
    /// A punctuator such as `,` or `)`
    Punct(Punctuator),
    /// `in` in the head of a `for` loop
    In,
    /// Contextual `of` in the head of a `for` loop
    Of,
}

/// Partially built expression tree.
#[derive(Debug, Default)]
struct TreeBuilder {
    root: Option<Expression>,
    unbound: Option<usize>,
    /// Upper bound on the operator levels along any path of the tree
    height: usize,
}

impl TreeBuilder {
    /// Operator node at `depth` along the right spine.
    fn node(&self, depth: usize) -> Option<&OperatorExpression> {
        let mut node = self.root.as_ref()?.as_operator()?;
        for _ in 0..depth {
            node = node.operands.last()?.as_operator()?;
        }
        Some(node)
    }

    fn node_mut(&mut self, depth: usize) -> Option<&mut OperatorExpression> {
        let mut node = match self.root.as_mut()? {
            Expression::Operator(op) => op,
            _ => return None,
        };
        for _ in 0..depth {
            node = match node.operands.last_mut()? {
                Expression::Operator(op) => op,
                _ => return None,
            };
        }
        Some(node)
    }

    /// Depth of the deepest two-part node still waiting for its closing token.
    fn deepest_open(&self) -> Option<usize> {
        let limit = self.unbound?;
        (0..=limit).rev().find(|&depth| {
            self.node(depth)
                .is_some_and(|node| node.operator.secondary.is_some() && !node.closed)
        })
    }

    /// A call whose `(` was just read: `)` in operand position closes it
    /// with no arguments.
    fn unbound_is_empty_call(&self) -> bool {
        self.unbound
            .and_then(|depth| self.node(depth))
            .is_some_and(|node| {
                node.kind() == OperatorKind::FunctionCall && !node.closed && node.operands.len() == 1
            })
    }

    fn push_operand(&mut self, operand: Expression) -> bool {
        match self.unbound {
            None if self.root.is_none() => {
                self.root = Some(operand);
                true
            }
            None => false,
            Some(depth) => match self.node_mut(depth) {
                Some(node) if node.accepts_operand() => {
                    node.operands.push(operand);
                    true
                }
                _ => false,
            },
        }
    }

    fn attach_prefix(&mut self, node: OperatorExpression) -> bool {
        match self.unbound {
            None if self.root.is_none() => {
                self.root = Some(Expression::Operator(node));
                self.unbound = Some(0);
                self.height = self.height.max(1);
                true
            }
            None => false,
            Some(depth) => match self.node_mut(depth) {
                Some(parent) if parent.accepts_operand() => {
                    parent.operands.push(Expression::Operator(node));
                    self.unbound = Some(depth + 1);
                    self.height = self.height.max(depth + 2);
                    true
                }
                _ => false,
            },
        }
    }

    fn attach_infix(&mut self, mut node: OperatorExpression) -> bool {
        let operator = node.operator;
        let mut pivot = None;
        if let Some(limit) = self.unbound {
            for depth in 0..=limit {
                let Some(candidate) = self.node(depth) else {
                    break;
                };
                if candidate.is_sealed() {
                    continue;
                }
                let binding = if candidate.operator.secondary.is_some() && !candidate.closed {
                    candidate.operator.secondary_precedence
                } else {
                    candidate.operator.precedence
                };
                let binds_looser = match operator.associativity {
                    Associativity::Left => binding < operator.precedence,
                    Associativity::Right => binding <= operator.precedence,
                };
                if binds_looser {
                    pivot = Some(depth);
                }
            }
        }

        match pivot {
            None => {
                let Some(old_root) = self.root.take() else {
                    return false;
                };
                node.operands.push(old_root);
                self.root = Some(Expression::Operator(node));
                self.unbound = Some(0);
                self.height += 1;
            }
            Some(depth) => {
                let height = self.height;
                let Some(parent) = self.node_mut(depth) else {
                    return false;
                };
                let Some(stolen) = parent.operands.pop() else {
                    return false;
                };
                // A moved operator subtree sinks one level.
                let height = if stolen.as_operator().is_some() {
                    height + 1
                } else {
                    height.max(depth + 2)
                };
                node.operands.push(stolen);
                parent.operands.push(Expression::Operator(node));
                self.height = height;
                self.unbound = Some(depth + 1);
            }
        }
        true
    }

    /// Marks the open node at `depth` closed; it becomes the unbound node.
    fn close(&mut self, depth: usize) -> Option<&mut OperatorExpression> {
        self.unbound = Some(depth);
        let node = self.node_mut(depth)?;
        node.closed = true;
        Some(node)
    }
}

/// Spreads a comma chain into separate call arguments. Parenthesized
/// commas stay intact.
fn flatten_arguments(expression: Expression, out: &mut Vec<Expression>) {
    match expression {
        Expression::Operator(op) if op.kind() == OperatorKind::Comma => {
            for operand in op.operands {
                flatten_arguments(operand, out);
            }
        }
        other => out.push(other),
    }
}

impl<'a> Parser<'a> {
    /// Parses an expression, stopping before `;`, `}`, the end of input,
    /// or one of `terminators` when no two-part operator is open.
    pub(crate) fn parse_expression(
        &mut self,
        terminators: &[Terminator],
    ) -> Result<Expression, JsError> {
        self.nested(|parser| parser.read_expression(terminators))
    }

    fn read_expression(&mut self, terminators: &[Terminator]) -> Result<Expression, JsError> {
        let mut tree = TreeBuilder::default();
        let mut expect_operand = true;

        loop {
            let position = self.lexer.position();
            if self.nesting + tree.height > MAX_NESTING_DEPTH {
                return Err(nesting_too_deep(Some(position)));
            }
            let token = self.lexer.token().clone();

            if expect_operand {
                let prefix = OperatorToken::from_token(&token)
                    .and_then(|token| lookup(token, Fixity::Prefix));
                if let Some(operator) = prefix {
                    if !tree.attach_prefix(OperatorExpression::new(operator, position)) {
                        return Err(self.unexpected());
                    }
                    self.lexer.advance(LexMode::Operand)?;
                    continue;
                }
                if token.is_punct(Punctuator::RParen) && tree.unbound_is_empty_call() {
                    if let Some(depth) = tree.unbound {
                        if let Some(call) = tree.close(depth) {
                            self.finish_call(call);
                        }
                    }
                    self.lexer.advance(LexMode::Operator)?;
                    expect_operand = false;
                    continue;
                }
                let operand = self.parse_primary()?;
                if !tree.push_operand(operand) {
                    return Err(syntax_error(
                        format!("Unexpected {}", token),
                        Some(position),
                    ));
                }
                expect_operand = false;
                continue;
            }

            let nothing_open = tree.deepest_open().is_none();
            match &token {
                Token::EOF
                | Token::Punctuator(Punctuator::Semicolon)
                | Token::Punctuator(Punctuator::RBrace) => break,

                Token::Punctuator(
                    closing @ (Punctuator::RParen | Punctuator::RBracket | Punctuator::Colon),
                ) => {
                    let closing = *closing;
                    let Some(depth) = tree.deepest_open() else {
                        if terminators.contains(&Terminator::Punct(closing)) {
                            break;
                        }
                        return Err(self.unexpected());
                    };
                    if tree.node(depth).and_then(|node| node.operator.secondary) != Some(closing) {
                        return Err(self.unexpected());
                    }
                    let mut reopens = false;
                    if let Some(node) = tree.close(depth) {
                        match node.kind() {
                            OperatorKind::FunctionCall => self.finish_call(node),
                            OperatorKind::Conditional => reopens = true,
                            _ => {}
                        }
                    }
                    if reopens {
                        self.lexer.advance(LexMode::Operand)?;
                        expect_operand = true;
                    } else {
                        self.lexer.advance(LexMode::Operator)?;
                    }
                }

                Token::Punctuator(Punctuator::Comma)
                    if nothing_open
                        && terminators.contains(&Terminator::Punct(Punctuator::Comma)) =>
                {
                    break
                }
                Token::Keyword(Keyword::In)
                    if nothing_open && terminators.contains(&Terminator::In) =>
                {
                    break
                }
                Token::Identifier(word)
                    if word == "of" && nothing_open && terminators.contains(&Terminator::Of) =>
                {
                    break
                }
                // No line break is allowed before postfix ++/--.
                Token::Punctuator(Punctuator::PlusPlus | Punctuator::MinusMinus)
                    if self.lexer.newline_before() =>
                {
                    break
                }

                Token::Punctuator(Punctuator::Dot) => {
                    self.attach_operator(&mut tree, OperatorToken::Punct(Punctuator::Dot), position)?;
                    self.lexer.advance(LexMode::Operator)?;
                    let name_position = self.lexer.position();
                    let name = match self.lexer.token() {
                        Token::Identifier(name) => name.clone(),
                        Token::Keyword(keyword) => keyword.as_str().to_string(),
                        _ => return Err(self.unexpected()),
                    };
                    tree.push_operand(Expression::Literal {
                        value: LiteralValue::String(name),
                        position: name_position,
                    });
                    self.lexer.advance(LexMode::Operator)?;
                }

                Token::TemplateLiteral(_) | Token::TemplateHead(_) => {
                    self.attach_operator(&mut tree, OperatorToken::Template, position)?;
                    let template = self.parse_template()?;
                    tree.push_operand(template);
                }

                _ => {
                    let operator = OperatorToken::from_token(&token)
                        .and_then(|token| lookup(token, Fixity::InfixOrPostfix));
                    match operator {
                        Some(operator) => {
                            if !tree.attach_infix(OperatorExpression::new(operator, position)) {
                                return Err(self.unexpected());
                            }
                            if operator.is_postfix() {
                                self.lexer.advance(LexMode::Operator)?;
                            } else {
                                self.lexer.advance(LexMode::Operand)?;
                                expect_operand = true;
                            }
                        }
                        None if self.lexer.newline_before() => break,
                        None => return Err(self.unexpected()),
                    }
                }
            }
        }

        let expression = tree
            .root
            .ok_or_else(|| unexpected_eof(Some(self.lexer.position())))?;
        self.validate_expression(&expression)?;
        Ok(expression)
    }

    fn attach_operator(
        &mut self,
        tree: &mut TreeBuilder,
        token: OperatorToken,
        position: SourcePosition,
    ) -> Result<(), JsError> {
        let operator = lookup(token, Fixity::InfixOrPostfix).ok_or_else(|| self.unexpected())?;
        if tree.attach_infix(OperatorExpression::new(operator, position)) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    /// Spreads the argument list of a just-closed call and notes direct eval.
    fn finish_call(&mut self, call: &mut OperatorExpression) {
        if call.operands.len() == 2 {
            if let Some(arguments) = call.operands.pop() {
                flatten_arguments(arguments, &mut call.operands);
            }
        }
        if let Some(Expression::Identifier { name, .. }) = call.operands.first() {
            if name == "eval" {
                self.state.hints.has_eval = true;
                self.scopes.mark_direct_eval(self.state.scope);
            }
        }
    }

    /// Reads one operand and moves past it.
    fn parse_primary(&mut self) -> Result<Expression, JsError> {
        let position = self.lexer.position();
        let expression = match self.lexer.token().clone() {
            Token::Identifier(name) => {
                self.check_identifier_reference(&name, position)?;
                self.identifier_reference(name, position)
            }
            Token::Number(value) => Expression::Literal {
                value: LiteralValue::Number(value),
                position,
            },
            Token::String(value) => Expression::Literal {
                value: LiteralValue::String(value),
                position,
            },
            Token::Keyword(Keyword::True) => Expression::Literal {
                value: LiteralValue::Boolean(true),
                position,
            },
            Token::Keyword(Keyword::False) => Expression::Literal {
                value: LiteralValue::Boolean(false),
                position,
            },
            Token::Keyword(Keyword::Null) => Expression::Literal {
                value: LiteralValue::Null,
                position,
            },
            Token::Keyword(Keyword::This) => {
                self.state.hints.has_this = true;
                Expression::This { position }
            }
            Token::RegExp(pattern, flags) => Expression::RegExp {
                pattern,
                flags,
                position,
            },
            Token::TemplateLiteral(_) | Token::TemplateHead(_) => return self.parse_template(),
            Token::Punctuator(Punctuator::LBracket) => return self.parse_array_literal(),
            Token::Punctuator(Punctuator::LBrace) => return self.parse_object_literal(),
            Token::Keyword(Keyword::Function) => {
                let function = self.parse_function(false)?;
                self.lexer.advance(LexMode::Operator)?;
                return Ok(Expression::Function { function, position });
            }
            Token::Keyword(keyword) if keyword.is_reserved() => {
                return Err(syntax_error("Unexpected reserved word", Some(position)))
            }
            Token::EOF => return Err(unexpected_eof(Some(position))),
            _ => return Err(self.unexpected()),
        };
        self.lexer.advance(LexMode::Operator)?;
        Ok(expression)
    }

    /// Builds a reference to `name` from the current scope.
    pub(crate) fn identifier_reference(
        &mut self,
        name: String,
        position: SourcePosition,
    ) -> Expression {
        self.scopes.record_reference(self.state.scope, &name);
        self.state.hints.record_occurrence(&name);
        Expression::Identifier {
            name,
            scope: self.state.scope,
            position,
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expression, JsError> {
        let position = self.lexer.position();
        let mut elements = Vec::new();
        self.lexer.advance(LexMode::Operand)?;
        loop {
            match self.lexer.token() {
                Token::Punctuator(Punctuator::RBracket) => break,
                Token::Punctuator(Punctuator::Comma) => {
                    elements.push(None);
                    self.lexer.advance(LexMode::Operand)?;
                    continue;
                }
                _ => {}
            }
            let element = self.parse_expression(&[
                Terminator::Punct(Punctuator::Comma),
                Terminator::Punct(Punctuator::RBracket),
            ])?;
            elements.push(Some(element));
            match self.lexer.token() {
                Token::Punctuator(Punctuator::Comma) => self.lexer.advance(LexMode::Operand)?,
                Token::Punctuator(Punctuator::RBracket) => break,
                _ => return Err(self.unexpected()),
            }
        }
        self.lexer.advance(LexMode::Operator)?;
        Ok(Expression::Array { elements, position })
    }

    fn parse_object_literal(&mut self) -> Result<Expression, JsError> {
        let position = self.lexer.position();
        let mut properties = Vec::new();
        self.lexer.advance(LexMode::Operand)?;
        while !self.lexer.token().is_punct(Punctuator::RBrace) {
            let key_position = self.lexer.position();
            let (key, shorthand) = match self.lexer.token() {
                Token::Identifier(name) => (name.clone(), true),
                Token::Keyword(keyword) => (keyword.as_str().to_string(), false),
                Token::String(value) => (value.clone(), false),
                Token::Number(value) => (number_to_string(*value), false),
                Token::EOF => return Err(unexpected_eof(Some(key_position))),
                _ => return Err(self.unexpected()),
            };
            self.lexer.advance(LexMode::Operator)?;

            let value = match self.lexer.token() {
                Token::Punctuator(Punctuator::Colon) => {
                    self.lexer.advance(LexMode::Operand)?;
                    self.parse_expression(&[Terminator::Punct(Punctuator::Comma)])?
                }
                Token::Punctuator(Punctuator::Comma | Punctuator::RBrace) if shorthand => {
                    self.check_identifier_reference(&key, key_position)?;
                    self.identifier_reference(key.clone(), key_position)
                }
                _ => return Err(self.unexpected()),
            };
            properties.push(ObjectProperty { key, value });

            match self.lexer.token() {
                Token::Punctuator(Punctuator::Comma) => self.lexer.advance(LexMode::Operand)?,
                Token::Punctuator(Punctuator::RBrace) => {}
                _ => return Err(self.unexpected()),
            }
        }
        self.lexer.advance(LexMode::Operator)?;
        Ok(Expression::Object {
            properties,
            position,
        })
    }

    /// Reads a template literal starting at its first token.
    fn parse_template(&mut self) -> Result<Expression, JsError> {
        let position = self.lexer.position();
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();
        match self.lexer.token().clone() {
            Token::TemplateLiteral(text) => quasis.push(text),
            Token::TemplateHead(text) => {
                quasis.push(text);
                loop {
                    self.lexer.advance(LexMode::Operand)?;
                    expressions.push(self.parse_expression(&[])?);
                    self.lexer.rescan_template_continuation()?;
                    match self.lexer.token().clone() {
                        Token::TemplateMiddle(text) => quasis.push(text),
                        Token::TemplateTail(text) => {
                            quasis.push(text);
                            break;
                        }
                        _ => return Err(self.unexpected()),
                    }
                }
            }
            _ => return Err(self.unexpected()),
        }
        self.lexer.advance(LexMode::Operator)?;
        Ok(Expression::Template {
            quasis,
            expressions,
            position,
        })
    }

    /// Checks a finished tree: every two-part operator closed, operand
    /// counts in range, no unary operand directly under `**`, and the
    /// strict-mode restrictions on `eval`, `arguments` and `delete`.
    /// Array, object and template parts were checked when they were read.
    fn validate_expression(&self, expression: &Expression) -> Result<(), JsError> {
        let Expression::Operator(node) = expression else {
            return Ok(());
        };
        let operator = node.operator;

        if let (Some(secondary), false) = (operator.secondary, node.closed) {
            return Err(syntax_error(
                format!("Expected '{}' to complete the expression", secondary.as_str()),
                Some(node.position),
            ));
        }
        let count = node.operands.len();
        if operator.kind == OperatorKind::FunctionCall && count > operator.max_operands {
            return Err(syntax_error(
                format!(
                    "Too many arguments in function call (only {} allowed)",
                    MAX_CALL_ARGUMENTS
                ),
                Some(node.position),
            ));
        }
        if count < operator.min_operands || count > operator.max_operands {
            return Err(syntax_error(
                format!("Invalid expression: {:?} with {} operands", operator.kind, count),
                Some(node.position),
            ));
        }

        if operator.kind == OperatorKind::Exponent {
            if let Some(Expression::Operator(left)) = node.operands.first() {
                if left.kind().is_unary() {
                    return Err(syntax_error(
                        "Unary operator used immediately before exponentiation expression. \
                         Parenthesis must be used to disambiguate operator precedence",
                        Some(left.position),
                    ));
                }
            }
        }

        if self.state.strict {
            let target = node.operands.first().map(Expression::ungrouped);
            if operator.kind.is_assignment() || operator.kind.is_update() {
                if let Some(Expression::Identifier { name, position, .. }) = target {
                    if name == "eval" || name == "arguments" {
                        return Err(syntax_error(
                            "Unexpected eval or arguments in strict mode",
                            Some(*position),
                        ));
                    }
                }
            }
            if operator.kind == OperatorKind::Delete {
                if let Some(Expression::Identifier { .. }) = target {
                    return Err(syntax_error(
                        "Delete of an unqualified identifier in strict mode.",
                        Some(node.position),
                    ));
                }
            }
        }

        for operand in &node.operands {
            stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
                self.validate_expression(operand)
            })?;
        }
        Ok(())
    }
}
