//! Bytecode generation from AST
//!
//! Lowers a parsed [`Program`] to one [`BytecodeChunk`] per function. Scope
//! storage is decided lazily, the first time the generator enters a scope;
//! names are then resolved against the [`ScopeTree`] to a register, a
//! record hop count, the global object, or a run-time chain lookup.
//!
//! Operators are lowered with their exact coercions: `+` goes through the
//! shared `Add` instruction, the other arithmetic operators through
//! ToNumber, shifts through ToInt32/ToUint32 with the count masked to five
//! bits, and relational operators through `LessThan`/`LessThanOrEqual` with
//! a swap flag so the left operand is always evaluated first.

use std::mem;

use bytecode_system::{
    BytecodeChunk, CompareKind, FunctionTemplate, Opcode, RegisterId, Value as BytecodeValue,
};
use core_types::{ErrorKind, JsError, SourcePosition};
use tracing::trace;

use crate::ast::{
    CatchClause, Expression, ForBinding, ForInit, FunctionLiteral, LiteralValue,
    OperatorExpression, Program, Statement, SwitchCase, VariableDeclarator, VariableKind,
};
use crate::context::MethodContext;
use crate::operators::OperatorKind;
use crate::parser::{STACK_RED_ZONE, STACK_SEGMENT};
use crate::scope::{Binding, DeclarationKind, ScopeId, ScopeKind, ScopeTree, StorageStrategy};

/// Code generated for a compilation unit.
#[derive(Debug)]
pub struct GeneratedUnit {
    /// Top-level routine
    pub chunk: BytecodeChunk,
    /// Every function of the unit, innermost first
    pub methods: Vec<MethodContext>,
}

/// An entry of the control stack: what a `break`, `continue` or `return`
/// has to unwind on its way out.
#[derive(Debug)]
enum Control<'p> {
    Loop {
        labels: Vec<String>,
        breaks: Vec<usize>,
        continues: Vec<usize>,
    },
    Breakable {
        labels: Vec<String>,
        breaks: Vec<usize>,
        is_switch: bool,
    },
    /// A pushed scope record
    Scope,
    /// An installed exception handler
    Try,
    /// A finalizer to run on the way out
    Finally(&'p Statement),
}

/// Where an assignment stores its value.
enum Target<'p> {
    Name {
        name: &'p str,
        scope: ScopeId,
        position: SourcePosition,
    },
    Member {
        object: &'p Expression,
        name: String,
    },
    Index {
        object: &'p Expression,
        key: &'p Expression,
    },
    Invalid(&'p Expression),
}

/// Bytecode generator that converts AST to bytecode
pub struct BytecodeGenerator<'p> {
    tree: &'p ScopeTree,
    chunk: BytecodeChunk,
    next_register: u32,
    free_temps: Vec<RegisterId>,
    strict: bool,
    completion: Option<RegisterId>,
    controls: Vec<Control<'p>>,
    pending_labels: Vec<String>,
    methods: Vec<MethodContext>,
}

impl<'p> BytecodeGenerator<'p> {
    fn new(tree: &'p ScopeTree, strict: bool) -> Self {
        Self {
            tree,
            chunk: BytecodeChunk::new(),
            next_register: 0,
            free_temps: Vec::new(),
            strict,
            completion: None,
            controls: Vec::new(),
            pending_labels: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Generates the top-level routine of global or eval code. The routine
    /// returns the value of the last expression statement executed.
    pub fn generate_program(program: &'p Program) -> Result<GeneratedUnit, JsError> {
        let tree = &program.scope_tree;
        let root = program.root_scope;
        let mut generator = Self::new(tree, program.strict);

        let completion = generator.allocate_register();
        generator.completion = Some(completion);
        generator.chunk.emit(Opcode::LoadUndefined);
        generator.chunk.emit(Opcode::StoreLocal(completion));

        let root_scope = tree.get(root);
        for variable in root_scope.variables.values() {
            if variable.kind.is_lexical() {
                continue;
            }
            match root_scope.kind {
                ScopeKind::Global => {
                    generator
                        .chunk
                        .emit(Opcode::DeclareGlobal(variable.name.clone()));
                }
                ScopeKind::Eval => {
                    generator.chunk.emit(Opcode::DeclareVar(variable.name.clone()));
                }
                _ => {}
            }
        }

        generator.open_scope(root);
        generator.materialize_functions(root)?;
        for statement in &program.statements {
            generator.statement(statement)?;
        }

        generator.chunk.emit(Opcode::LoadLocal(completion));
        generator.chunk.emit(Opcode::Return);
        generator.chunk.register_count = generator.next_register;
        trace!(
            instructions = generator.chunk.instruction_count(),
            functions = generator.methods.len(),
            "generated top-level code"
        );
        Ok(GeneratedUnit {
            chunk: generator.chunk,
            methods: generator.methods,
        })
    }

    /// Generates the routine of a function-body compilation unit, one
    /// parsed in [`CodeContext::Function`](crate::CodeContext::Function).
    pub fn generate_function_unit(program: &'p Program) -> Result<GeneratedUnit, JsError> {
        let function = program.function.as_deref().ok_or_else(|| {
            JsError::new(ErrorKind::InternalError, "compilation unit is not a function body")
        })?;
        let mut outer = Self::new(&program.scope_tree, program.strict);
        outer.decide(program.root_scope);

        let mut methods = Vec::new();
        let template = Self::generate_function(&program.scope_tree, function, &mut methods)?;
        trace!(
            instructions = template.chunk.instruction_count(),
            functions = methods.len(),
            "generated function unit"
        );
        Ok(GeneratedUnit {
            chunk: template.chunk,
            methods,
        })
    }

    /// Generates the routine of `function`. Contexts of the function and of
    /// every function nested in it are appended to `methods`.
    pub fn generate_function(
        tree: &'p ScopeTree,
        function: &'p FunctionLiteral,
        methods: &mut Vec<MethodContext>,
    ) -> Result<FunctionTemplate, JsError> {
        let mut generator = Self::new(tree, function.strict);
        generator.function_body(function)?;
        generator.chunk.register_count = generator.next_register;
        methods.append(&mut generator.methods);

        Ok(FunctionTemplate {
            name: function.name.clone(),
            params: function.params.clone(),
            strict: function.strict,
            chunk: generator.chunk,
            span: function.span,
        })
    }

    fn function_body(&mut self, function: &'p FunctionLiteral) -> Result<(), JsError> {
        let position = SourcePosition::new(function.span.line, 1, function.span.start);

        if let (Some(name_scope), Some(name)) = (function.name_scope, function.name.as_deref()) {
            self.open_scope(name_scope);
            self.chunk.emit(Opcode::LoadCallee);
            self.store_name(name, name_scope, position, true)?;
        }

        self.open_scope(function.scope);
        for (index, param) in function.params.iter().enumerate() {
            self.chunk.emit(Opcode::LoadArgument(index as u32));
            self.store_name(param, function.scope, position, true)?;
        }
        if function.uses_arguments {
            self.chunk.emit(Opcode::CreateArguments);
            self.store_name("arguments", function.scope, position, true)?;
        }
        self.materialize_functions(function.scope)?;

        for statement in &function.body {
            self.statement(statement)?;
        }
        self.chunk.emit(Opcode::LoadUndefined);
        self.chunk.emit(Opcode::Return);
        Ok(())
    }

    fn allocate_register(&mut self) -> RegisterId {
        let register = RegisterId(self.next_register);
        self.next_register += 1;
        register
    }

    fn temp(&mut self) -> RegisterId {
        match self.free_temps.pop() {
            Some(register) => register,
            None => self.allocate_register(),
        }
    }

    fn release(&mut self, register: RegisterId) {
        self.free_temps.push(register);
    }

    fn emit_at(&mut self, opcode: Opcode, position: SourcePosition) -> usize {
        self.chunk.emit_with_position(opcode, position)
    }

    fn patch_jump(&mut self, at: usize) {
        self.patch_jump_to(at, self.chunk.next_index());
    }

    fn patch_jump_to(&mut self, at: usize, target: usize) {
        if let Some(opcode) = self.chunk.instructions.get_mut(at) {
            match opcode {
                Opcode::Jump(t) | Opcode::JumpIfTrue(t) | Opcode::JumpIfFalse(t) | Opcode::PushTry(t) => {
                    *t = target
                }
                _ => {}
            }
        }
    }

    fn load_string(&mut self, text: &str) {
        let index = self.chunk.add_constant(BytecodeValue::String(text.to_string()));
        self.chunk.emit(Opcode::LoadConstant(index));
    }

    fn load_number(&mut self, value: f64) {
        let index = self.chunk.add_constant(BytecodeValue::Number(value));
        self.chunk.emit(Opcode::LoadConstant(index));
    }

    fn decide(&mut self, scope: ScopeId) -> &'p StorageStrategy {
        let tree: &'p ScopeTree = self.tree;
        let next = &mut self.next_register;
        tree.decide_storage(scope, &mut || {
            let register = RegisterId(*next);
            *next += 1;
            register
        })
    }

    /// Decides storage for `scope` and emits its entry: a pushed record, or
    /// fresh values for its direct slots. Returns whether a record was
    /// pushed.
    fn open_scope(&mut self, scope: ScopeId) -> bool {
        let tree: &'p ScopeTree = self.tree;
        let info = tree.get(scope);
        match self.decide(scope) {
            StorageStrategy::DynamicRecord {
                layout,
                pushes_record: true,
            } => {
                self.chunk.emit(Opcode::PushScope(layout.clone()));
                true
            }
            StorageStrategy::DynamicRecord { .. } => false,
            StorageStrategy::DirectSlots { registers } => {
                for (name, register) in registers {
                    match info.variables.get(name).map(|v| v.kind) {
                        Some(DeclarationKind::Let | DeclarationKind::Const) => {
                            self.chunk.emit(Opcode::LoadUninitialized);
                            self.chunk.emit(Opcode::StoreLocal(*register));
                        }
                        Some(DeclarationKind::Var) => {
                            self.chunk.emit(Opcode::LoadUndefined);
                            self.chunk.emit(Opcode::StoreLocal(*register));
                        }
                        _ => {}
                    }
                }
                false
            }
        }
    }

    /// Creates the closures of the function declarations hoisted to `scope`.
    fn materialize_functions(&mut self, scope: ScopeId) -> Result<(), JsError> {
        let tree: &'p ScopeTree = self.tree;
        for function in &tree.get(scope).hoisted_functions {
            let index = self.compile_function(function)?;
            let position = SourcePosition::new(function.span.line, 1, function.span.start);
            self.chunk.emit(Opcode::CreateClosure(index));
            let name = function.name.as_deref().unwrap_or_default();
            self.store_name(name, scope, position, true)?;
        }
        Ok(())
    }

    fn compile_function(&mut self, function: &'p FunctionLiteral) -> Result<usize, JsError> {
        let template = Self::generate_function(self.tree, function, &mut self.methods)?;
        let index = self.chunk.add_nested_function(template);
        let routine = self.chunk.nested_functions()[index].clone();
        trace!(
            name = function.name.as_deref().unwrap_or("<anonymous>"),
            index,
            "compiled nested function"
        );
        self.methods.push(MethodContext {
            scope: function.scope,
            name: function.name.clone(),
            hints: function.hints.clone(),
            span: function.span,
            routine,
        });
        Ok(index)
    }

    /// Runs `body` inside a block-level scope, popping its record afterwards.
    fn in_block_scope(
        &mut self,
        scope: ScopeId,
        body: impl FnOnce(&mut Self) -> Result<(), JsError>,
    ) -> Result<(), JsError> {
        let pushed = self.open_scope(scope);
        if pushed {
            self.controls.push(Control::Scope);
        }
        self.materialize_functions(scope)?;
        body(self)?;
        if pushed {
            self.controls.pop();
            self.chunk.emit(Opcode::PopScope);
        }
        Ok(())
    }

    /// Emits a load of `name` as seen from `scope`. In `typeof` position an
    /// unresolvable name loads `undefined` instead of throwing.
    fn load_name(
        &mut self,
        name: &str,
        scope: ScopeId,
        position: SourcePosition,
        in_typeof: bool,
    ) -> Result<(), JsError> {
        let resolution = self.tree.resolve(scope, name)?;
        let mut done = Vec::new();
        for hops in resolution.object_checks {
            self.chunk.emit(Opcode::ScopeHas {
                hops,
                name: name.to_string(),
            });
            let skip = self.chunk.emit(Opcode::JumpIfFalse(0));
            self.emit_at(
                Opcode::LoadScoped {
                    hops,
                    name: name.to_string(),
                },
                position,
            );
            done.push(self.chunk.emit(Opcode::Jump(0)));
            self.patch_jump(skip);
        }

        match resolution.binding {
            Binding::Slot { register, kind } => {
                self.chunk.emit(Opcode::LoadLocal(register));
                if kind.is_lexical() {
                    self.emit_at(Opcode::CheckInitialized(name.to_string()), position);
                }
            }
            Binding::Record { hops, .. } => {
                self.emit_at(
                    Opcode::LoadScoped {
                        hops,
                        name: name.to_string(),
                    },
                    position,
                );
            }
            Binding::Global => {
                self.emit_at(
                    Opcode::LoadGlobal {
                        name: name.to_string(),
                        throw_if_missing: !in_typeof,
                    },
                    position,
                );
            }
            Binding::Dynamic => {
                self.emit_at(
                    Opcode::LoadName {
                        name: name.to_string(),
                        throw_if_missing: !in_typeof,
                    },
                    position,
                );
            }
        }

        for jump in done {
            self.patch_jump(jump);
        }
        Ok(())
    }

    /// Emits a store of the value on top of the stack into `name`. With
    /// `init` the binding is being declared and leaves its uninitialized
    /// state.
    fn store_name(
        &mut self,
        name: &str,
        scope: ScopeId,
        position: SourcePosition,
        init: bool,
    ) -> Result<(), JsError> {
        let resolution = self.tree.resolve(scope, name)?;
        let mut done = Vec::new();
        for hops in resolution.object_checks {
            self.chunk.emit(Opcode::ScopeHas {
                hops,
                name: name.to_string(),
            });
            let skip = self.chunk.emit(Opcode::JumpIfFalse(0));
            self.emit_at(
                Opcode::StoreScoped {
                    hops,
                    name: name.to_string(),
                    strict: self.strict,
                },
                position,
            );
            done.push(self.chunk.emit(Opcode::Jump(0)));
            self.patch_jump(skip);
        }

        match resolution.binding {
            Binding::Slot { register, kind } => match kind {
                _ if init => {
                    self.chunk.emit(Opcode::StoreLocal(register));
                }
                DeclarationKind::Const => {
                    self.chunk.emit(Opcode::Pop);
                    self.emit_at(
                        Opcode::ThrowError {
                            kind: ErrorKind::TypeError,
                            message: "Assignment to constant variable.".to_string(),
                        },
                        position,
                    );
                }
                DeclarationKind::FunctionName => {
                    self.chunk.emit(Opcode::Pop);
                    if self.strict {
                        self.emit_at(
                            Opcode::ThrowError {
                                kind: ErrorKind::TypeError,
                                message: "Assignment to constant variable.".to_string(),
                            },
                            position,
                        );
                    }
                }
                DeclarationKind::Let => {
                    self.chunk.emit(Opcode::LoadLocal(register));
                    self.emit_at(Opcode::CheckInitialized(name.to_string()), position);
                    self.chunk.emit(Opcode::Pop);
                    self.chunk.emit(Opcode::StoreLocal(register));
                }
                _ => {
                    self.chunk.emit(Opcode::StoreLocal(register));
                }
            },
            Binding::Record { hops, kind } => {
                if init {
                    self.chunk.emit(Opcode::InitScoped {
                        hops,
                        name: name.to_string(),
                    });
                } else if kind == DeclarationKind::FunctionName && !self.strict {
                    self.chunk.emit(Opcode::Pop);
                } else {
                    self.emit_at(
                        Opcode::StoreScoped {
                            hops,
                            name: name.to_string(),
                            strict: self.strict,
                        },
                        position,
                    );
                }
            }
            Binding::Global => {
                self.emit_at(
                    Opcode::StoreGlobal {
                        name: name.to_string(),
                        strict: self.strict,
                    },
                    position,
                );
            }
            Binding::Dynamic => {
                self.emit_at(
                    Opcode::StoreName {
                        name: name.to_string(),
                        strict: self.strict,
                    },
                    position,
                );
            }
        }

        for jump in done {
            self.patch_jump(jump);
        }
        Ok(())
    }

    // Statements

    fn statement(&mut self, statement: &'p Statement) -> Result<(), JsError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.statement_kind(statement))
    }

    fn statement_kind(&mut self, statement: &'p Statement) -> Result<(), JsError> {
        match statement {
            Statement::Expression { expression, .. } => {
                self.expression(expression)?;
                match self.completion {
                    Some(register) => self.chunk.emit(Opcode::StoreLocal(register)),
                    None => self.chunk.emit(Opcode::Pop),
                };
            }
            Statement::VariableDeclaration {
                kind, declarations, ..
            } => self.declarations(*kind, declarations, false)?,
            Statement::FunctionDeclaration { .. }
            | Statement::Empty { .. }
            | Statement::Debugger { .. } => {}
            Statement::Block { body, scope, .. } => {
                self.in_block_scope(*scope, |this| this.statements(body))?;
            }
            Statement::If {
                test,
                consequent,
                alternate,
                ..
            } => {
                self.expression(test)?;
                let to_else = self.chunk.emit(Opcode::JumpIfFalse(0));
                self.statement(consequent)?;
                match alternate {
                    Some(alternate) => {
                        let to_end = self.chunk.emit(Opcode::Jump(0));
                        self.patch_jump(to_else);
                        self.statement(alternate)?;
                        self.patch_jump(to_end);
                    }
                    None => self.patch_jump(to_else),
                }
            }
            Statement::While { test, body, .. } => {
                let start = self.chunk.next_index();
                self.expression(test)?;
                let exit = self.chunk.emit(Opcode::JumpIfFalse(0));
                self.begin_loop();
                self.statement(body)?;
                self.chunk.emit(Opcode::Jump(start));
                self.end_loop(start);
                self.patch_jump(exit);
            }
            Statement::DoWhile { body, test, .. } => {
                let start = self.chunk.next_index();
                self.begin_loop();
                self.statement(body)?;
                let continue_at = self.chunk.next_index();
                self.expression(test)?;
                self.chunk.emit(Opcode::JumpIfTrue(start));
                self.end_loop(continue_at);
            }
            Statement::For {
                init,
                test,
                update,
                body,
                scope,
                ..
            } => match scope {
                Some(scope) => self.in_block_scope(*scope, |this| {
                    this.for_loop(init.as_ref(), test.as_ref(), update.as_ref(), body, Some(*scope))
                })?,
                None => self.for_loop(init.as_ref(), test.as_ref(), update.as_ref(), body, None)?,
            },
            Statement::ForIn {
                left,
                right,
                body,
                scope,
                ..
            } => self.enumeration(left, right, body, *scope, true)?,
            Statement::ForOf {
                left,
                right,
                body,
                scope,
                ..
            } => self.enumeration(left, right, body, *scope, false)?,
            Statement::Continue { label, span } => self.jump_out(label.as_deref(), true, span.line)?,
            Statement::Break { label, span } => self.jump_out(label.as_deref(), false, span.line)?,
            Statement::Return { argument, .. } => {
                match argument {
                    Some(argument) => self.expression(argument)?,
                    None => {
                        self.chunk.emit(Opcode::LoadUndefined);
                    }
                }
                if self.controls.iter().any(|c| matches!(c, Control::Finally(_))) {
                    let value = self.temp();
                    self.chunk.emit(Opcode::StoreLocal(value));
                    self.unwind_to(0)?;
                    self.chunk.emit(Opcode::LoadLocal(value));
                    self.release(value);
                }
                self.chunk.emit(Opcode::Return);
            }
            Statement::With {
                object, body, scope, ..
            } => {
                self.expression(object)?;
                self.decide(*scope);
                self.emit_at(Opcode::PushWithScope, object.position());
                self.controls.push(Control::Scope);
                self.materialize_functions(*scope)?;
                self.statement(body)?;
                self.controls.pop();
                self.chunk.emit(Opcode::PopScope);
            }
            Statement::Switch {
                discriminant,
                cases,
                scope,
                ..
            } => self.switch(discriminant, cases, *scope)?,
            Statement::Throw { argument, .. } => {
                self.expression(argument)?;
                self.emit_at(Opcode::Throw, argument.position());
            }
            Statement::Try {
                block,
                handler,
                finalizer,
                ..
            } => self.try_statement(block, handler.as_ref(), finalizer.as_deref())?,
            Statement::Labeled { label, body, .. } => {
                if body.is_iteration() {
                    self.pending_labels.push(label.clone());
                    self.statement(body)?;
                } else {
                    let mut labels = mem::take(&mut self.pending_labels);
                    labels.push(label.clone());
                    self.controls.push(Control::Breakable {
                        labels,
                        breaks: Vec::new(),
                        is_switch: false,
                    });
                    self.statement(body)?;
                    self.finish_breakable();
                }
            }
        }
        Ok(())
    }

    fn statements(&mut self, statements: &'p [Statement]) -> Result<(), JsError> {
        for statement in statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    /// Declarations initialize lexical bindings even without an
    /// initializer. In a `for` head, `var x` without one resets `x` to
    /// undefined.
    fn declarations(
        &mut self,
        kind: VariableKind,
        declarations: &'p [VariableDeclarator],
        in_for_head: bool,
    ) -> Result<(), JsError> {
        for declaration in declarations {
            match &declaration.init {
                Some(init) => self.expression(init)?,
                None if kind != VariableKind::Var || in_for_head => {
                    self.chunk.emit(Opcode::LoadUndefined);
                }
                None => continue,
            }
            self.store_name(
                &declaration.name,
                declaration.scope,
                declaration.position,
                kind != VariableKind::Var,
            )?;
        }
        Ok(())
    }

    fn begin_loop(&mut self) {
        let labels = mem::take(&mut self.pending_labels);
        self.controls.push(Control::Loop {
            labels,
            breaks: Vec::new(),
            continues: Vec::new(),
        });
    }

    /// Pops the innermost loop, sending its `continue`s to `continue_at` and
    /// its `break`s to the next instruction.
    fn end_loop(&mut self, continue_at: usize) {
        if let Some(Control::Loop {
            breaks, continues, ..
        }) = self.controls.pop()
        {
            for jump in continues {
                self.patch_jump_to(jump, continue_at);
            }
            for jump in breaks {
                self.patch_jump(jump);
            }
        }
    }

    fn finish_breakable(&mut self) {
        if let Some(Control::Breakable { breaks, .. }) = self.controls.pop() {
            for jump in breaks {
                self.patch_jump(jump);
            }
        }
    }

    fn for_loop(
        &mut self,
        init: Option<&'p ForInit>,
        test: Option<&'p Expression>,
        update: Option<&'p Expression>,
        body: &'p Statement,
        head_scope: Option<ScopeId>,
    ) -> Result<(), JsError> {
        match init {
            Some(ForInit::Declaration { kind, declarations }) => {
                self.declarations(*kind, declarations, true)?
            }
            Some(ForInit::Expression(expression)) => {
                self.expression(expression)?;
                self.chunk.emit(Opcode::Pop);
            }
            None => {}
        }

        let start = self.chunk.next_index();
        let exit = match test {
            Some(test) => {
                self.expression(test)?;
                Some(self.chunk.emit(Opcode::JumpIfFalse(0)))
            }
            None => None,
        };

        self.begin_loop();
        self.statement(body)?;
        let continue_at = self.chunk.next_index();
        if self.head_has_record(head_scope) {
            self.chunk.emit(Opcode::CloneScope);
        }
        if let Some(update) = update {
            self.expression(update)?;
            self.chunk.emit(Opcode::Pop);
        }
        self.chunk.emit(Opcode::Jump(start));
        self.end_loop(continue_at);
        if let Some(exit) = exit {
            self.patch_jump(exit);
        }
        Ok(())
    }

    fn head_has_record(&self, head_scope: Option<ScopeId>) -> bool {
        head_scope
            .and_then(|scope| self.tree.get(scope).strategy())
            .is_some_and(|strategy| {
                matches!(
                    strategy,
                    StorageStrategy::DynamicRecord {
                        pushes_record: true,
                        ..
                    }
                )
            })
    }

    /// `for-in` walks the enumerable keys of the object; `for-of` walks the
    /// indexed elements of an array or string.
    fn enumeration(
        &mut self,
        left: &'p ForBinding,
        right: &'p Expression,
        body: &'p Statement,
        head_scope: Option<ScopeId>,
        keys: bool,
    ) -> Result<(), JsError> {
        let pushed = match head_scope {
            Some(scope) => {
                let pushed = self.open_scope(scope);
                if pushed {
                    self.controls.push(Control::Scope);
                }
                pushed
            }
            None => false,
        };

        self.expression(right)?;
        if keys {
            self.emit_at(Opcode::EnumerateKeys, right.position());
        }
        let sequence = self.allocate_register();
        let index = self.allocate_register();
        self.chunk.emit(Opcode::StoreLocal(sequence));
        self.load_number(0.0);
        self.chunk.emit(Opcode::StoreLocal(index));

        let start = self.chunk.next_index();
        self.chunk.emit(Opcode::LoadLocal(index));
        self.chunk.emit(Opcode::LoadLocal(sequence));
        self.emit_at(Opcode::LoadProperty("length".to_string()), right.position());
        self.chunk.emit(Opcode::Compare {
            kind: CompareKind::LessThan,
            swap: false,
        });
        let exit = self.chunk.emit(Opcode::JumpIfFalse(0));

        if pushed {
            self.chunk.emit(Opcode::CloneScope);
        }
        self.chunk.emit(Opcode::LoadLocal(sequence));
        self.chunk.emit(Opcode::LoadLocal(index));
        self.chunk.emit(Opcode::GetIndex);
        match left {
            ForBinding::Declaration {
                kind,
                name,
                scope,
                position,
            } => self.store_name(name, *scope, *position, *kind != VariableKind::Var)?,
            ForBinding::Target(target) => self.store_into(target)?,
        }

        self.begin_loop();
        self.statement(body)?;
        let continue_at = self.chunk.next_index();
        self.chunk.emit(Opcode::LoadLocal(index));
        self.chunk.emit(Opcode::Inc);
        self.chunk.emit(Opcode::StoreLocal(index));
        self.chunk.emit(Opcode::Jump(start));
        self.end_loop(continue_at);
        self.patch_jump(exit);

        if pushed {
            self.controls.pop();
            self.chunk.emit(Opcode::PopScope);
        }
        Ok(())
    }

    /// Stores the value on top of the stack into an assignment target,
    /// consuming it.
    fn store_into(&mut self, target: &'p Expression) -> Result<(), JsError> {
        match Self::target_of(target) {
            Target::Name {
                name,
                scope,
                position,
            } => self.store_name(name, scope, position, false),
            Target::Member { object, name } => {
                let value = self.temp();
                self.chunk.emit(Opcode::StoreLocal(value));
                self.expression(object)?;
                self.chunk.emit(Opcode::LoadLocal(value));
                self.emit_at(Opcode::StoreProperty(name), target.position());
                self.chunk.emit(Opcode::Pop);
                self.release(value);
                Ok(())
            }
            Target::Index { object, key } => {
                let value = self.temp();
                self.chunk.emit(Opcode::StoreLocal(value));
                self.expression(object)?;
                self.expression(key)?;
                self.chunk.emit(Opcode::LoadLocal(value));
                self.emit_at(Opcode::SetIndex, target.position());
                self.chunk.emit(Opcode::Pop);
                self.release(value);
                Ok(())
            }
            Target::Invalid(_) => {
                self.chunk.emit(Opcode::Pop);
                self.invalid_target(target.position(), "Invalid left-hand side in for-loop");
                self.chunk.emit(Opcode::Pop);
                Ok(())
            }
        }
    }

    fn jump_out(&mut self, label: Option<&str>, is_continue: bool, line: u32) -> Result<(), JsError> {
        let target = self.controls.iter().rposition(|control| match (control, label) {
            (Control::Loop { .. }, None) => true,
            (Control::Breakable { is_switch, .. }, None) => !is_continue && *is_switch,
            (Control::Loop { labels, .. }, Some(label)) => labels.iter().any(|l| l == label),
            (Control::Breakable { labels, .. }, Some(label)) => {
                !is_continue && labels.iter().any(|l| l == label)
            }
            _ => false,
        });
        let Some(target) = target else {
            return Err(JsError::new(
                ErrorKind::InternalError,
                format!("no target for jump on line {}", line),
            ));
        };

        self.unwind_to(target + 1)?;
        let jump = self.chunk.emit(Opcode::Jump(0));
        match &mut self.controls[target] {
            Control::Loop {
                breaks, continues, ..
            } => {
                if is_continue {
                    continues.push(jump)
                } else {
                    breaks.push(jump)
                }
            }
            Control::Breakable { breaks, .. } => breaks.push(jump),
            _ => {}
        }
        Ok(())
    }

    /// Leaves every control above `depth`: pops records and handlers and
    /// runs finalizers inline.
    fn unwind_to(&mut self, depth: usize) -> Result<(), JsError> {
        for index in (depth..self.controls.len()).rev() {
            let finalizer = match &self.controls[index] {
                Control::Scope => {
                    self.chunk.emit(Opcode::PopScope);
                    None
                }
                Control::Try => {
                    self.chunk.emit(Opcode::PopTry);
                    None
                }
                Control::Finally(statement) => Some(*statement),
                _ => None,
            };
            if let Some(finalizer) = finalizer {
                let saved = self.controls.split_off(index);
                let result = self.statement(finalizer);
                self.controls.extend(saved);
                result?;
            }
        }
        Ok(())
    }

    fn switch(
        &mut self,
        discriminant: &'p Expression,
        cases: &'p [SwitchCase],
        scope: ScopeId,
    ) -> Result<(), JsError> {
        self.expression(discriminant)?;
        let value = self.allocate_register();
        self.chunk.emit(Opcode::StoreLocal(value));

        self.in_block_scope(scope, |this| {
            let labels = mem::take(&mut this.pending_labels);
            this.controls.push(Control::Breakable {
                labels,
                breaks: Vec::new(),
                is_switch: true,
            });

            let mut entries = Vec::with_capacity(cases.len());
            for case in cases {
                match &case.test {
                    Some(test) => {
                        this.chunk.emit(Opcode::LoadLocal(value));
                        this.expression(test)?;
                        this.chunk.emit(Opcode::StrictEqual);
                        entries.push(Some(this.chunk.emit(Opcode::JumpIfTrue(0))));
                    }
                    None => entries.push(None),
                }
            }
            let fallback = this.chunk.emit(Opcode::Jump(0));
            let mut default_entry = None;

            for (case, entry) in cases.iter().zip(entries) {
                match entry {
                    Some(jump) => this.patch_jump(jump),
                    None => default_entry = Some(this.chunk.next_index()),
                }
                this.statements(&case.consequent)?;
            }
            match default_entry {
                Some(target) => this.patch_jump_to(fallback, target),
                None => this.patch_jump(fallback),
            }
            this.finish_breakable();
            Ok(())
        })
    }

    fn try_statement(
        &mut self,
        block: &'p Statement,
        handler: Option<&'p CatchClause>,
        finalizer: Option<&'p Statement>,
    ) -> Result<(), JsError> {
        if let Some(finalizer) = finalizer {
            self.controls.push(Control::Finally(finalizer));
        }

        let to_handler = self.chunk.emit(Opcode::PushTry(0));
        self.controls.push(Control::Try);
        self.statement(block)?;
        self.controls.pop();
        self.chunk.emit(Opcode::PopTry);
        let past_handler = self.chunk.emit(Opcode::Jump(0));

        let mut to_rethrow = None;
        self.patch_jump(to_handler);
        match handler {
            Some(handler) => {
                if finalizer.is_some() {
                    to_rethrow = Some(self.chunk.emit(Opcode::PushTry(0)));
                    self.controls.push(Control::Try);
                }
                // The exception value is on the stack.
                let exception = self.temp();
                self.chunk.emit(Opcode::StoreLocal(exception));
                let position = block.span();
                let position = SourcePosition::new(position.line, 1, position.start);
                self.in_block_scope(handler.scope, |this| {
                    this.chunk.emit(Opcode::LoadLocal(exception));
                    this.store_name(&handler.param, handler.scope, position, true)?;
                    this.statements(&handler.body)
                })?;
                self.release(exception);
                if finalizer.is_some() {
                    self.controls.pop();
                    self.chunk.emit(Opcode::PopTry);
                }
            }
            None => to_rethrow = Some(self.chunk.emit(Opcode::Jump(0))),
        }
        self.patch_jump(past_handler);

        if let Some(finalizer) = finalizer {
            self.controls.pop();
            self.statement(finalizer)?;
            let to_end = self.chunk.emit(Opcode::Jump(0));

            // Abrupt completion by a throw: run the finalizer, rethrow.
            if let Some(at) = to_rethrow {
                self.patch_jump(at);
            }
            let exception = self.temp();
            self.chunk.emit(Opcode::StoreLocal(exception));
            self.statement(finalizer)?;
            self.chunk.emit(Opcode::LoadLocal(exception));
            self.chunk.emit(Opcode::Throw);
            self.release(exception);
            self.patch_jump(to_end);
        }
        Ok(())
    }

    // Expressions

    fn target_of(expression: &'p Expression) -> Target<'p> {
        match expression.ungrouped() {
            Expression::Identifier {
                name,
                scope,
                position,
            } => Target::Name {
                name: name.as_str(),
                scope: *scope,
                position: *position,
            },
            Expression::Operator(op) if op.kind() == OperatorKind::MemberAccess => {
                match (op.operands.first(), op.operands.get(1)) {
                    (
                        Some(object),
                        Some(Expression::Literal {
                            value: LiteralValue::String(name),
                            ..
                        }),
                    ) => Target::Member {
                        object,
                        name: name.clone(),
                    },
                    _ => Target::Invalid(expression),
                }
            }
            Expression::Operator(op) if op.kind() == OperatorKind::Index => {
                match (op.operands.first(), op.operands.get(1)) {
                    (Some(object), Some(key)) => Target::Index { object, key },
                    _ => Target::Invalid(expression),
                }
            }
            other => Target::Invalid(other),
        }
    }

    fn invalid_target(&mut self, position: SourcePosition, message: &str) {
        self.emit_at(
            Opcode::ThrowError {
                kind: ErrorKind::ReferenceError,
                message: message.to_string(),
            },
            position,
        );
        self.chunk.emit(Opcode::LoadUndefined);
    }

    fn expression(&mut self, expression: &'p Expression) -> Result<(), JsError> {
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.expression_kind(expression))
    }

    fn expression_kind(&mut self, expression: &'p Expression) -> Result<(), JsError> {
        match expression {
            Expression::Literal { value, .. } => match value {
                LiteralValue::Null => {
                    self.chunk.emit(Opcode::LoadNull);
                }
                LiteralValue::Boolean(true) => {
                    self.chunk.emit(Opcode::LoadTrue);
                }
                LiteralValue::Boolean(false) => {
                    self.chunk.emit(Opcode::LoadFalse);
                }
                LiteralValue::Number(n) => self.load_number(*n),
                LiteralValue::String(s) => self.load_string(s),
            },
            Expression::Identifier {
                name,
                scope,
                position,
            } => self.load_name(name, *scope, *position, false)?,
            Expression::This { .. } => {
                self.chunk.emit(Opcode::LoadThis);
            }
            Expression::Array { elements, .. } => {
                for element in elements {
                    match element {
                        Some(element) => self.expression(element)?,
                        None => {
                            self.chunk.emit(Opcode::LoadUndefined);
                        }
                    }
                }
                self.chunk.emit(Opcode::CreateArray(elements.len()));
            }
            Expression::Object { properties, .. } => {
                self.chunk.emit(Opcode::CreateObject);
                for property in properties {
                    self.expression(&property.value)?;
                    self.chunk.emit(Opcode::DefineProperty(property.key.clone()));
                }
            }
            Expression::Function { function, .. } => {
                let index = self.compile_function(function)?;
                self.chunk.emit(Opcode::CreateClosure(index));
            }
            Expression::Template {
                quasis,
                expressions,
                ..
            } => {
                self.load_string(quasis.first().map_or("", String::as_str));
                for (expression, quasi) in expressions.iter().zip(quasis.iter().skip(1)) {
                    self.expression(expression)?;
                    self.chunk.emit(Opcode::Add);
                    if !quasi.is_empty() {
                        self.load_string(quasi);
                        self.chunk.emit(Opcode::Add);
                    }
                }
            }
            Expression::RegExp { pattern, flags, .. } => {
                self.chunk.emit(Opcode::CreateRegExp {
                    pattern: pattern.clone(),
                    flags: flags.clone(),
                });
            }
            Expression::Operator(op) => self.operator(op)?,
        }
        Ok(())
    }

    fn operator(&mut self, op: &'p OperatorExpression) -> Result<(), JsError> {
        use OperatorKind as K;

        let kind = op.kind();
        if kind.is_assignment() {
            return self.assignment(op);
        }
        if kind.is_update() {
            return self.update(op);
        }

        let operand = |index: usize| -> Result<&'p Expression, JsError> {
            op.operands.get(index).ok_or_else(|| {
                JsError::new(
                    ErrorKind::InternalError,
                    format!("{:?} is missing operand {}", kind, index),
                )
            })
        };

        match kind {
            K::Comma => {
                self.expression(operand(0)?)?;
                self.chunk.emit(Opcode::Pop);
                self.expression(operand(1)?)?;
            }
            K::Conditional => {
                self.expression(operand(0)?)?;
                let to_else = self.chunk.emit(Opcode::JumpIfFalse(0));
                self.expression(operand(1)?)?;
                let to_end = self.chunk.emit(Opcode::Jump(0));
                self.patch_jump(to_else);
                self.expression(operand(2)?)?;
                self.patch_jump(to_end);
            }
            K::LogicalAnd | K::LogicalOr => {
                // The deciding operand is the result.
                self.expression(operand(0)?)?;
                self.chunk.emit(Opcode::Dup);
                let to_end = if kind == K::LogicalAnd {
                    self.chunk.emit(Opcode::JumpIfFalse(0))
                } else {
                    self.chunk.emit(Opcode::JumpIfTrue(0))
                };
                self.chunk.emit(Opcode::Pop);
                self.expression(operand(1)?)?;
                self.patch_jump(to_end);
            }
            K::NotEqual | K::StrictNotEqual => {
                self.expression(operand(0)?)?;
                self.expression(operand(1)?)?;
                self.chunk.emit(if kind == K::NotEqual {
                    Opcode::Equal
                } else {
                    Opcode::StrictEqual
                });
                self.chunk.emit(Opcode::Not);
            }
            K::Positive => {
                let value = operand(0)?;
                self.expression(value)?;
                if !value.result_type().is_numeric() {
                    self.chunk.emit(Opcode::ToNumber);
                }
            }
            K::Negate | K::LogicalNot | K::BitNot => {
                self.expression(operand(0)?)?;
                self.chunk.emit(match kind {
                    K::Negate => Opcode::Neg,
                    K::LogicalNot => Opcode::Not,
                    _ => Opcode::BitNot,
                });
            }
            K::Typeof => {
                match operand(0)?.ungrouped() {
                    Expression::Identifier {
                        name,
                        scope,
                        position,
                    } => self.load_name(name, *scope, *position, true)?,
                    other => self.expression(other)?,
                }
                self.chunk.emit(Opcode::Typeof);
            }
            K::Void => {
                self.expression(operand(0)?)?;
                self.chunk.emit(Opcode::Pop);
                self.chunk.emit(Opcode::LoadUndefined);
            }
            K::Delete => self.delete(operand(0)?)?,
            K::New => match operand(0)? {
                Expression::Operator(call) if call.kind() == K::FunctionCall && call.closed => {
                    let (callee, arguments) = call.operands.split_first().ok_or_else(|| {
                        JsError::new(ErrorKind::InternalError, "call without a callee")
                    })?;
                    self.expression(callee)?;
                    let argc = self.arguments(arguments)?;
                    self.emit_at(Opcode::CallNew(argc), op.position);
                }
                constructor => {
                    self.expression(constructor)?;
                    self.emit_at(Opcode::CallNew(0), op.position);
                }
            },
            K::FunctionCall => self.call(op)?,
            K::MemberAccess => {
                self.expression(operand(0)?)?;
                match operand(1)? {
                    Expression::Literal {
                        value: LiteralValue::String(name),
                        ..
                    } => {
                        self.emit_at(Opcode::LoadProperty(name.clone()), op.position);
                    }
                    other => {
                        self.expression(other)?;
                        self.emit_at(Opcode::GetIndex, op.position);
                    }
                }
            }
            K::Index => {
                self.expression(operand(0)?)?;
                self.expression(operand(1)?)?;
                self.emit_at(Opcode::GetIndex, op.position);
            }
            K::TaggedTemplate => {
                self.expression(operand(0)?)?;
                let Expression::Template {
                    quasis,
                    expressions,
                    ..
                } = operand(1)?
                else {
                    return Err(JsError::new(
                        ErrorKind::InternalError,
                        "tagged template without a template",
                    ));
                };
                for quasi in quasis {
                    self.load_string(quasi);
                }
                self.chunk.emit(Opcode::CreateArray(quasis.len()));
                for expression in expressions {
                    self.expression(expression)?;
                }
                let argc = u8::try_from(expressions.len() + 1).map_err(|_| {
                    JsError::new(ErrorKind::SyntaxError, "Too many template substitutions")
                })?;
                self.emit_at(Opcode::Call(argc), op.position);
            }
            K::Grouping => self.expression(operand(0)?)?,
            _ => {
                self.expression(operand(0)?)?;
                self.expression(operand(1)?)?;
                let opcode = Self::binary_opcode(kind).ok_or_else(|| {
                    JsError::new(
                        ErrorKind::InternalError,
                        format!("no lowering for operator {:?}", kind),
                    )
                })?;
                self.emit_at(opcode, op.position);
            }
        }
        Ok(())
    }

    fn binary_opcode(kind: OperatorKind) -> Option<Opcode> {
        use OperatorKind as K;
        Some(match kind {
            K::Add => Opcode::Add,
            K::Subtract => Opcode::Sub,
            K::Multiply => Opcode::Mul,
            K::Divide => Opcode::Div,
            K::Modulo => Opcode::Mod,
            K::Exponent => Opcode::Exp,
            K::BitAnd => Opcode::BitAnd,
            K::BitOr => Opcode::BitOr,
            K::BitXor => Opcode::BitXor,
            K::ShiftLeft => Opcode::ShiftLeft,
            K::ShiftRight => Opcode::ShiftRight,
            K::UnsignedShiftRight => Opcode::UnsignedShiftRight,
            K::Equal => Opcode::Equal,
            K::StrictEqual => Opcode::StrictEqual,
            K::LessThan => Opcode::Compare {
                kind: CompareKind::LessThan,
                swap: false,
            },
            K::GreaterThan => Opcode::Compare {
                kind: CompareKind::LessThan,
                swap: true,
            },
            K::LessThanOrEqual => Opcode::Compare {
                kind: CompareKind::LessThanOrEqual,
                swap: false,
            },
            K::GreaterThanOrEqual => Opcode::Compare {
                kind: CompareKind::LessThanOrEqual,
                swap: true,
            },
            K::In => Opcode::In,
            K::Instanceof => Opcode::Instanceof,
            _ => return None,
        })
    }

    fn arguments(&mut self, arguments: &'p [Expression]) -> Result<u8, JsError> {
        for argument in arguments {
            self.expression(argument)?;
        }
        u8::try_from(arguments.len()).map_err(|_| {
            JsError::new(ErrorKind::SyntaxError, "Too many arguments in function call")
        })
    }

    fn call(&mut self, op: &'p OperatorExpression) -> Result<(), JsError> {
        let (callee, arguments) = op
            .operands
            .split_first()
            .ok_or_else(|| JsError::new(ErrorKind::InternalError, "call without a callee"))?;

        if let Expression::Identifier { name, .. } = callee {
            if name == "eval" {
                self.expression(callee)?;
                let argc = self.arguments(arguments)?;
                self.emit_at(
                    Opcode::CallEval {
                        argc,
                        strict: self.strict,
                    },
                    op.position,
                );
                return Ok(());
            }
        }

        match callee.ungrouped() {
            Expression::Operator(member) if member.kind() == OperatorKind::MemberAccess => {
                let Target::Member { object, name } = Self::target_of(callee) else {
                    return Err(JsError::new(ErrorKind::InternalError, "malformed member access"));
                };
                self.expression(object)?;
                self.chunk.emit(Opcode::Dup);
                self.emit_at(Opcode::LoadProperty(name), member.position);
                let argc = self.arguments(arguments)?;
                self.emit_at(Opcode::CallMethod(argc), op.position);
            }
            Expression::Operator(index) if index.kind() == OperatorKind::Index => {
                let Target::Index { object, key } = Self::target_of(callee) else {
                    return Err(JsError::new(ErrorKind::InternalError, "malformed index access"));
                };
                self.expression(object)?;
                self.chunk.emit(Opcode::Dup);
                self.expression(key)?;
                self.emit_at(Opcode::GetIndex, index.position);
                let argc = self.arguments(arguments)?;
                self.emit_at(Opcode::CallMethod(argc), op.position);
            }
            _ => {
                self.expression(callee)?;
                let argc = self.arguments(arguments)?;
                self.emit_at(Opcode::Call(argc), op.position);
            }
        }
        Ok(())
    }

    fn delete(&mut self, operand: &'p Expression) -> Result<(), JsError> {
        match Self::target_of(operand) {
            Target::Member { object, name } => {
                self.expression(object)?;
                self.load_string(&name);
                self.emit_at(Opcode::DeleteProperty, operand.position());
            }
            Target::Index { object, key } => {
                self.expression(object)?;
                self.expression(key)?;
                self.emit_at(Opcode::DeleteProperty, operand.position());
            }
            Target::Name { name, scope, .. } => {
                let resolution = self.tree.resolve(scope, name)?;
                match resolution.binding {
                    Binding::Slot { .. } | Binding::Record { .. } if resolution.object_checks.is_empty() => {
                        self.chunk.emit(Opcode::LoadFalse);
                    }
                    _ => {
                        self.chunk.emit(Opcode::DeleteName(name.to_string()));
                    }
                }
            }
            Target::Invalid(expression) => {
                self.expression(expression)?;
                self.chunk.emit(Opcode::Pop);
                self.chunk.emit(Opcode::LoadTrue);
            }
        }
        Ok(())
    }

    fn assignment(&mut self, op: &'p OperatorExpression) -> Result<(), JsError> {
        let (Some(target), Some(value)) = (op.operands.first(), op.operands.get(1)) else {
            return Err(JsError::new(ErrorKind::InternalError, "assignment without operands"));
        };
        let base = op.kind().compound_base().and_then(Self::binary_opcode);

        match Self::target_of(target) {
            Target::Name {
                name,
                scope,
                position,
            } => {
                if let Some(base) = base {
                    self.load_name(name, scope, position, false)?;
                    self.expression(value)?;
                    self.emit_at(base, op.position);
                } else {
                    self.expression(value)?;
                }
                self.chunk.emit(Opcode::Dup);
                self.store_name(name, scope, position, false)?;
            }
            Target::Member { object, name } => {
                self.expression(object)?;
                if let Some(base) = base {
                    self.chunk.emit(Opcode::Dup);
                    self.emit_at(Opcode::LoadProperty(name.clone()), op.position);
                    self.expression(value)?;
                    self.emit_at(base, op.position);
                } else {
                    self.expression(value)?;
                }
                self.emit_at(Opcode::StoreProperty(name), op.position);
            }
            Target::Index { object, key } => {
                self.expression(object)?;
                self.expression(key)?;
                if let Some(base) = base {
                    self.chunk.emit(Opcode::Dup2);
                    self.emit_at(Opcode::GetIndex, op.position);
                    self.expression(value)?;
                    self.emit_at(base, op.position);
                } else {
                    self.expression(value)?;
                }
                self.emit_at(Opcode::SetIndex, op.position);
            }
            Target::Invalid(expression) => {
                self.expression(expression)?;
                self.chunk.emit(Opcode::Pop);
                self.expression(value)?;
                self.chunk.emit(Opcode::Pop);
                self.invalid_target(op.position, "Invalid left-hand side in assignment");
            }
        }
        Ok(())
    }

    /// `++`/`--`. The postfix forms keep the old value, converted to a
    /// number, in a temporary and leave it as the result.
    fn update(&mut self, op: &'p OperatorExpression) -> Result<(), JsError> {
        use OperatorKind as K;
        let Some(target) = op.operands.first() else {
            return Err(JsError::new(ErrorKind::InternalError, "update without an operand"));
        };
        let kind = op.kind();
        let step = if matches!(kind, K::PreIncrement | K::PostIncrement) {
            Opcode::Inc
        } else {
            Opcode::Dec
        };
        let postfix = matches!(kind, K::PostIncrement | K::PostDecrement);

        match Self::target_of(target) {
            Target::Name {
                name,
                scope,
                position,
            } => {
                self.load_name(name, scope, position, false)?;
                if postfix {
                    let old = self.temp();
                    self.chunk.emit(Opcode::ToNumber);
                    self.chunk.emit(Opcode::StoreLocal(old));
                    self.chunk.emit(Opcode::LoadLocal(old));
                    self.chunk.emit(step);
                    self.store_name(name, scope, position, false)?;
                    self.chunk.emit(Opcode::LoadLocal(old));
                    self.release(old);
                } else {
                    self.chunk.emit(step);
                    self.chunk.emit(Opcode::Dup);
                    self.store_name(name, scope, position, false)?;
                }
            }
            Target::Member { object, name } => {
                self.expression(object)?;
                self.chunk.emit(Opcode::Dup);
                self.emit_at(Opcode::LoadProperty(name.clone()), op.position);
                self.finish_property_update(step, postfix, Opcode::StoreProperty(name), op.position);
            }
            Target::Index { object, key } => {
                self.expression(object)?;
                self.expression(key)?;
                self.chunk.emit(Opcode::Dup2);
                self.emit_at(Opcode::GetIndex, op.position);
                self.finish_property_update(step, postfix, Opcode::SetIndex, op.position);
            }
            Target::Invalid(expression) => {
                self.expression(expression)?;
                self.chunk.emit(Opcode::Pop);
                let message = if postfix {
                    "Invalid left-hand side expression in postfix operation"
                } else {
                    "Invalid left-hand side expression in prefix operation"
                };
                self.invalid_target(op.position, message);
            }
        }
        Ok(())
    }

    fn finish_property_update(
        &mut self,
        step: Opcode,
        postfix: bool,
        store: Opcode,
        position: SourcePosition,
    ) {
        if postfix {
            let old = self.temp();
            self.chunk.emit(Opcode::ToNumber);
            self.chunk.emit(Opcode::StoreLocal(old));
            self.chunk.emit(Opcode::LoadLocal(old));
            self.chunk.emit(step);
            self.emit_at(store, position);
            self.chunk.emit(Opcode::Pop);
            self.chunk.emit(Opcode::LoadLocal(old));
            self.release(old);
        } else {
            self.chunk.emit(step);
            self.emit_at(store, position);
        }
    }
}
