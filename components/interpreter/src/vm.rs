//! Virtual Machine for bytecode execution
//!
//! Main entry point for running compiled routines. The VM owns the object
//! heap, the global object and the intrinsic objects, and a [`Compiler`]
//! used for `eval`.

use std::collections::HashMap;
use std::rc::Rc;

use bytecode_system::{BytecodeChunk, FunctionTemplate};
use core_types::{ErrorKind, JsError, SourceSpan, Value};
use parser::{CodeContext, CompiledRoutine, Compiler, CompilerOptions};
use tracing::{debug, trace};

use crate::call_frame::CallFrame;
use crate::environment::Env;
use crate::heap::{Heap, JsObject, NativeFunction, ObjectKind, Property};

/// Calls nested deeper than this raise a RangeError.
const MAX_CALL_DEPTH: usize = 400;

/// Script calls continue on a fresh stack segment once less than this much
/// native stack remains, so the depth limit is reached before the native
/// stack runs out.
const STACK_RED_ZONE: usize = 256 * 1024;
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

const ERROR_KINDS: [ErrorKind; 7] = [
    ErrorKind::SyntaxError,
    ErrorKind::TypeError,
    ErrorKind::ReferenceError,
    ErrorKind::RangeError,
    ErrorKind::EvalError,
    ErrorKind::URIError,
    ErrorKind::InternalError,
];

/// How a routine stopped early.
#[derive(Debug, Clone)]
pub enum Abrupt {
    /// A script value was thrown
    Throw(Value),
    /// The VM raised an error; it becomes an error object when caught
    Error(JsError),
}

impl From<JsError> for Abrupt {
    fn from(error: JsError) -> Self {
        Abrupt::Error(error)
    }
}

/// Virtual Machine for executing JavaScript bytecode
///
/// # Example
///
/// ```
/// use interpreter::VM;
/// use core_types::Value;
///
/// let mut vm = VM::new();
/// let result = vm.run_script("var y = 1; for (var x = 1; x < 5; x++) { y = y + x } y").unwrap();
/// assert_eq!(result, Value::Smi(11));
/// assert_eq!(vm.get_global("x"), Some(Value::Smi(5)));
/// ```
#[derive(Debug)]
pub struct VM {
    pub(crate) heap: Heap,
    pub(crate) global: usize,
    pub(crate) object_prototype: usize,
    pub(crate) function_prototype: usize,
    pub(crate) array_prototype: usize,
    pub(crate) error_prototype: usize,
    pub(crate) error_prototypes: HashMap<ErrorKind, usize>,
    pub(crate) eval_function: usize,
    compiler: Compiler,
    depth: usize,
}

impl VM {
    /// Create a new VM instance with default compiler options
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Create a VM whose scripts and `eval` code compile with `options`
    pub fn with_options(options: CompilerOptions) -> Self {
        let mut heap = Heap::new();
        let object_prototype = heap.allocate(JsObject::new(ObjectKind::Ordinary, None));
        let function_prototype =
            heap.allocate(JsObject::new(ObjectKind::Ordinary, Some(object_prototype)));
        let array_prototype = heap.allocate(JsObject::new(ObjectKind::Ordinary, Some(object_prototype)));
        let error_prototype = heap.allocate(JsObject::new(ObjectKind::Ordinary, Some(object_prototype)));
        let global = heap.allocate(JsObject::new(ObjectKind::Ordinary, Some(object_prototype)));
        let eval_function = heap.allocate(JsObject::new(
            ObjectKind::Native(NativeFunction::Eval),
            Some(function_prototype),
        ));

        let mut vm = Self {
            heap,
            global,
            object_prototype,
            function_prototype,
            array_prototype,
            error_prototype,
            error_prototypes: HashMap::new(),
            eval_function,
            compiler: Compiler::new(options),
            depth: 0,
        };
        vm.install_globals();
        vm
    }

    fn install_globals(&mut self) {
        let fixed = |value| Property {
            value,
            enumerable: false,
            configurable: false,
        };
        self.heap.define_property(self.global, "undefined", fixed(Value::Undefined));
        self.heap.define_property(self.global, "NaN", fixed(Value::Double(f64::NAN)));
        self.heap
            .define_property(self.global, "Infinity", fixed(Value::Double(f64::INFINITY)));
        self.heap.define_property(
            self.global,
            "eval",
            Property::hidden(Value::HeapObject(self.eval_function)),
        );
        self.heap.define_property(
            self.global,
            "globalThis",
            Property::hidden(Value::HeapObject(self.global)),
        );

        self.install_error_constructor(None, self.error_prototype, "Error");
        for kind in ERROR_KINDS {
            let prototype = self
                .heap
                .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.error_prototype)));
            self.error_prototypes.insert(kind, prototype);
            self.install_error_constructor(Some(kind), prototype, kind.name());
        }
    }

    fn install_error_constructor(&mut self, kind: Option<ErrorKind>, prototype: usize, name: &str) {
        let constructor = self.heap.allocate(JsObject::new(
            ObjectKind::Native(NativeFunction::ErrorConstructor(kind)),
            Some(self.function_prototype),
        ));
        self.heap.define_property(
            constructor,
            "prototype",
            Property::hidden(Value::HeapObject(prototype)),
        );
        self.heap.define_property(
            prototype,
            "constructor",
            Property::hidden(Value::HeapObject(constructor)),
        );
        self.heap
            .define_property(prototype, "name", Property::hidden(Value::String(name.to_string())));
        self.heap
            .define_property(prototype, "message", Property::hidden(Value::String(String::new())));
        self.heap
            .define_property(self.global, name, Property::hidden(Value::HeapObject(constructor)));
    }

    /// Compile and run program code.
    pub fn run_script(&mut self, source: &str) -> Result<Value, JsError> {
        let routine = self.compiler.compile(source, CodeContext::Global)?;
        self.execute_routine(&routine)
    }

    /// Run a compiled routine. Global and eval code run against the global
    /// object; a function-body routine is instantiated and called with no
    /// arguments.
    pub fn execute_routine(&mut self, routine: &CompiledRoutine) -> Result<Value, JsError> {
        match routine.context {
            CodeContext::Function { .. } => {
                let function = self.instantiate(routine);
                self.call_function(&function, Value::Undefined, Vec::new())
            }
            _ => self.execute_chunk(&routine.chunk, routine.strict),
        }
    }

    /// Execute a bytecode chunk as global code and return its result
    ///
    /// # Example
    ///
    /// ```
    /// use interpreter::VM;
    /// use bytecode_system::{BytecodeChunk, Opcode, Value as BcValue};
    /// use core_types::Value;
    ///
    /// let mut vm = VM::new();
    /// let mut chunk = BytecodeChunk::new();
    ///
    /// let idx = chunk.add_constant(BcValue::Number(42.0));
    /// chunk.emit(Opcode::LoadConstant(idx));
    /// chunk.emit(Opcode::Return);
    ///
    /// let result = vm.execute(&chunk).unwrap();
    /// assert_eq!(result, Value::Smi(42));
    /// ```
    pub fn execute(&mut self, chunk: &BytecodeChunk) -> Result<Value, JsError> {
        self.execute_chunk(chunk, false)
    }

    fn execute_chunk(&mut self, chunk: &BytecodeChunk, strict: bool) -> Result<Value, JsError> {
        debug!(
            instructions = chunk.instruction_count(),
            strict, "executing top-level routine"
        );
        let mut frame = CallFrame::new(
            chunk.register_count,
            None,
            Value::HeapObject(self.global),
            Value::Undefined,
            Vec::new(),
        )
        .strict(strict);
        let result = self.run(chunk, &mut frame);
        debug!(ok = result.is_ok(), "top-level routine finished");
        result.map_err(|abrupt| self.uncaught(abrupt))
    }

    /// Create a function object for a function-body routine, closing over
    /// the global object only.
    pub fn instantiate(&mut self, routine: &CompiledRoutine) -> Value {
        let template = FunctionTemplate {
            name: Some("anonymous".to_string()),
            params: routine.arguments.clone(),
            strict: routine.strict,
            chunk: routine.chunk.clone(),
            span: routine.span,
        };
        self.create_closure(Rc::new(template), None)
    }

    /// Call a function value from the host.
    pub fn call_function(&mut self, function: &Value, this: Value, args: Vec<Value>) -> Result<Value, JsError> {
        self.call(function, this, args)
            .map_err(|abrupt| self.uncaught(abrupt))
    }

    /// Get a property of the global object
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.heap.lookup(self.global, name).map(|p| p.value.clone())
    }

    /// Set a property of the global object
    pub fn set_global(&mut self, name: String, value: Value) {
        self.heap.set_property(self.global, &name, value);
    }

    /// Read a property of any value, as `value[key]` would.
    pub fn get(&mut self, value: &Value, key: &str) -> Result<Value, JsError> {
        self.get_value(value, key)
            .map_err(|abrupt| self.uncaught(abrupt))
    }

    /// ToString, including objects.
    pub fn display(&mut self, value: &Value) -> Result<String, JsError> {
        self.to_string_value(value)
            .map_err(|abrupt| self.uncaught(abrupt))
    }

    /// The object heap.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Converts an exception nobody caught into a host error. Error
    /// objects keep their kind and message.
    fn uncaught(&mut self, abrupt: Abrupt) -> JsError {
        match abrupt {
            Abrupt::Error(error) => error,
            Abrupt::Throw(value) => {
                if let Value::HeapObject(id) = value {
                    if matches!(self.heap.get(id).map(|o| &o.kind), Some(ObjectKind::Error)) {
                        let name = self.heap.get_property(id, "name").to_string();
                        let message = self.heap.get_property(id, "message").to_string();
                        return match ErrorKind::from_name(&name) {
                            Some(kind) => JsError::new(kind, message),
                            None => JsError::new(
                                ErrorKind::InternalError,
                                format!("Uncaught {}: {}", name, message),
                            ),
                        };
                    }
                }
                let text = self
                    .to_string_value(&value)
                    .unwrap_or_else(|_| value.to_string());
                JsError::new(ErrorKind::InternalError, format!("Uncaught {}", text))
            }
        }
    }

    /// The script value for an exception about to be caught.
    pub(crate) fn exception_value(&mut self, abrupt: Abrupt) -> Value {
        match abrupt {
            Abrupt::Throw(value) => value,
            Abrupt::Error(error) => self.make_error(error.kind, &error.message),
        }
    }

    /// Creates an error object of the given kind.
    pub(crate) fn make_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let prototype = self
            .error_prototypes
            .get(&kind)
            .copied()
            .unwrap_or(self.error_prototype);
        self.create_error(prototype, Some(message.to_string()))
    }

    fn create_error(&mut self, prototype: usize, message: Option<String>) -> Value {
        let id = self
            .heap
            .allocate(JsObject::new(ObjectKind::Error, Some(prototype)));
        if let Some(message) = message {
            self.heap
                .define_property(id, "message", Property::hidden(Value::String(message)));
        }
        Value::HeapObject(id)
    }

    /// Creates a function object with a fresh `prototype` object.
    pub(crate) fn create_closure(&mut self, template: Rc<FunctionTemplate>, env: Env) -> Value {
        let name = template.name.clone().unwrap_or_default();
        let arity = template.params.len();
        let function = self.heap.allocate(JsObject::new(
            ObjectKind::Closure { template, env },
            Some(self.function_prototype),
        ));
        let prototype = self
            .heap
            .allocate(JsObject::new(ObjectKind::Ordinary, Some(self.object_prototype)));
        self.heap.define_property(
            prototype,
            "constructor",
            Property::hidden(Value::HeapObject(function)),
        );
        self.heap.define_property(
            function,
            "prototype",
            Property::hidden(Value::HeapObject(prototype)),
        );
        self.heap
            .define_property(function, "name", Property::hidden(Value::String(name)));
        self.heap.define_property(
            function,
            "length",
            Property::hidden(Value::number(arity as f64)),
        );
        Value::HeapObject(function)
    }

    /// `[[Call]]`.
    pub(crate) fn call(&mut self, callee: &Value, this: Value, args: Vec<Value>) -> Result<Value, Abrupt> {
        let kind = match callee {
            Value::HeapObject(id) => self.heap.get(*id).map(|o| o.kind.clone()),
            _ => None,
        };
        match kind {
            Some(ObjectKind::Closure { template, env }) => {
                self.call_closure(callee.clone(), template, env, this, args)
            }
            Some(ObjectKind::Native(native)) => self.call_native(native, args),
            _ => {
                let description = self.describe(callee);
                Err(JsError::new(
                    ErrorKind::TypeError,
                    format!("{} is not a function", description),
                )
                .into())
            }
        }
    }

    fn call_closure(
        &mut self,
        callee: Value,
        template: Rc<FunctionTemplate>,
        env: Env,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value, Abrupt> {
        let this = if !template.strict && this.is_nullish() {
            Value::HeapObject(self.global)
        } else {
            this
        };

        trace!(
            name = template.name.as_deref().unwrap_or("<anonymous>"),
            argc = args.len(),
            depth = self.depth,
            "call"
        );
        let mut frame = CallFrame::new(template.chunk.register_count, env, this, callee, args)
            .strict(template.strict);
        self.run_nested(&template.chunk, &mut frame)
    }

    /// Runs a routine entered from script code: a call or an eval.
    fn run_nested(&mut self, chunk: &BytecodeChunk, frame: &mut CallFrame) -> Result<Value, Abrupt> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(JsError::new(ErrorKind::RangeError, "Maximum call stack size exceeded").into());
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || self.run(chunk, frame));
        self.depth -= 1;
        result
    }

    fn call_native(&mut self, native: NativeFunction, args: Vec<Value>) -> Result<Value, Abrupt> {
        match native {
            NativeFunction::Eval => {
                // Indirect eval: global code in its own frame.
                let source = match args.first() {
                    Some(Value::String(source)) => source.clone(),
                    _ => return Ok(args.into_iter().next().unwrap_or(Value::Undefined)),
                };
                let routine = self
                    .compiler
                    .compile(&source, CodeContext::Eval { strict: false })?;
                let mut frame = CallFrame::new(
                    routine.chunk.register_count,
                    None,
                    Value::HeapObject(self.global),
                    Value::Undefined,
                    Vec::new(),
                )
                .strict(routine.strict);
                self.run_nested(&routine.chunk, &mut frame)
            }
            NativeFunction::ErrorConstructor(kind) => {
                let prototype = match kind {
                    Some(kind) => self
                        .error_prototypes
                        .get(&kind)
                        .copied()
                        .unwrap_or(self.error_prototype),
                    None => self.error_prototype,
                };
                let message = match args.first() {
                    None | Some(Value::Undefined) => None,
                    Some(value) => Some(self.to_string_value(value)?),
                };
                Ok(self.create_error(prototype, message))
            }
        }
    }

    /// `eval(...)` called by name: runs in the caller's records with the
    /// caller's `this`. Anything other than the intrinsic eval is an
    /// ordinary call.
    pub(crate) fn call_eval(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        strict: bool,
        caller: &CallFrame,
    ) -> Result<Value, Abrupt> {
        if *callee != Value::HeapObject(self.eval_function) {
            return self.call(callee, Value::Undefined, args);
        }
        let source = match args.first() {
            Some(Value::String(source)) => source.clone(),
            _ => return Ok(args.into_iter().next().unwrap_or(Value::Undefined)),
        };

        let routine = self.compiler.compile(&source, CodeContext::Eval { strict })?;
        trace!(strict = routine.strict, "direct eval");
        let mut frame = CallFrame::new(
            routine.chunk.register_count,
            caller.env.clone(),
            caller.this.clone(),
            caller.callee.clone(),
            Vec::new(),
        )
        .strict(routine.strict);
        self.run_nested(&routine.chunk, &mut frame)
    }

    /// `[[Construct]]`.
    pub(crate) fn construct(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, Abrupt> {
        let (id, kind) = match callee {
            Value::HeapObject(id) => (*id, self.heap.get(*id).map(|o| o.kind.clone())),
            _ => (0, None),
        };
        match kind {
            Some(ObjectKind::Closure { template, env }) => {
                let prototype = match self.heap.get_property(id, "prototype") {
                    Value::HeapObject(prototype) => prototype,
                    _ => self.object_prototype,
                };
                let object = Value::HeapObject(
                    self.heap
                        .allocate(JsObject::new(ObjectKind::Ordinary, Some(prototype))),
                );
                let result = self.call_closure(callee.clone(), template, env, object.clone(), args)?;
                Ok(if result.is_object() { result } else { object })
            }
            Some(ObjectKind::Native(native @ NativeFunction::ErrorConstructor(_))) => {
                self.call_native(native, args)
            }
            _ => {
                let description = self.describe(callee);
                Err(JsError::new(
                    ErrorKind::TypeError,
                    format!("{} is not a constructor", description),
                )
                .into())
            }
        }
    }

    /// Short description of a value for error messages.
    pub(crate) fn describe(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("\"{}\"", s),
            Value::HeapObject(id) => match self.heap.get(*id).map(|o| &o.kind) {
                Some(ObjectKind::Closure { template, .. }) => {
                    format!("function {}", template.name.as_deref().unwrap_or("anonymous"))
                }
                Some(ObjectKind::Array) => "array".to_string(),
                _ => "object".to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Span of a function value's source text, for diagnostics.
    pub fn function_span(&self, function: &Value) -> Option<SourceSpan> {
        match function {
            Value::HeapObject(id) => match self.heap.get(*id).map(|o| &o.kind) {
                Some(ObjectKind::Closure { template, .. }) => Some(template.span),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}
