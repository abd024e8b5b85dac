//! Compilation options, code contexts and per-function metadata

use std::rc::Rc;

use bytecode_system::FunctionTemplate;
use core_types::SourceSpan;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::scope::ScopeId;

/// Which edition's lexical grammar to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    /// Current grammar: legacy octal integer literals are rejected
    #[default]
    Latest,
    /// ES3 grammar: `010` is octal in non-strict code
    Ecmascript3,
}

/// Options that control a compilation.
///
/// # Examples
///
/// ```
/// use parser::{CompatibilityMode, CompilerOptions};
///
/// let options: CompilerOptions =
///     serde_json::from_str(r#"{ "force_strict": true, "compatibility": "ecmascript3" }"#).unwrap();
/// assert!(options.force_strict);
/// assert_eq!(options.compatibility, CompatibilityMode::Ecmascript3);
/// assert!(!options.disable_slot_optimization);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Compile as if a `"use strict"` directive was present
    pub force_strict: bool,
    /// Lexical grammar edition
    pub compatibility: CompatibilityMode,
    /// Store every scope as a dynamic record
    pub disable_slot_optimization: bool,
    /// Path reported in diagnostics
    pub source_path: Option<String>,
}

/// The kind of code being compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeContext {
    /// Program code
    Global,
    /// Direct eval code; `strict` when the calling code is strict
    Eval {
        /// The caller is strict code
        strict: bool,
    },
    /// A function body with the given argument names
    Function {
        /// Argument names in order
        arguments: Vec<String>,
    },
}

/// Facts gathered while parsing a function body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationHints {
    /// How often each name is referenced in the body
    pub variable_occurrences: IndexMap<String, usize>,
    /// The body defines a nested function
    pub has_nested_function: bool,
    /// The body uses `this`
    pub has_this: bool,
    /// The body contains a direct `eval`
    pub has_eval: bool,
}

impl OptimizationHints {
    /// Counts one more reference to `name`.
    pub fn record_occurrence(&mut self, name: &str) {
        *self.variable_occurrences.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Folds in hints from an earlier compilation. Flags are only ever set,
    /// occurrence counts keep the larger value.
    pub fn merge(&mut self, other: &OptimizationHints) {
        self.has_nested_function |= other.has_nested_function;
        self.has_this |= other.has_this;
        self.has_eval |= other.has_eval;
        for (name, count) in &other.variable_occurrences {
            let entry = self.variable_occurrences.entry(name.clone()).or_insert(0);
            *entry = (*entry).max(*count);
        }
    }
}

/// One compiled function of a compilation unit.
#[derive(Debug, Clone)]
pub struct MethodContext {
    /// The function's scope
    pub scope: ScopeId,
    /// Declared name
    pub name: Option<String>,
    /// Hints gathered from the body
    pub hints: OptimizationHints,
    /// Source span
    pub span: SourceSpan,
    /// Generated routine
    pub routine: Rc<FunctionTemplate>,
}
