//! A caller-owned table of compiled functions.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::JqFunctionError;
use crate::function::{Function, FunctionDefinition};
use crate::host::{Diagnostic, Diagnostics, HostValue};

/// Error calling a function by name.
#[derive(Debug, Error)]
pub enum CallError {
    #[error("no jq function named {0:?}")]
    NotFound(String),

    #[error(transparent)]
    Function(#[from] JqFunctionError),
}

/// Functions by name, in insertion order.
///
/// Building the table and looking functions up are separate steps. Hosts that compile
/// definitions in parallel compile first and insert the results afterwards.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    functions: IndexMap<String, Function>,
}

impl FunctionTable {
    pub fn new() -> Self {
        FunctionTable::default()
    }

    /// Insert a function, returning any previous function with the same name.
    pub fn insert(&mut self, function: Function) -> Option<Function> {
        self.functions.insert(function.name().to_string(), function)
    }

    pub fn get(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Call the named function with positional arguments, subject first.
    pub fn call(&self, name: &str, args: &[HostValue]) -> Result<HostValue, CallError> {
        let function = self
            .get(name)
            .ok_or_else(|| CallError::NotFound(name.to_string()))?;
        Ok(function.call(args)?)
    }

    /// Compile one definition into the table.
    ///
    /// A name that is already present, or a query that fails to compile, is skipped with
    /// an error diagnostic; the table is left unchanged.
    pub fn compile_definition(
        &mut self,
        def: FunctionDefinition,
        settings: &Settings,
        diags: &mut Diagnostics,
    ) {
        if self.contains(&def.name) {
            warn!(function = %def.name, range = %def.range, "skipping duplicate jq function");
            diags.push(Diagnostic::error(
                "Duplicate jq function",
                format!("A jq function named \"{}\" was already defined.", def.name),
                Some(def.range),
            ));
            return;
        }

        match def.compile() {
            Ok(compiled) => {
                debug!(
                    function = %compiled.name(),
                    params = compiled.params().len(),
                    "compiled jq function"
                );
                self.insert(Function::new(compiled, &settings.subject_param));
            }
            Err(err) => {
                warn!(function = %err.function_name, error = %err.cause, "skipping jq function");
                diags.push(err.to_diagnostic());
            }
        }
    }
}

/// Compile a batch of definitions independently.
///
/// A definition that fails never prevents the others from compiling; every failure is
/// reported in the returned diagnostics.
pub fn compile_batch(
    defs: impl IntoIterator<Item = FunctionDefinition>,
    settings: &Settings,
) -> (FunctionTable, Diagnostics) {
    let mut table = FunctionTable::new();
    let mut diags = Diagnostics::new();
    for def in defs {
        table.compile_definition(def, settings, &mut diags);
    }
    (table, diags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SourceRange;

    fn def(name: &str, params: &[&str], query: &str) -> FunctionDefinition {
        FunctionDefinition::new(
            name,
            params.iter().map(|p| p.to_string()).collect(),
            query,
            SourceRange::default(),
        )
    }

    #[test]
    fn test_batch_keeps_good_definitions() {
        let (table, diags) = compile_batch(
            vec![
                def("good", &["x"], ".[$x]"),
                def("bad_parse", &[], "$y | invalid_func("),
                def("bad_var", &["z"], "$z + $unknown"),
                def("also_good", &[], ".name"),
            ],
            &Settings::default(),
        );
        assert_eq!(table.names().collect::<Vec<_>>(), vec!["good", "also_good"]);
        let summaries: Vec<_> = diags.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Invalid jq query", "Failed to compile jq query"]);
    }

    #[test]
    fn test_duplicate_names() {
        let (table, diags) = compile_batch(
            vec![def("f", &[], ".a"), def("f", &[], ".b")],
            &Settings::default(),
        );
        assert_eq!(table.len(), 1);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags.iter().next().unwrap().summary, "Duplicate jq function");
        assert_eq!(
            table.call("f", &[HostValue::string(r#"{"a": "first"}"#)]).unwrap(),
            HostValue::string("first")
        );
    }

    #[test]
    fn test_call_unknown() {
        let table = FunctionTable::new();
        assert!(matches!(table.call("nope", &[]), Err(CallError::NotFound(_))));
    }

    #[test]
    fn test_subject_param_name() {
        let settings = Settings {
            subject_param: "doc".into(),
            ..Settings::default()
        };
        let (table, _) = compile_batch(vec![def("f", &["k"], ".[$k]")], &settings);
        let names: Vec<_> = table.get("f").unwrap().params().iter().map(|p| p.name.clone()).collect();
        assert_eq!(names, vec!["doc", "k"]);
    }

    #[test]
    fn test_table_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FunctionTable>();
    }
}
