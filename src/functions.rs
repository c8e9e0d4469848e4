//! Registry of user-defined functions for function term maps.
//!
//! A function term map names a function by IRI; at compile time the
//! mapper resolves that IRI through a [`FunctionRegistry`] and at record
//! time the function receives its evaluated arguments and returns zero or
//! more terms.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, RmlError};
use crate::term::Term;

/// The evaluated arguments of one function invocation: (parameter IRI,
/// values) pairs in declaration order.
#[derive(Debug, Clone, Default)]
pub struct FunctionArgs {
    args: Vec<(String, Vec<Term>)>,
}

impl FunctionArgs {
    /// Creates an empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the values bound to a parameter.
    pub fn push(&mut self, parameter: impl Into<String>, values: Vec<Term>) {
        self.args.push((parameter.into(), values));
    }

    /// All values bound to a parameter IRI; empty when the parameter is
    /// absent.
    #[must_use]
    pub fn get(&self, parameter: &str) -> &[Term] {
        self.args
            .iter()
            .find(|(p, _)| p == parameter)
            .map_or(&[], |(_, values)| values.as_slice())
    }

    /// The single string value of a parameter, if it has exactly one
    /// value with a lexical form.
    #[must_use]
    pub fn string(&self, parameter: &str) -> Option<&str> {
        match self.get(parameter) {
            [term] => term.lexical_value(),
            _ => None,
        }
    }

    /// The (parameter, values) pairs in declaration order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, (String, Vec<Term>)> {
        self.args.iter()
    }
}

/// A registered function: evaluated arguments in, zero or more terms out.
pub type MappingFunction = dyn Fn(&FunctionArgs) -> Result<Vec<Term>> + Send + Sync;

/// Registry mapping function IRIs to callables.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<MappingFunction>>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a function under an IRI, replacing any previous binding.
    pub fn register<F>(&mut self, iri: impl Into<String>, function: F)
    where
        F: Fn(&FunctionArgs) -> Result<Vec<Term>> + Send + Sync + 'static,
    {
        self.functions.insert(iri.into(), Arc::new(function));
    }

    /// Looks up a function by IRI.
    ///
    /// # Errors
    ///
    /// Returns a function evaluation error when the IRI is unregistered.
    pub fn get(&self, iri: &str) -> Result<Arc<MappingFunction>> {
        self.functions
            .get(iri)
            .cloned()
            .ok_or_else(|| RmlError::FunctionEvaluation {
                function: iri.to_string(),
                message: "function is not registered".to_string(),
            })
    }

    /// The number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no functions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}
