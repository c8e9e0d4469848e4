//! Compiling term maps into term generators.
//!
//! A term generator is a function from a source record to zero or more
//! RDF terms. Compilation happens once per term map when the mapper is
//! built (the pure phase); record-time evaluation performs no I/O.
//!
//! A reference that resolves to no value, or a template with any empty
//! hole, yields no terms and therefore no triples. A reference that does
//! not resolve against the record at all is a term generation error:
//! lenient execution logs it and treats the term as absent, strict mode
//! makes it fatal.

use std::fmt;
use std::sync::Arc;

use crate::encode::{iri_safe, NormalizationForm};
use crate::error::{Result, RmlError};
use crate::functions::{FunctionArgs, FunctionRegistry};
use crate::model::{
    FunctionMap, GraphMap, ObjectMap, PredicateMap, SubjectMap, TermMapSpec, TermType,
};
use crate::record::SourceRecord;
use crate::template::{Segment, Template};
use crate::term::Term;

/// Options shared by all generators of one mapper.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Unicode normalization applied to template hole values in IRIs.
    pub normalization_form: NormalizationForm,
    /// Upper-case percent-encoding hex digits (the default); lower-case
    /// for backward compatibility.
    pub upper_case_percent_encoding: bool,
    /// Base IRI for resolving relative generated IRIs.
    pub base_iri: Option<String>,
    /// User-defined functions available to function term maps.
    pub functions: FunctionRegistry,
}

impl GeneratorOptions {
    /// Options with the engine defaults: NFC, upper-case encoding, no
    /// base IRI, no functions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            normalization_form: NormalizationForm::Nfc,
            upper_case_percent_encoding: true,
            base_iri: None,
            functions: FunctionRegistry::new(),
        }
    }
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A compiled term map: record in, zero or more terms out.
#[derive(Clone)]
pub struct TermGenerator {
    inner: Arc<dyn Fn(&dyn SourceRecord) -> Result<Vec<Term>> + Send + Sync>,
}

impl TermGenerator {
    fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn SourceRecord) -> Result<Vec<Term>> + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Evaluates the generator against one record.
    ///
    /// # Errors
    ///
    /// Returns a term generation error for invalid generated IRIs, and a
    /// function evaluation error when a function term map fails.
    pub fn generate(&self, record: &dyn SourceRecord) -> Result<Vec<Term>> {
        (self.inner)(record)
    }
}

impl fmt::Debug for TermGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TermGenerator")
    }
}

/// Compiles a subject map. Subjects are IRIs by default, blank nodes when
/// declared.
///
/// # Errors
///
/// Returns a configuration error for a spec without a value source, and a
/// function evaluation error for an unregistered function IRI.
pub fn compile_subject_map(map: &SubjectMap, options: &GeneratorOptions) -> Result<TermGenerator> {
    let term_type = map.term_type.unwrap_or(TermType::Iri);
    compile(&map.spec, term_type, None, None, options)
}

/// Compiles a predicate map. Predicates are always IRIs.
///
/// # Errors
///
/// As [`compile_subject_map`].
pub fn compile_predicate_map(
    map: &PredicateMap,
    options: &GeneratorOptions,
) -> Result<TermGenerator> {
    compile(&map.spec, TermType::Iri, None, None, options)
}

/// Compiles an object map with its effective term type, datatype, and
/// language.
///
/// # Errors
///
/// As [`compile_subject_map`].
pub fn compile_object_map(map: &ObjectMap, options: &GeneratorOptions) -> Result<TermGenerator> {
    compile(
        &map.spec,
        map.effective_term_type(),
        map.datatype.as_ref().and_then(|dt| dt.as_iri()).map(String::from),
        map.language.clone(),
        options,
    )
}

/// Compiles a graph map. Graphs are always IRIs.
///
/// # Errors
///
/// As [`compile_subject_map`].
pub fn compile_graph_map(map: &GraphMap, options: &GeneratorOptions) -> Result<TermGenerator> {
    compile(&map.spec, TermType::Iri, None, None, options)
}

fn compile(
    spec: &TermMapSpec,
    term_type: TermType,
    datatype: Option<String>,
    language: Option<String>,
    options: &GeneratorOptions,
) -> Result<TermGenerator> {
    if let Some(constant) = &spec.constant {
        let constant = constant.clone();
        return Ok(TermGenerator::new(move |_| Ok(vec![constant.clone()])));
    }

    if let Some(reference) = &spec.reference {
        let reference = reference.clone();
        let typer = TermTyper {
            term_type,
            datatype,
            language,
            options: options.clone(),
        };
        return Ok(TermGenerator::new(move |record| {
            let Some(values) = record.lookup(&reference) else {
                return Err(missing_reference(&reference));
            };
            values
                .into_iter()
                .map(|value| typer.term_from(&value, record))
                .collect()
        }));
    }

    if let Some(template) = &spec.template {
        let template = template.clone();
        let typer = TermTyper {
            term_type,
            datatype,
            language,
            options: options.clone(),
        };
        let encode_holes = term_type == TermType::Iri;
        return Ok(TermGenerator::new(move |record| {
            expand_template(&template, record, encode_holes, &typer.options)?
                .into_iter()
                .map(|value| typer.term_from(&value, record))
                .collect()
        }));
    }

    if let Some(function) = &spec.function {
        return compile_function(function, term_type, datatype, language, options);
    }

    Err(RmlError::Configuration(
        "term map has no value source to compile".to_string(),
    ))
}

fn compile_function(
    map: &FunctionMap,
    term_type: TermType,
    datatype: Option<String>,
    language: Option<String>,
    options: &GeneratorOptions,
) -> Result<TermGenerator> {
    // Resolving the function at compile time turns a typo in the mapping
    // into a build failure instead of a per-record one.
    let function = options.functions.get(&map.function)?;
    let function_iri = map.function.clone();

    let mut arguments = Vec::with_capacity(map.arguments.len());
    for argument in &map.arguments {
        // Argument values keep their natural form; typing applies to the
        // function's result, not its inputs.
        let generator = compile(&argument.spec, TermType::Literal, None, None, options)?;
        arguments.push((argument.parameter.clone(), generator));
    }

    let typer = TermTyper {
        term_type,
        datatype,
        language,
        options: options.clone(),
    };

    Ok(TermGenerator::new(move |record| {
        let mut args = FunctionArgs::new();
        for (parameter, generator) in &arguments {
            args.push(parameter.clone(), generator.generate(record)?);
        }
        let results = function(&args).map_err(|e| match e {
            err @ RmlError::FunctionEvaluation { .. } => err,
            other => RmlError::FunctionEvaluation {
                function: function_iri.clone(),
                message: other.to_string(),
            },
        })?;
        results
            .into_iter()
            .map(|term| typer.coerce(term, record))
            .collect()
    }))
}

/// Applies term type, datatype, and language to raw lexical values.
#[derive(Debug, Clone)]
struct TermTyper {
    term_type: TermType,
    datatype: Option<String>,
    language: Option<String>,
    options: GeneratorOptions,
}

impl TermTyper {
    fn term_from(&self, value: &str, record: &dyn SourceRecord) -> Result<Term> {
        match self.term_type {
            TermType::Iri => make_iri(value, &self.options),
            TermType::BlankNode => Ok(Term::blank(blank_label(record.sequence(), value))),
            TermType::Literal => Ok(if let Some(language) = &self.language {
                Term::literal_with_lang(value, language.clone())
            } else if let Some(datatype) = &self.datatype {
                Term::typed_literal(value, datatype.clone())
            } else {
                Term::literal(value)
            }),
        }
    }

    /// Coerces a function result to the declared term type. IRIs and
    /// blank nodes pass through; a plain lexical result is retyped.
    fn coerce(&self, term: Term, record: &dyn SourceRecord) -> Result<Term> {
        match self.term_type {
            TermType::Iri => {
                if let Term::Literal { value, .. } = &term {
                    return make_iri(value, &self.options);
                }
                Ok(term)
            }
            TermType::BlankNode => {
                if let Term::Literal { value, .. } = &term {
                    return Ok(Term::blank(blank_label(record.sequence(), value)));
                }
                Ok(term)
            }
            TermType::Literal => {
                if self.language.is_some() || self.datatype.is_some() {
                    if let Term::Literal {
                        value,
                        language: None,
                        datatype: None,
                    } = &term
                    {
                        return self.term_from(value, record);
                    }
                }
                Ok(term)
            }
        }
    }
}

/// Expands a template against a record: the Cartesian product over hole
/// values, with any empty hole suppressing the whole expansion. A hole
/// whose reference does not resolve is a term generation error.
fn expand_template(
    template: &Template,
    record: &dyn SourceRecord,
    encode_holes: bool,
    options: &GeneratorOptions,
) -> Result<Vec<String>> {
    let mut expansions = vec![String::new()];

    for segment in template.segments() {
        match segment {
            Segment::Text(text) => {
                for expansion in &mut expansions {
                    expansion.push_str(text);
                }
            }
            Segment::Reference(reference) => {
                let Some(mut values) = record.lookup(reference) else {
                    return Err(missing_reference(reference));
                };
                if values.is_empty() {
                    return Ok(Vec::new());
                }
                if encode_holes {
                    values = values
                        .iter()
                        .map(|v| {
                            iri_safe(
                                v,
                                options.normalization_form,
                                options.upper_case_percent_encoding,
                            )
                        })
                        .collect();
                }
                expansions = expansions
                    .iter()
                    .flat_map(|prefix| {
                        values.iter().map(move |value| {
                            let mut next = prefix.clone();
                            next.push_str(value);
                            next
                        })
                    })
                    .collect();
            }
        }
    }

    Ok(expansions)
}

fn missing_reference(reference: &str) -> RmlError {
    RmlError::TermGeneration(format!(
        "reference '{reference}' does not exist in the record"
    ))
}

/// Builds and validates an IRI term, resolving relative values against
/// the configured base.
fn make_iri(value: &str, options: &GeneratorOptions) -> Result<Term> {
    let iri = if is_absolute_iri(value) {
        value.to_string()
    } else if let Some(base) = &options.base_iri {
        format!("{base}{value}")
    } else {
        value.to_string()
    };
    oxrdf::NamedNode::new(&iri)
        .map_err(|e| RmlError::TermGeneration(format!("invalid IRI '{iri}': {e}")))?;
    Ok(Term::Iri(iri))
}

/// Returns true when the value starts with an IRI scheme.
fn is_absolute_iri(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for c in chars {
        match c {
            ':' => return true,
            c if c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.') => {}
            _ => return false,
        }
    }
    false
}

/// A blank node label scoped to one record: equal generated identifiers
/// within a record collapse to one node, and distinct records can never
/// collide.
fn blank_label(sequence: u64, value: &str) -> String {
    let mut label = format!("r{sequence}_");
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() {
            label.push(byte as char);
        } else {
            label.push_str(&format!("_x{byte:02X}"));
        }
    }
    label
}
