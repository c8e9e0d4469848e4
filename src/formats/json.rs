//! JSON decoder for the `ql:JSONPath` reference formulation.
//!
//! The iterator expression selects the nodes that become records, using a
//! JSONPath subset: `$` (root), `.key`, `['key']`, `[*]`, and `[n]`.
//! References inside term maps are paths relative to the iterated node,
//! e.g. `name` or `address.city` or `phones[*]`.
//!
//! Scalars stringify with their JSON lexical form; arrays of scalars
//! produce multi-valued references. A matched `null` resolves to no
//! values; a key the record does not have fails to resolve.

use std::io::Read;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{Result, RmlError};
use crate::record::SourceRecord;

use super::{DecoderFactory, RecordDecoder, Sequencer, SharedRecord};

/// Factory for [`JsonDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct JsonDecoderFactory;

impl DecoderFactory for JsonDecoderFactory {
    fn create(
        &self,
        input: Box<dyn Read + Send>,
        iterator: Option<&str>,
        sequencer: Arc<Sequencer>,
    ) -> Result<Box<dyn RecordDecoder>> {
        Ok(Box::new(JsonDecoder::new(
            input,
            iterator.unwrap_or("$"),
            sequencer,
        )?))
    }
}

/// Decoder iterating the nodes selected by a JSONPath expression.
///
/// The whole document is parsed up front; JSON sources are not streamed.
#[derive(Debug)]
pub struct JsonDecoder {
    nodes: std::vec::IntoIter<Value>,
    sequencer: Arc<Sequencer>,
}

impl JsonDecoder {
    /// Parses the document and evaluates the iterator expression.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not valid JSON or the iterator
    /// expression is malformed.
    pub fn new(
        mut input: Box<dyn Read + Send>,
        iterator: &str,
        sequencer: Arc<Sequencer>,
    ) -> Result<Self> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let document: Value =
            serde_json::from_slice(&bytes).map_err(|e| RmlError::Parse(e.to_string()))?;

        let steps = parse_path(iterator)?;
        let nodes: Vec<Value> = eval_path(&document, &steps).into_iter().cloned().collect();

        Ok(Self {
            nodes: nodes.into_iter(),
            sequencer,
        })
    }
}

impl RecordDecoder for JsonDecoder {
    fn next_record(&mut self) -> Result<Option<SharedRecord>> {
        Ok(self.nodes.next().map(|node| {
            Arc::new(JsonRecord {
                sequence: self.sequencer.next(),
                node,
            }) as SharedRecord
        }))
    }
}

/// One iterated JSON node, with path lookup relative to it.
#[derive(Debug, Clone)]
pub struct JsonRecord {
    sequence: u64,
    node: Value,
}

impl JsonRecord {
    /// Wraps a JSON value as a record, e.g. for
    /// [`map_item`](crate::mapper::RmlMapper::map_item).
    #[must_use]
    pub fn new(sequence: u64, node: Value) -> Self {
        Self { sequence, node }
    }
}

impl SourceRecord for JsonRecord {
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn lookup(&self, reference: &str) -> Option<Vec<String>> {
        let steps = parse_path(reference).ok()?;
        let nodes = eval_path(&self.node, &steps);
        if nodes.is_empty() {
            // the path names nothing in this record
            return None;
        }
        Some(nodes.into_iter().flat_map(value_strings).collect())
    }
}

/// One step of a parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathStep {
    Key(String),
    Index(usize),
    Wildcard,
}

/// Parses the supported JSONPath subset. A leading `$` is optional so the
/// same parser serves iterator expressions and relative references.
fn parse_path(expression: &str) -> Result<Vec<PathStep>> {
    let mut steps = Vec::new();
    let mut chars = expression.chars().peekable();

    if chars.peek() == Some(&'$') {
        chars.next();
    }

    loop {
        match chars.peek() {
            None => break,
            Some('.') => {
                chars.next();
                let mut key = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    key.push(c);
                    chars.next();
                }
                if key.is_empty() {
                    return Err(RmlError::Configuration(format!(
                        "empty key in path expression '{expression}'"
                    )));
                }
                steps.push(PathStep::Key(key));
            }
            Some('[') => {
                chars.next();
                let mut inner = String::new();
                loop {
                    match chars.next() {
                        Some(']') => break,
                        Some(c) => inner.push(c),
                        None => {
                            return Err(RmlError::Configuration(format!(
                                "unterminated '[' in path expression '{expression}'"
                            )));
                        }
                    }
                }
                if inner == "*" {
                    steps.push(PathStep::Wildcard);
                } else if let Ok(index) = inner.parse::<usize>() {
                    steps.push(PathStep::Index(index));
                } else {
                    let quoted = inner
                        .strip_prefix('\'')
                        .and_then(|s| s.strip_suffix('\''))
                        .or_else(|| inner.strip_prefix('"').and_then(|s| s.strip_suffix('"')));
                    match quoted {
                        Some(key) => steps.push(PathStep::Key(key.to_string())),
                        None => {
                            return Err(RmlError::Configuration(format!(
                                "unsupported selector '[{inner}]' in path expression '{expression}'"
                            )));
                        }
                    }
                }
            }
            Some(_) => {
                // bare leading key, as used by relative references
                let mut key = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    key.push(c);
                    chars.next();
                }
                steps.push(PathStep::Key(key));
            }
        }
    }

    Ok(steps)
}

fn eval_path<'v>(root: &'v Value, steps: &[PathStep]) -> Vec<&'v Value> {
    let mut current = vec![root];
    for step in steps {
        let mut next = Vec::new();
        for value in current {
            match step {
                PathStep::Key(key) => {
                    if let Some(found) = value.get(key) {
                        next.push(found);
                    }
                }
                PathStep::Index(index) => {
                    if let Some(found) = value.get(index) {
                        next.push(found);
                    }
                }
                PathStep::Wildcard => match value {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(entries) => next.extend(entries.values()),
                    _ => {}
                },
            }
        }
        current = next;
    }
    current
}

/// The lexical values of a selected node. Nulls vanish, arrays flatten
/// one level, objects produce nothing.
fn value_strings(value: &Value) -> Vec<String> {
    match value {
        Value::Null | Value::Object(_) => Vec::new(),
        Value::String(s) => vec![s.clone()],
        Value::Number(n) => vec![n.to_string()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Array(items) => items.iter().flat_map(value_strings).collect(),
    }
}
