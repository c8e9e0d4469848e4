//! Source records handed from decoders to term generators.
//!
//! A record is one iteration item of a logical source: a CSV row, one node
//! matched by a JSONPath iterator, or one element matched by an XML path.
//! Term generators only need two things from a record: a unique sequence
//! number (for blank node scoping) and a multi-valued field lookup.

use indexmap::IndexMap;

/// A view of one source record during term generation.
///
/// `lookup` distinguishes two kinds of "no value": a reference that does
/// not resolve against the record's structure at all (`None`, a data
/// error the caller may warn about or promote to fatal) and a reference
/// that resolves but carries no value (`Some` with zero values, plain
/// term suppression).
pub trait SourceRecord: Send + Sync {
    /// The run-wide sequence number of this record. Blank node identifiers
    /// generated from this record are scoped by it.
    fn sequence(&self) -> u64;

    /// All values for a reference expression, in source order.
    ///
    /// Returns `None` when the reference does not exist in this record
    /// (unknown field, non-matching path), and `Some` with zero values
    /// when it exists but is null or empty.
    fn lookup(&self, reference: &str) -> Option<Vec<String>>;
}

/// A flat record of named fields, each with zero or more values.
///
/// Produced by the CSV and XML decoders and accepted by
/// [`map_item`](crate::mapper::RmlMapper::map_item) for caller-provided
/// records. Field order is preserved.
#[derive(Debug, Clone, Default)]
pub struct FieldRecord {
    sequence: u64,
    fields: IndexMap<String, Vec<String>>,
}

impl FieldRecord {
    /// Creates an empty record with the given sequence number.
    #[must_use]
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            fields: IndexMap::new(),
        }
    }

    /// Appends a value for a field.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(value.into());
    }

    /// Records a field as present with no values (an explicit null).
    pub fn push_absent(&mut self, field: impl Into<String>) {
        self.fields.entry(field.into()).or_default();
    }

    /// The field names in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Replaces the sequence number, e.g. when a caller-provided record is
    /// adopted by a mapper run.
    pub fn set_sequence(&mut self, sequence: u64) {
        self.sequence = sequence;
    }
}

impl SourceRecord for FieldRecord {
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn lookup(&self, reference: &str) -> Option<Vec<String>> {
        self.fields.get(reference).cloned()
    }
}
