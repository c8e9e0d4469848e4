//! Record decoders selected by reference formulation.
//!
//! This module defines the [`RecordDecoder`] trait that all decoders
//! implement, the [`DecoderFactory`] plug-point, and the
//! [`DecoderRegistry`] mapping reference formulation IRIs to factories.
//! Built-in decoders cover the three standard formulations: `ql:CSV`,
//! `ql:JSONPath`, and `ql:XPath`.
//!
//! A decoder owns its byte stream and yields records lazily; it performs
//! no term generation. Decoders are constructed per pipeline run with a
//! shared [`Sequencer`] so that every record of a run gets a unique
//! sequence number (blank node scoping depends on this).

pub mod csv;
pub mod json;
pub mod xml;

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Result, RmlError};
use crate::record::SourceRecord;
use crate::vocab::ql;

/// A record shared between the decoder and all subscribed triples
/// mappers.
pub type SharedRecord = Arc<dyn SourceRecord>;

/// Allocates run-wide unique record sequence numbers.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: AtomicU64,
}

impl Sequencer {
    /// Creates a sequencer starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The next sequence number.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Trait for decoders that produce records from a byte stream.
///
/// Implementations should:
/// - Return `Ok(None)` when the source is exhausted (not an error)
/// - Yield records in source order
/// - Treat absent and null values as absent, never as empty strings
pub trait RecordDecoder: Send {
    /// Reads the next record from the source.
    ///
    /// Returns:
    /// - `Ok(Some(record))` if a record was decoded successfully
    /// - `Ok(None)` if the end of the source was reached
    /// - `Err(_)` if the bytes are invalid for this format
    ///
    /// # Errors
    ///
    /// Returns an error if the source contains malformed data or I/O
    /// fails. Decoder errors are fatal to the owning pipeline.
    fn next_record(&mut self) -> Result<Option<SharedRecord>>;

    /// Reads all remaining records into a vector.
    ///
    /// Convenience for tests and small sources; prefer streaming with
    /// [`next_record`](Self::next_record) for large inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if any record fails to decode.
    fn read_all(&mut self) -> Result<Vec<SharedRecord>> {
        let mut records = Vec::new();
        while let Some(record) = self.next_record()? {
            records.push(record);
        }
        Ok(records)
    }
}

/// Factory constructing a decoder for one pipeline run.
pub trait DecoderFactory: Send + Sync {
    /// Creates a decoder over the given byte stream.
    ///
    /// `iterator` is the logical source's iterator expression, when the
    /// formulation uses one.
    ///
    /// # Errors
    ///
    /// Returns an error when the iterator expression is malformed or the
    /// stream cannot be prepared.
    fn create(
        &self,
        input: Box<dyn Read + Send>,
        iterator: Option<&str>,
        sequencer: Arc<Sequencer>,
    ) -> Result<Box<dyn RecordDecoder>>;
}

/// Registry mapping reference formulation IRIs to decoder factories.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    factories: HashMap<String, Arc<dyn DecoderFactory>>,
}

impl DecoderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in CSV, JSONPath, and XPath decoders.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ql::CSV, csv::CsvDecoderFactory);
        registry.register(ql::JSON_PATH, json::JsonDecoderFactory);
        registry.register(ql::XPATH, xml::XmlDecoderFactory);
        registry
    }

    /// Registers a factory for a reference formulation IRI, replacing any
    /// previous binding.
    pub fn register<F: DecoderFactory + 'static>(
        &mut self,
        formulation: impl Into<String>,
        factory: F,
    ) {
        self.factories.insert(formulation.into(), Arc::new(factory));
    }

    /// Returns true if a factory is registered for the formulation.
    #[must_use]
    pub fn contains(&self, formulation: &str) -> bool {
        self.factories.contains_key(formulation)
    }

    /// Looks up the factory for a reference formulation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no factory is registered.
    pub fn get(&self, formulation: &str) -> Result<Arc<dyn DecoderFactory>> {
        self.factories.get(formulation).cloned().ok_or_else(|| {
            RmlError::Configuration(format!(
                "no decoder registered for reference formulation <{formulation}>"
            ))
        })
    }
}

impl fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field("formulations", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
