//! CSV decoder for the `ql:CSV` reference formulation.
//!
//! The first row is the header; each following row becomes one record
//! with the headers as field names. Every header column resolves on
//! every record; an empty cell resolves to no values, so templates over
//! it suppress their term. References outside the header do not resolve.

use std::io::Read;
use std::sync::Arc;

use crate::error::{Result, RmlError};
use crate::record::FieldRecord;

use super::{DecoderFactory, RecordDecoder, Sequencer, SharedRecord};

/// Factory for [`CsvDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct CsvDecoderFactory;

impl DecoderFactory for CsvDecoderFactory {
    fn create(
        &self,
        input: Box<dyn Read + Send>,
        _iterator: Option<&str>,
        sequencer: Arc<Sequencer>,
    ) -> Result<Box<dyn RecordDecoder>> {
        Ok(Box::new(CsvDecoder::new(input, sequencer)?))
    }
}

/// Streaming CSV record decoder.
pub struct CsvDecoder {
    headers: Vec<String>,
    records: csv::StringRecordsIntoIter<Box<dyn Read + Send>>,
    sequencer: Arc<Sequencer>,
}

impl std::fmt::Debug for CsvDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvDecoder")
            .field("headers", &self.headers)
            .finish()
    }
}

impl CsvDecoder {
    /// Creates a decoder over a byte stream, reading the header row
    /// eagerly.
    ///
    /// # Errors
    ///
    /// Returns an error when the header row cannot be read.
    pub fn new(input: Box<dyn Read + Send>, sequencer: Arc<Sequencer>) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
        let headers = reader
            .headers()
            .map_err(|e| RmlError::Parse(e.to_string()))?
            .iter()
            .map(ToString::to_string)
            .collect();
        Ok(Self {
            headers,
            records: reader.into_records(),
            sequencer,
        })
    }
}

impl RecordDecoder for CsvDecoder {
    fn next_record(&mut self) -> Result<Option<SharedRecord>> {
        match self.records.next() {
            None => Ok(None),
            Some(Err(e)) => Err(RmlError::Parse(e.to_string())),
            Some(Ok(row)) => {
                let mut record = FieldRecord::new(self.sequencer.next());
                for (column, header) in self.headers.iter().enumerate() {
                    match row.get(column) {
                        Some("") | None => record.push_absent(header.clone()),
                        Some(value) => record.push(header.clone(), value),
                    }
                }
                Ok(Some(Arc::new(record)))
            }
        }
    }
}
